//! Durable persistence of the single session record.
//!
//! [`KeyValueStore`] is the raw persistence surface (a browser-style
//! key/value storage). [`SessionStore`] sits on top of it and owns the
//! serialized form of the [`Session`].

use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{BoxError, Error};
use crate::session::Session;

/// Key under which the session record is stored unless configured otherwise.
pub const DEFAULT_SESSION_KEY: &str = "userCredential";

/// Consumer-provided key/value persistence.
///
/// Values are opaque strings. Missing keys are `Ok(None)`, not errors.
///
/// # Example
///
/// ```rust,ignore
/// impl KeyValueStore for MyKeychain {
///     async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
///         self.keychain.read(key).await
///     }
///
///     async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
///         self.keychain.write(key, value).await
///     }
///
///     async fn remove(&self, key: &str) -> Result<(), BoxError> {
///         self.keychain.delete(key).await
///     }
/// }
/// ```
pub trait KeyValueStore: Send + Sync + 'static {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, BoxError>> + Send;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), BoxError>> + Send;

    /// Delete `key`. Deleting a missing key succeeds.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// In-process store. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value under `key`, bypassing the async interface.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Seed a raw value, e.g. a record left by a previous run.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        Ok(self.peek(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        self.entries.lock().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// File-backed store: one `<key>.json` file per key inside a directory.
///
/// Writes go to a temporary sibling first and are renamed into place, so a
/// crash mid-write never leaves a truncated record behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BoxError> {
        let valid = !key.is_empty()
            && key
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if !valid {
            return Err(format!("invalid storage key: {key:?}").into());
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), BoxError> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, value).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BoxError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// The persisted session record.
///
/// Holds at most one record. Only the lifecycle controller writes to it;
/// everyone else may only [`load`](SessionStore::load).
#[derive(Debug)]
pub struct SessionStore<K> {
    backend: K,
    key: String,
}

impl<K: KeyValueStore> SessionStore<K> {
    #[must_use]
    pub fn new(backend: K) -> Self {
        Self {
            backend,
            key: DEFAULT_SESSION_KEY.to_owned(),
        }
    }

    /// Override the storage key (default: [`DEFAULT_SESSION_KEY`]).
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn backend(&self) -> &K {
        &self.backend
    }

    /// Read the persisted session.
    ///
    /// Never fails: a missing, unreadable, or malformed record is `None`.
    pub async fn load(&self) -> Option<Session> {
        let raw = match self.backend.get(&self.key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Failed to read persisted session");
                return None;
            }
        };

        match serde_json::from_str::<Session>(&raw) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!(error = %e, key = %self.key, "Ignoring malformed persisted session");
                None
            }
        }
    }

    /// Overwrite the record with `session`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the backend rejects the write.
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) async fn save(&self, session: &Session) -> Result<(), Error> {
        let raw = serde_json::to_string(session)?;
        self.backend
            .set(&self.key, &raw)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    /// Erase the record. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the backend rejects the removal.
    #[cfg_attr(not(feature = "client"), allow(dead_code))]
    pub(crate) async fn clear(&self) -> Result<(), Error> {
        self.backend
            .remove(&self.key)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }
}
