use std::path::PathBuf;

use url::Url;

use crate::error::Error;
use crate::store::{DEFAULT_SESSION_KEY, FileStore, SessionStore};

/// Backend and storage configuration.
///
/// Required field (`backend_url`) is a constructor parameter. Endpoint URLs
/// are derived from it and can be overridden with `with_*` methods.
///
/// ```rust,ignore
/// use raceboard_client::ClientConfig;
///
/// let config = ClientConfig::new("https://api.raceboard.app".parse()?)
///     .with_provider_client_id("1234.apps.googleusercontent.com");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) backend_url: Url,
    pub(crate) login_url: Url,
    pub(crate) users_url: Url,
    pub(crate) races_url: Url,
    pub(crate) provider_client_id: Option<String>,
    pub(crate) data_dir: Option<PathBuf>,
    pub(crate) session_key: String,
}

impl ClientConfig {
    /// Create a configuration for the backend at `backend_url` (http or https).
    #[must_use]
    pub fn new(backend_url: Url) -> Self {
        Self {
            login_url: endpoint(&backend_url, "auth/google/login"),
            users_url: endpoint(&backend_url, "users"),
            races_url: endpoint(&backend_url, "races"),
            backend_url,
            provider_client_id: None,
            data_dir: dirs::data_local_dir().map(|dir| dir.join("raceboard")),
            session_key: DEFAULT_SESSION_KEY.into(),
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `RACEBOARD_BACKEND_URL`: backend base URL
    ///
    /// # Optional env vars
    /// - `RACEBOARD_LOGIN_URL`: override the credential-exchange endpoint
    /// - `RACEBOARD_GOOGLE_CLIENT_ID`: identity-provider client identifier
    /// - `RACEBOARD_DATA_DIR`: directory holding the persisted session
    /// - `RACEBOARD_SESSION_KEY`: storage key of the persisted session
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if required env vars are missing or URLs are invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let backend_url = lookup("RACEBOARD_BACKEND_URL")
            .ok_or_else(|| Error::Config("RACEBOARD_BACKEND_URL is required".into()))?;
        let backend_url = parse_http_url("RACEBOARD_BACKEND_URL", &backend_url)?;

        let mut config = Self::new(backend_url);

        if let Some(url) = lookup("RACEBOARD_LOGIN_URL") {
            config = config.with_login_url(parse_http_url("RACEBOARD_LOGIN_URL", &url)?);
        }
        if let Some(client_id) = lookup("RACEBOARD_GOOGLE_CLIENT_ID").filter(|s| !s.is_empty()) {
            config = config.with_provider_client_id(client_id);
        }
        if let Some(dir) = lookup("RACEBOARD_DATA_DIR").filter(|s| !s.is_empty()) {
            config = config.with_data_dir(dir);
        }
        if let Some(key) = lookup("RACEBOARD_SESSION_KEY").filter(|s| !s.is_empty()) {
            config = config.with_session_key(key);
        }

        Ok(config)
    }

    /// Override the credential-exchange endpoint.
    #[must_use]
    pub fn with_login_url(mut self, url: Url) -> Self {
        self.login_url = url;
        self
    }

    /// Override the users list endpoint.
    #[must_use]
    pub fn with_users_url(mut self, url: Url) -> Self {
        self.users_url = url;
        self
    }

    /// Override the races list endpoint.
    #[must_use]
    pub fn with_races_url(mut self, url: Url) -> Self {
        self.races_url = url;
        self
    }

    /// Set the identity-provider client identifier.
    #[must_use]
    pub fn with_provider_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.provider_client_id = Some(client_id.into());
        self
    }

    /// Override the directory holding the persisted session.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    /// Override the storage key of the persisted session.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    /// Backend base URL.
    #[must_use]
    pub fn backend_url(&self) -> &Url {
        &self.backend_url
    }

    /// Credential-exchange endpoint (`POST`).
    #[must_use]
    pub fn login_url(&self) -> &Url {
        &self.login_url
    }

    /// Users list endpoint (`GET`).
    #[must_use]
    pub fn users_url(&self) -> &Url {
        &self.users_url
    }

    /// Races list endpoint (`GET`).
    #[must_use]
    pub fn races_url(&self) -> &Url {
        &self.races_url
    }

    /// Identity-provider client identifier, for the host's sign-in widget.
    #[must_use]
    pub fn provider_client_id(&self) -> Option<&str> {
        self.provider_client_id.as_deref()
    }

    /// Directory holding the persisted session, if one could be determined.
    #[must_use]
    pub fn data_dir(&self) -> Option<&std::path::Path> {
        self.data_dir.as_deref()
    }

    /// Storage key of the persisted session.
    #[must_use]
    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    /// File-backed session store under [`data_dir`](Self::data_dir).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no data directory could be determined.
    pub fn file_session_store(&self) -> Result<SessionStore<FileStore>, Error> {
        let dir = self.data_dir.clone().ok_or_else(|| {
            Error::Config("no data directory; set RACEBOARD_DATA_DIR".into())
        })?;
        Ok(SessionStore::new(FileStore::new(dir)).with_key(self.session_key.clone()))
    }
}

fn endpoint(base: &Url, path: &str) -> Url {
    let mut url = base.clone();
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty().extend(path.split('/'));
    }
    url
}

fn parse_http_url(var: &str, value: &str) -> Result<Url, Error> {
    let url: Url = value
        .parse()
        .map_err(|e| Error::Config(format!("{var}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!("{var}: expected an http(s) URL")));
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn derives_endpoints_from_backend_url() {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap());

        assert_eq!(config.login_url().as_str(), "https://api.example.com/auth/google/login");
        assert_eq!(config.users_url().as_str(), "https://api.example.com/users");
        assert_eq!(config.races_url().as_str(), "https://api.example.com/races");
        assert_eq!(config.session_key(), "userCredential");
    }

    #[test]
    fn keeps_backend_path_prefix() {
        let config = ClientConfig::new("http://localhost:8080/api/".parse().unwrap());
        assert_eq!(config.login_url().as_str(), "http://localhost:8080/api/auth/google/login");
        assert_eq!(config.races_url().as_str(), "http://localhost:8080/api/races");
    }

    #[test]
    fn with_overrides() {
        let config = ClientConfig::new("https://api.example.com".parse().unwrap())
            .with_login_url("https://auth.example.com/exchange".parse().unwrap())
            .with_provider_client_id("client-123")
            .with_data_dir("/tmp/raceboard-test")
            .with_session_key("session")
            .with_users_url("https://api.example.com/v2/users".parse().unwrap())
            .with_races_url("https://api.example.com/v2/races".parse().unwrap());

        assert_eq!(config.login_url().as_str(), "https://auth.example.com/exchange");
        assert_eq!(config.users_url().as_str(), "https://api.example.com/v2/users");
        assert_eq!(config.races_url().as_str(), "https://api.example.com/v2/races");
        assert_eq!(config.backend_url().as_str(), "https://api.example.com/");
        assert_eq!(config.provider_client_id(), Some("client-123"));
        assert_eq!(
            config.data_dir(),
            Some(std::path::Path::new("/tmp/raceboard-test"))
        );
        assert_eq!(config.session_key(), "session");
    }

    #[test]
    fn from_lookup_requires_backend_url() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("RACEBOARD_BACKEND_URL")));
    }

    #[test]
    fn from_lookup_rejects_non_http_urls() {
        let err =
            ClientConfig::from_lookup(lookup(&[("RACEBOARD_BACKEND_URL", "ftp://x")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            ClientConfig::from_lookup(lookup(&[("RACEBOARD_BACKEND_URL", "not a url")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_lookup_reads_optional_vars() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("RACEBOARD_BACKEND_URL", "http://localhost:3000"),
            ("RACEBOARD_LOGIN_URL", "http://localhost:3001/login"),
            ("RACEBOARD_GOOGLE_CLIENT_ID", "abc.apps.googleusercontent.com"),
            ("RACEBOARD_DATA_DIR", "/var/lib/raceboard"),
            ("RACEBOARD_SESSION_KEY", "raceboard"),
        ]))
        .unwrap();

        assert_eq!(config.backend_url().as_str(), "http://localhost:3000/");
        assert_eq!(config.login_url().as_str(), "http://localhost:3001/login");
        assert_eq!(config.provider_client_id(), Some("abc.apps.googleusercontent.com"));
        assert_eq!(config.data_dir(), Some(std::path::Path::new("/var/lib/raceboard")));
        assert_eq!(config.session_key(), "raceboard");
    }

    #[test]
    fn file_session_store_uses_configured_key() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::new("http://localhost".parse().unwrap())
            .with_data_dir(dir.path())
            .with_session_key("custom");

        let store = config.file_session_store().unwrap();
        assert_eq!(store.key(), "custom");
        assert_eq!(store.backend().dir(), dir.path());
    }
}
