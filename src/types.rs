use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Opaque bearer value presented on protected requests.
///
/// `Debug` is redacted so the value never ends up in logs by accident.
/// Use [`expose`](BearerToken::expose) when the raw string is needed.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw bearer string.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

impl From<&str> for BearerToken {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identity of one session installation.
///
/// Every install gets a fresh id, even when the same session is installed
/// twice. Resource responses are tagged with the id that triggered them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From, Into)]
pub struct InstallId(pub Ulid);

impl InstallId {
    #[must_use]
    pub(crate) fn generate() -> Self {
        Self(Ulid::new())
    }
}

/// Opaque backend record: field name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;
