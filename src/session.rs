use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{BearerToken, Record};

/// Keys owned by the canonical schema. Never stored in the pass-through bag.
const RESERVED_FIELDS: [&str; 2] = ["displayName", "bearerToken"];

/// The signed-in user, as persisted and installed.
///
/// Canonical JSON shape:
///
/// ```json
/// { "displayName": "Ana", "bearerToken": "abc", "email": "ana@example.com" }
/// ```
///
/// Anything besides `displayName` and `bearerToken` is provider data carried
/// through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Session {
    display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bearer_token: Option<BearerToken>,
    #[serde(flatten)]
    extra: Record,
}

impl Session {
    /// Create a session with only a display name.
    #[must_use]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            bearer_token: None,
            extra: Record::new(),
        }
    }

    /// Set the bearer value.
    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<BearerToken>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Add a pass-through field. Reserved canonical keys are ignored.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        let key = key.into();
        if !RESERVED_FIELDS.contains(&key.as_str()) {
            self.extra.insert(key, value);
        }
        self
    }

    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    #[must_use]
    pub fn bearer_token(&self) -> Option<&BearerToken> {
        self.bearer_token.as_ref()
    }

    /// The bearer value to authenticate protected fetches with, if it is non-empty.
    #[must_use]
    pub fn usable_token(&self) -> Option<&BearerToken> {
        self.bearer_token
            .as_ref()
            .filter(|t| !t.expose().is_empty())
    }

    /// Whether protected fetches can be authenticated with this session.
    #[must_use]
    pub fn has_usable_token(&self) -> bool {
        self.usable_token().is_some()
    }

    /// A provider-supplied field, e.g. `email` or `picture`.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// All provider-supplied fields.
    #[must_use]
    pub fn fields(&self) -> &Record {
        &self.extra
    }
}
