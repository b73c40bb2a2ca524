use serde::Serialize;
use serde_json::Value;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::session::Session;
use crate::types::{BearerToken, Record};

/// Response fields the backend has used for the bearer value, in priority order.
pub const BEARER_TOKEN_ALIASES: [&str; 3] = ["token", "accessToken", "access_token"];

/// Response fields the backend has used for the display name, in priority order.
pub const DISPLAY_NAME_ALIASES: [&str; 3] = ["name", "displayName", "display_name"];

/// Why a credential exchange did not produce a session.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ExchangeError {
    /// Network failure or a body that is not JSON.
    #[error("credential exchange transport failure: {0}")]
    Transport(#[source] Error),

    /// Backend answered with a non-success status.
    #[error("credential exchange rejected with status {status}")]
    Rejected { status: u16, detail: String },

    /// JSON body that cannot be turned into a session.
    #[error("credential exchange returned an unusable payload: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(Error::Http(e))
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        Self::Transport(Error::Json(e))
    }
}

#[derive(Serialize)]
struct ExchangeRequest<'a> {
    token: &'a str,
}

/// Trades an identity-provider credential for an application [`Session`].
///
/// Performs exactly one request per call and has no side effects beyond it:
/// installing and persisting the result is the lifecycle controller's job.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    login_url: Url,
    http: reqwest::Client,
}

impl ExchangeClient {
    #[must_use]
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            login_url: config.login_url.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    /// Exchange `provider_credential` for a session.
    ///
    /// # Errors
    ///
    /// - [`ExchangeError::Transport`] on network failure or a non-JSON body
    /// - [`ExchangeError::Rejected`] on a non-success status
    /// - [`ExchangeError::Malformed`] if the JSON is not a usable session payload
    pub async fn exchange(&self, provider_credential: &str) -> Result<Session, ExchangeError> {
        let response = self
            .http
            .post(self.login_url.clone())
            .json(&ExchangeRequest {
                token: provider_credential,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Rejected {
                status: status.as_u16(),
                detail,
            });
        }

        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        let session = normalize_exchange_response(payload)?;

        if !session.has_usable_token() {
            tracing::warn!(
                display_name = %session.display_name(),
                "Credential exchange returned no bearer value; protected fetches will not be authenticated"
            );
        }

        Ok(session)
    }
}

/// Turn a credential-exchange payload into the canonical [`Session`].
///
/// The display name and bearer value are taken from the first matching
/// entry of [`DISPLAY_NAME_ALIASES`] and [`BEARER_TOKEN_ALIASES`]. Every
/// alias key is dropped from the pass-through fields; everything else is
/// kept. A payload with no bearer alias yields a session without a token.
///
/// # Errors
///
/// Returns [`ExchangeError::Malformed`] if the payload is not an object or
/// carries no string display name.
pub fn normalize_exchange_response(payload: Value) -> Result<Session, ExchangeError> {
    let Value::Object(mut fields) = payload else {
        return Err(ExchangeError::Malformed("expected a JSON object".into()));
    };

    let display_name = take_first_string(&mut fields, &DISPLAY_NAME_ALIASES)
        .ok_or_else(|| ExchangeError::Malformed("missing display name".into()))?;
    let bearer_token = take_first_string(&mut fields, &BEARER_TOKEN_ALIASES);

    let mut session = Session::new(display_name);
    if let Some(token) = bearer_token {
        session = session.with_bearer_token(BearerToken::new(token));
    }
    for (key, value) in fields {
        session = session.with_field(key, value);
    }
    Ok(session)
}

/// Remove every alias from `fields`, returning the first one holding a string.
fn take_first_string(fields: &mut Record, aliases: &[&str]) -> Option<String> {
    let mut found = None;
    for alias in aliases {
        if let Some(Value::String(value)) = fields.remove(*alias) {
            found.get_or_insert(value);
        }
    }
    found
}
