/// Boxed error returned by consumer-implemented storage backends.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{operation} failed with status {status}: {detail}")]
    Status {
        operation: &'static str,
        status: u16,
        detail: String,
    },
    #[error("Session has no bearer value")]
    MissingToken,
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Session store error: {0}")]
    Store(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// HTTP status code, if the backend answered with a non-success status.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
