use thiserror::Error;

/// Why a single reference lookup did not produce a usable record.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("not listed by provider")]
    NotFound,

    #[error("filtered out: {0}")]
    Filtered(String),

    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    #[error("network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),
}

impl LookupError {
    /// The provider itself failed, as opposed to answering "no".
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            LookupError::Network(_) | LookupError::Api { .. } | LookupError::Parse(_)
        )
    }
}

// Request URLs carry API keys in the query string; they never reach the error text.
impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        LookupError::Network(err.without_url().to_string())
    }
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        LookupError::Parse(err.to_string())
    }
}

/// Neither the equity nor the crypto path produced a record.
#[derive(Debug, Error)]
#[error("unresolved (equity: {equity}; crypto: {crypto})")]
pub struct Unresolved {
    pub equity: LookupError,
    pub crypto: LookupError,
}
