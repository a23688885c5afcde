use thiserror::Error;

/// Errors returned by API method calls and the long poll transport.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error {code}: {message}")]
    Api { code: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty response from {0}")]
    EmptyResponse(String),
}

impl ApiError {
    /// Error code reported by the remote side, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            ApiError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
