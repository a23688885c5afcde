use longpoll_api::ApiError;
use thiserror::Error;

/// Errors that end the poll loop
#[derive(Error, Debug)]
pub enum LongpollError {
    /// Bootstrap or poll request failed (transport, auth, malformed body)
    #[error("upstream error: {0}")]
    Upstream(#[from] ApiError),

    /// The server answered with a `failed` code outside the documented set
    #[error("unknown long poll failure code: {0}")]
    UnknownFailureCode(i64),

    /// A registered event handler returned an error
    #[error("dispatch error: {0}")]
    Dispatch(#[from] HandlerError),
}

/// Error returned by an event handler
#[derive(Error, Debug)]
pub enum HandlerError {
    #[error("failed to decode {event_type} object: {source}")]
    Decode {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LongpollError>;
