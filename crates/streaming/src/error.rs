use foundation::ParamsError;
use thiserror::Error;

use crate::protocol::ErrorBody;

/// Failures that end a logical query.
///
/// There is no cancellation variant: superseded queries are dropped, not
/// failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedError {
    /// Non-success HTTP status. `message` is the server's `error` field when
    /// the body carried one.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    /// Malformed payload inside a recognized frame or response.
    #[error("malformed feed payload: {0}")]
    Decode(String),

    #[error(transparent)]
    InvalidParams(#[from] ParamsError),
}

impl FeedError {
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let message = serde_json::from_slice::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| format!("API error: {status}"));
        FeedError::Status { status, message }
    }

    pub fn network(err: impl std::fmt::Display) -> Self {
        FeedError::Network(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        FeedError::Decode(err.to_string())
    }
}
