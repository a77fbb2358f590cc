//! Error types for the Haiso client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The server refused the token at admission. Never retried.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// The server answered a request with a structured rejection
    #[error("{code}: {message}")]
    Rejected { code: String, message: String },

    /// Every reconnection attempt failed
    #[error("gave up after {0} reconnection attempts")]
    ReconnectExhausted(u32),
}
