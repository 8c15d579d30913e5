//! Error types shared across the editor-scope crates

use thiserror::Error;

/// Result type for editor-scope operations
pub type Result<T> = std::result::Result<T, ScopeError>;

/// Errors surfaced by the transports, the correlator and the handlers
#[derive(Debug, Error)]
pub enum ScopeError {
    /// Socket-level failure (connect, read, write, bind)
    #[error("transport error: {0}")]
    Transport(String),

    /// Well-formed JSON that violates the wire contract
    #[error("protocol error: {0}")]
    Protocol(String),

    /// JSON encode/decode failure
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No response within the request deadline
    #[error("request timed out")]
    Timeout,

    /// The caller cancelled the request before a reply arrived
    #[error("request cancelled")]
    Cancelled,

    /// The adapter has no live connection to the editor
    #[error("not connected to editor")]
    NotConnected,

    /// An error envelope returned by the editor server
    #[error("editor error {code}: {message}")]
    Editor { code: i64, message: String },

    /// An error reply from the game helper
    #[error("game helper error: {0}")]
    Game(String),
}

impl From<serde_json::Error> for ScopeError {
    fn from(err: serde_json::Error) -> Self {
        ScopeError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for ScopeError {
    fn from(err: std::io::Error) -> Self {
        ScopeError::Transport(err.to_string())
    }
}
