//! Error types for the notification-stream crate.

use std::time::Duration;

/// Errors returned to callers of the stream manager.
///
/// Only construction-time problems surface here. Runtime failures of an
/// established stream are logged and recovered from inside the crate.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The target URL was rejected
    #[error("Invalid stream URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The transport could not create a session
    #[error("Transport error: {0}")]
    Transport(#[from] sse_client::SseError),
}

/// Errors from closing a stream session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The session reported a failure while closing
    #[error("Close failed: {0}")]
    CloseFailed(String),

    /// The close did not finish within the configured bound
    #[error("Close timed out after {0:?}")]
    CloseTimedOut(Duration),

    /// The transport failed while closing
    #[error("Transport error: {0}")]
    Transport(#[from] sse_client::SseError),
}

/// Convenience type alias for Results using StreamError.
pub type Result<T> = std::result::Result<T, StreamError>;
