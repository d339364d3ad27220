//! Error types for the sse-client crate.

/// Errors raised by the event-stream client.
#[derive(Debug, thiserror::Error)]
pub enum SseError {
    /// The target URL could not be parsed or uses an unsupported scheme
    #[error("Invalid stream URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// The HTTP request could not be built or sent
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a status that is not 200
    #[error("Unexpected HTTP status: {0}")]
    UnexpectedStatus(u16),

    /// The endpoint answered with something other than `text/event-stream`
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Invalid configuration provided
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The background connection task ended abnormally
    #[error("Connection task failed: {0}")]
    DriverFailed(String),
}

/// Convenience type alias for Results using SseError.
pub type Result<T> = std::result::Result<T, SseError>;
