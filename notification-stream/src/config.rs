//! Configuration types for the notification-stream crate
//!
//! This module defines the settings that control how the stream manager
//! recovers from failed connections and how long it waits on slow closes.

use std::time::Duration;

/// Configuration for the NotificationStreamManager
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Fixed delay between a fatal connection failure and the re-open attempt.
    /// There is no growth and no jitter.
    /// Default: 60 seconds
    pub reconnect_delay: Duration,

    /// Upper bound on a single session close during removal
    /// Default: 5 seconds
    pub close_timeout: Duration,

    /// Delay the transport waits before retrying in place after a transient
    /// failure
    /// Default: 1 second
    pub transport_retry_interval: Duration,

    /// Timeout for each HTTP connect attempt of the transport
    /// Default: 30 seconds
    pub connect_timeout: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(60),
            close_timeout: Duration::from_secs(5),
            transport_retry_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl StreamConfig {
    /// Create a new StreamConfig with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a StreamConfig with short delays, for local development against
    /// a controller simulator
    pub fn fast_recovery() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(5),
            close_timeout: Duration::from_secs(2),
            transport_retry_interval: Duration::from_millis(500),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Validate the configuration and return any issues
    pub fn validate(&self) -> Result<(), crate::StreamError> {
        if self.reconnect_delay.is_zero() {
            return Err(crate::StreamError::Configuration(
                "Reconnect delay must be greater than 0".to_string(),
            ));
        }

        if self.close_timeout.is_zero() {
            return Err(crate::StreamError::Configuration(
                "Close timeout must be greater than 0".to_string(),
            ));
        }

        if self.transport_retry_interval.is_zero() {
            return Err(crate::StreamError::Configuration(
                "Transport retry interval must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(crate::StreamError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_transport_retry_interval(mut self, interval: Duration) -> Self {
        self.transport_retry_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}
