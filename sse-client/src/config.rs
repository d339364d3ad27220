//! Connection settings for an [`EventSource`](crate::EventSource).

use std::fmt;
use std::time::Duration;

use url::Url;

use crate::error::{Result, SseError};

/// Credential pair handed to the endpoint as HTTP basic authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

// Keep passwords out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Configuration for a single event-stream connection
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Endpoint URL (http or https)
    pub url: String,

    /// Basic-auth credentials, sent on every (re)connect attempt
    pub credentials: Option<Credentials>,

    /// Delay before retrying in place after a transient failure.
    /// Overridden by the server's `retry:` field.
    /// Default: 1 second
    pub retry_interval: Duration,

    /// Timeout for establishing the HTTP connection
    /// Default: 30 seconds
    pub connect_timeout: Duration,

    /// Additional request headers
    pub headers: Vec<(String, String)>,
}

impl SseConfig {
    /// Create a config for `url` with default settings
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
            retry_interval: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(30),
            headers: Vec::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Validate the configuration and return the parsed URL
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.url).map_err(|e| SseError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(SseError::InvalidUrl {
                    url: self.url.clone(),
                    reason: format!("unsupported scheme '{other}'"),
                })
            }
        }

        if self.retry_interval.is_zero() {
            return Err(SseError::Configuration(
                "Retry interval must be greater than 0".to_string(),
            ));
        }

        if self.connect_timeout.is_zero() {
            return Err(SseError::Configuration(
                "Connect timeout must be greater than 0".to_string(),
            ));
        }

        Ok(url)
    }
}
