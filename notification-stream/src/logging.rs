//! Logging setup for binaries embedding the stream manager
//!
//! The library only emits `tracing` events. A binary builds a
//! [`LoggingConfig`], from its own flags or from the environment, and calls
//! [`init_logging`] once at startup.
//!
//! `RUST_LOG`, when set, replaces the filter built from the configured level.

use std::fmt;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Env var holding the log level used by [`LoggingConfig::from_env`]
pub const LOG_LEVEL_ENV: &str = "NOTIFICATION_STREAM_LOG_LEVEL";

/// Env var holding the output format used by [`LoggingConfig::from_env`]
pub const LOG_FORMAT_ENV: &str = "NOTIFICATION_STREAM_LOG_FORMAT";

/// HTTP stack crates whose debug output drowns the stream events.
const QUIET_TARGETS: [&str; 3] = ["hyper", "reqwest", "h2"];

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One line per event, no target
    #[default]
    Compact,
    /// Multi-line output with source locations
    Pretty,
    /// One JSON object per line
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}'. Valid levels: error, warn, info, debug, trace")]
    InvalidLevel(String),

    #[error("Invalid log format '{0}'. Valid formats: compact, pretty, json")]
    InvalidFormat(String),

    #[error("Invalid log filter: {0}")]
    InvalidFilter(String),

    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),
}

/// Level and output format of the global subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub level: Level,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
        }
    }
}

impl LoggingConfig {
    /// Parse `level` (`error`, `warn`, `info`, `debug`, `trace`; any case).
    pub fn new(level: &str) -> Result<Self, LoggingError> {
        let level =
            Level::from_str(level).map_err(|_| LoggingError::InvalidLevel(level.to_string()))?;
        Ok(Self {
            level,
            format: LogFormat::default(),
        })
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Read `NOTIFICATION_STREAM_LOG_LEVEL` and
    /// `NOTIFICATION_STREAM_LOG_FORMAT`; unset variables keep the defaults.
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_values(
            std::env::var(LOG_LEVEL_ENV).ok().as_deref(),
            std::env::var(LOG_FORMAT_ENV).ok().as_deref(),
        )
    }

    fn from_values(level: Option<&str>, format: Option<&str>) -> Result<Self, LoggingError> {
        let config = match level {
            Some(level) => Self::new(level)?,
            None => Self::default(),
        };
        match format {
            Some(format) => Ok(config.with_format(format.parse()?)),
            None => Ok(config),
        }
    }

    /// Filter directives: the configured level everywhere, with the HTTP
    /// stack capped at `warn` unless tracing.
    pub fn directives(&self) -> String {
        let level = self.level.as_str().to_ascii_lowercase();
        if self.level == Level::TRACE {
            return level;
        }

        let mut directives = vec![level];
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        directives.join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, LoggingError> {
        let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| self.directives());
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))
    }
}

/// Install the global subscriber described by `config`.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = match config.format {
        LogFormat::Compact => builder.with_target(false).compact().try_init(),
        LogFormat::Pretty => builder
            .pretty()
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}
