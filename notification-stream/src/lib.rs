//! # notification-streams
//!
//! Keeps long-lived notification streams open to a fleet of remote network
//! controllers. Each controller can publish three categories of
//! notifications (configuration changes, operational state and device
//! events); this crate opens one event stream per controller and category,
//! hands every received event to the caller's [`NotificationHandler`], and
//! tracks the live streams in a registry keyed by controller and category.
//!
//! ## Failure handling
//!
//! - Transient transport errors are logged; the transport retries in place
//!   and the stream stays registered.
//! - A fatal error deregisters the stream, closes it and re-opens a fresh
//!   one for the same key after a fixed delay (60 seconds by default).
//! - Removing a stream deliberately cancels a reconnect pending for it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notification_stream::{
//!     Notification, NotificationStreamManager, RegisteredController, StreamCategory,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let logging = notification_stream::logging::LoggingConfig::from_env()?;
//!     notification_stream::logging::init_logging(&logging)?;
//!
//!     let manager = NotificationStreamManager::new()?;
//!     let controller = RegisteredController::new("ctrl1", "v1");
//!
//!     for category in StreamCategory::ALL {
//!         manager.start_stream(
//!             &format!("http://ctrl1.example:8181/streams/{}", category),
//!             &controller,
//!             Arc::new(|n: &Notification| println!("{}: {}", n.category, n.payload)),
//!             category,
//!             "admin",
//!             "secret",
//!         )?;
//!     }
//!
//!     tokio::signal::ctrl_c().await?;
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connector;
pub mod error;
pub mod logging;
pub mod manager;
pub mod notification;
pub mod reconnect;
pub mod registry;
pub mod session;
pub mod types;

pub use config::StreamConfig;
pub use connector::{SessionConnector, SessionParts, SessionRequest, SseConnector};
pub use error::{Result, SessionError, StreamError};
pub use manager::NotificationStreamManager;
pub use notification::{Notification, NotificationHandler};
pub use reconnect::{ReconnectController, StreamRequest};
pub use registry::{SessionId, StreamEntry, StreamRegistry, StreamSnapshot};
pub use session::{
    ConnectionState, ErrorCause, Readiness, SessionAction, SessionEvent, SessionEvents,
    StreamSession,
};
pub use types::{ParseCategoryError, RegisteredController, StreamCategory, StreamKey};

pub use sse_client::Credentials;
