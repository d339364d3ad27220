//! Generic event-stream (Server-Sent Events) client.
//!
//! This crate opens a long-lived `text/event-stream` connection to a remote
//! endpoint and reports everything that happens on it as [`SseEvent`]s on a
//! channel. It knows nothing about controllers or notification categories;
//! the consuming crate adapts it to its own session abstraction.
//!
//! # Failure classes
//!
//! Every error is reported together with the source's [`ReadyState`]:
//!
//! - `Connecting`: transient. The network dropped, the body ended, or the
//!   endpoint answered 500/502/503/504. The source retries in place after
//!   the retry interval.
//! - `Closed`: fatal. Any other status or a wrong content type. The source
//!   stops and emits [`SseEvent::Closed`].
//!
//! # Example
//!
//! ```no_run
//! use sse_client::{Credentials, EventSource, SseConfig, SseEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sse_client::SseError> {
//!     let config = SseConfig::new("http://controller:8080/notifications")
//!         .with_credentials(Credentials::new("admin", "secret"));
//!
//!     let (source, mut events) = EventSource::connect(config)?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SseEvent::Message(message) => println!("{}", message.data),
//!             SseEvent::Closed => break,
//!             _ => {}
//!         }
//!     }
//!
//!     source.close().await
//! }
//! ```
//!
//! # Private Workspace Crate
//!
//! This crate is intended for internal use within the workspace.

mod config;
mod error;
mod event_source;
pub mod parse;

pub use config::{Credentials, SseConfig};
pub use error::{Result, SseError};
pub use event_source::{EventReceiver, EventSource, ReadyState, SseEvent};
pub use parse::MessageEvent;
