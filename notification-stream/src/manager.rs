//! Public facade over the stream registry and the reconnection controller
//!
//! Callers construct one [`NotificationStreamManager`] and share it. It owns
//! the registry, so tests and embedders can run several independent managers
//! in one process.

use std::sync::Arc;

use sse_client::Credentials;
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::connector::{SessionConnector, SseConnector};
use crate::error::Result;
use crate::notification::NotificationHandler;
use crate::reconnect::{ReconnectController, StreamRequest};
use crate::registry::{SessionId, StreamRegistry, StreamSnapshot};
use crate::types::{RegisteredController, StreamCategory, StreamKey};

/// Manages notification streams to remote controllers.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use notification_stream::{
///     Notification, NotificationStreamManager, RegisteredController, StreamCategory,
/// };
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = NotificationStreamManager::new()?;
/// let controller = RegisteredController::new("ctrl1", "v1");
///
/// manager.start_stream(
///     "http://ctrl1.example:8181/streams/device",
///     &controller,
///     Arc::new(|n: &Notification| println!("{}", n.payload)),
///     StreamCategory::Device,
///     "admin",
///     "secret",
/// )?;
///
/// assert!(manager.check_if_stream_is_active(&controller, StreamCategory::Device));
///
/// manager.remove_all_streams_for_controller("ctrl1", "v1").await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct NotificationStreamManager {
    registry: Arc<StreamRegistry>,
    controller: Arc<ReconnectController>,
    config: StreamConfig,
}

impl NotificationStreamManager {
    /// Create a manager with default configuration.
    pub fn new() -> Result<Self> {
        Self::with_config(StreamConfig::default())
    }

    /// Create a manager backed by the SSE transport.
    pub fn with_config(config: StreamConfig) -> Result<Self> {
        config.validate()?;
        let connector = Arc::new(SseConnector::new(&config));
        Self::with_connector(config, connector)
    }

    /// Create a manager that opens sessions through `connector`.
    pub fn with_connector(
        config: StreamConfig,
        connector: Arc<dyn SessionConnector>,
    ) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(StreamRegistry::new(config.close_timeout));
        let controller = Arc::new(ReconnectController::new(
            Arc::clone(&registry),
            connector,
            config.reconnect_delay,
        ));

        Ok(Self {
            registry,
            controller,
            config,
        })
    }

    /// Open a stream to `target_url` and register it under
    /// `controller`/`category`.
    ///
    /// The stream is registered immediately, before the transport confirms
    /// the connection. Every event received is handed to `handler`. An
    /// existing stream for the same key is not replaced; call
    /// [`remove_stream`](Self::remove_stream) first.
    pub fn start_stream(
        &self,
        target_url: &str,
        controller: &RegisteredController,
        handler: Arc<dyn NotificationHandler>,
        category: StreamCategory,
        user: &str,
        password: &str,
    ) -> Result<SessionId> {
        self.controller.start(StreamRequest {
            target_url: target_url.to_string(),
            controller: controller.clone(),
            handler,
            category,
            credentials: Credentials::new(user, password),
        })
    }

    /// Tear down the stream of `controller` for `category`.
    ///
    /// A reconnect pending for that stream is cancelled.
    pub async fn remove_stream(&self, controller: &RegisteredController, category: StreamCategory) {
        self.registry
            .remove(&StreamKey::for_controller(controller, category))
            .await;
    }

    /// Tear down all three streams of a controller.
    pub async fn remove_all_streams_for_controller(&self, name: &str, release: &str) {
        debug!(controller = name, release, "Removing all streams for controller");
        self.registry.remove_all_for_controller(name, release).await;
    }

    pub fn check_if_stream_is_active(
        &self,
        controller: &RegisteredController,
        category: StreamCategory,
    ) -> bool {
        self.registry
            .exists(&StreamKey::for_controller(controller, category))
    }

    /// Increment the event counter of a stream. Returns the new value, or -1
    /// if no such stream is registered.
    pub fn increase_counter(&self, name: &str, release: &str, category: StreamCategory) -> i64 {
        self.registry
            .increment_counter(&StreamKey::new(name, release, category))
    }

    /// Snapshot of every registered stream, for diagnostics.
    pub fn get_all_elements(&self) -> Vec<StreamSnapshot> {
        self.registry.list_all()
    }

    /// Streams that failed and are waiting to be re-opened.
    pub fn pending_reconnects(&self) -> Vec<StreamKey> {
        self.registry.pending_reconnects()
    }

    pub fn registry(&self) -> &Arc<StreamRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Cancel every pending reconnect and tear down every stream.
    pub async fn shutdown(&self) {
        let cancelled = self.registry.cancel_all_recoveries();
        let keys = self.registry.keys();
        let streams = keys.len();

        for key in keys {
            self.registry.remove(&key).await;
        }

        info!(streams, cancelled, "Notification stream manager shut down");
    }
}

impl std::fmt::Debug for NotificationStreamManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationStreamManager")
            .field("streams", &self.registry.len())
            .field("config", &self.config)
            .finish()
    }
}
