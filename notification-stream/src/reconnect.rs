//! Session tasks and delayed recovery of failed streams
//!
//! Every registered session gets a task that drains its events, hands
//! messages to the caller's handler and reacts to failures. A transient error
//! is only logged: the transport keeps retrying in place. A fatal error
//! deregisters the session, closes it and schedules a fresh session for the
//! same key after the configured reconnect delay.
//!
//! Pending reconnects are tracked by the [`StreamRegistry`], so a deliberate
//! removal of the key cancels them.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use sse_client::Credentials;
use tracing::{debug, error, info, warn};

use crate::connector::{SessionConnector, SessionRequest};
use crate::error::Result;
use crate::notification::{Notification, NotificationHandler};
use crate::registry::{SessionId, StreamRegistry};
use crate::session::{ConnectionState, SessionAction, SessionEvent, SessionEvents};
use crate::types::{RegisteredController, StreamCategory, StreamKey};

/// Everything needed to (re-)open one stream.
#[derive(Clone)]
pub struct StreamRequest {
    pub target_url: String,
    pub controller: RegisteredController,
    pub handler: Arc<dyn NotificationHandler>,
    pub category: StreamCategory,
    pub credentials: Credentials,
}

impl StreamRequest {
    pub fn key(&self) -> StreamKey {
        StreamKey::for_controller(&self.controller, self.category)
    }

    fn session_request(&self) -> SessionRequest {
        SessionRequest {
            url: self.target_url.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

impl std::fmt::Debug for StreamRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamRequest")
            .field("target_url", &self.target_url)
            .field("controller", &self.controller)
            .field("category", &self.category)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

/// Opens sessions, runs their event loops and re-opens them after fatal
/// failures.
pub struct ReconnectController {
    registry: Arc<StreamRegistry>,
    connector: Arc<dyn SessionConnector>,
    reconnect_delay: Duration,
}

impl ReconnectController {
    pub fn new(
        registry: Arc<StreamRegistry>,
        connector: Arc<dyn SessionConnector>,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            registry,
            connector,
            reconnect_delay,
        }
    }

    /// Create the session for `request`, register it and start its task.
    ///
    /// Returns once the session exists; the handshake runs in the
    /// background.
    pub fn start(self: &Arc<Self>, request: StreamRequest) -> Result<SessionId> {
        debug!(
            url = %request.target_url,
            controller = %request.controller,
            category = %request.category,
            "Starting event source"
        );

        let parts = self.connector.connect(&request.session_request())?;
        let session_id = self.registry.add(request.key(), parts.session);
        self.spawn_session_task(request, session_id, parts.events);

        Ok(session_id)
    }

    fn spawn_session_task(
        self: &Arc<Self>,
        request: StreamRequest,
        session_id: SessionId,
        events: SessionEvents,
    ) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_session(request, session_id, events).await;
        });
    }

    async fn run_session(
        self: Arc<Self>,
        request: StreamRequest,
        session_id: SessionId,
        mut events: SessionEvents,
    ) {
        let mut state = ConnectionState::Opening;

        while let Some(event) = events.next().await {
            log_event(&request, session_id, &event);

            let (next, action) = state.on_event(event);
            state = next;

            match action {
                SessionAction::None => {}
                SessionAction::Dispatch(payload) => {
                    request.handler.handle(&Notification {
                        payload,
                        controller_name: request.controller.name.clone(),
                        controller_release: request.controller.release.clone(),
                        source_url: request.target_url.clone(),
                        category: request.category,
                    });
                }
                SessionAction::Recover => {
                    self.recover(&request, session_id).await;
                }
            }

            if state.is_closed() {
                break;
            }
        }

        debug!(session_id = %session_id, key = %request.key(), "Session task finished");
    }

    /// Deregister and close the failed session, then schedule a re-open.
    async fn recover(self: &Arc<Self>, request: &StreamRequest, session_id: SessionId) {
        let key = request.key();

        let Some((session, chain)) = self.registry.begin_recovery(&key, session_id) else {
            debug!(
                key = %key,
                session_id = %session_id,
                "Stream was already removed, not reconnecting"
            );
            return;
        };

        info!(
            controller = %request.controller,
            category = %request.category,
            delay = ?self.reconnect_delay,
            "Connection to controller interrupted, reconnecting after delay"
        );

        self.registry
            .close_detached(&key, Some(session_id), session)
            .await;
        debug!(key = %key, session_id = %session_id, "Closed failed stream");

        self.schedule(request.clone(), chain);
    }

    /// Start the delay timer of retry chain `chain`.
    fn schedule(self: &Arc<Self>, request: StreamRequest, chain: u64) {
        let key = request.key();
        let controller = Arc::clone(self);
        let delay = self.reconnect_delay;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            controller.reopen(request, chain).await;
        });

        if !self.registry.arm_recovery(&key, chain, timer.abort_handle()) {
            timer.abort();
            debug!(key = %key, "Reconnect was cancelled before its timer started");
        }
    }

    async fn reopen(self: Arc<Self>, request: StreamRequest, chain: u64) {
        let key = request.key();
        if !self.registry.recovery_is_live(&key, chain) {
            return;
        }

        let parts = match self.connector.connect(&request.session_request()) {
            Ok(parts) => parts,
            Err(e) => {
                error!(
                    controller = %request.controller,
                    category = %request.category,
                    "Could not re-open stream, retrying after delay: {}",
                    e
                );
                self.schedule(request, chain);
                return;
            }
        };

        match self.registry.commit_recovery(&key, chain, parts.session) {
            Ok(session_id) => {
                self.spawn_session_task(request, session_id, parts.events);
                info!(key = %key, session_id = %session_id, "Stream reestablished");
            }
            Err(session) => {
                warn!(key = %key, "Stream was removed while reconnecting, discarding new session");
                self.registry.close_detached(&key, None, session).await;
            }
        }
    }
}

fn log_event(request: &StreamRequest, session_id: SessionId, event: &SessionEvent) {
    match event {
        SessionEvent::Opened => {
            debug!(
                url = %request.target_url,
                session_id = %session_id,
                "Listening to stream for notifications"
            );
        }
        SessionEvent::Message(payload) => {
            debug!(
                controller = %request.controller,
                category = %request.category,
                "Received event: {}",
                payload
            );
        }
        SessionEvent::Error(cause) => {
            error!(
                controller = %request.controller,
                category = %request.category,
                readiness = ?cause.readiness,
                "Error on notification stream: {}",
                cause.detail
            );
        }
        SessionEvent::Closed => {
            debug!(url = %request.target_url, session_id = %session_id, "Event source closed");
        }
    }
}
