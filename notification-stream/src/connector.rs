//! Adapter between the generic `sse-client` crate and stream sessions.
//!
//! The reconnection controller never talks to the transport directly. It asks
//! a [`SessionConnector`] for a new session and receives the session handle
//! plus the stream of its lifecycle events. [`SseConnector`] is the production
//! connector; tests substitute their own.

use async_trait::async_trait;
use futures::StreamExt;
use sse_client::{Credentials, EventSource, SseConfig, SseError, SseEvent};

use crate::config::StreamConfig;
use crate::error::{Result, SessionError, StreamError};
use crate::session::{ErrorCause, SessionEvent, SessionEvents, StreamSession};

/// Everything a connector needs to open one session.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub url: String,
    pub credentials: Credentials,
}

/// A freshly created session and its events.
pub struct SessionParts {
    pub session: Box<dyn StreamSession>,
    pub events: SessionEvents,
}

/// Creates stream sessions.
///
/// `connect` must not wait for the remote side: it returns as soon as the
/// session exists, and the handshake outcome arrives as the first event.
pub trait SessionConnector: Send + Sync {
    fn connect(&self, request: &SessionRequest) -> Result<SessionParts>;
}

/// Connector backed by [`sse_client::EventSource`].
#[derive(Debug, Clone)]
pub struct SseConnector {
    config: StreamConfig,
}

impl SseConnector {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl SessionConnector for SseConnector {
    fn connect(&self, request: &SessionRequest) -> Result<SessionParts> {
        let sse_config = SseConfig::new(request.url.clone())
            .with_credentials(request.credentials.clone())
            .with_retry_interval(self.config.transport_retry_interval)
            .with_connect_timeout(self.config.connect_timeout);

        let (source, receiver) = EventSource::connect(sse_config).map_err(|e| match e {
            SseError::InvalidUrl { url, reason } => StreamError::InvalidUrl { url, reason },
            other => StreamError::Transport(other),
        })?;

        let url = request.url.clone();
        let events = futures::stream::unfold(receiver, |mut receiver| async move {
            receiver.recv().await.map(|event| (event, receiver))
        })
        .filter_map(move |event| futures::future::ready(to_session_event(&url, event)))
        .boxed();

        Ok(SessionParts {
            session: Box::new(SseSession { source }),
            events,
        })
    }
}

fn to_session_event(url: &str, event: SseEvent) -> Option<SessionEvent> {
    match event {
        SseEvent::Open => Some(SessionEvent::Opened),
        SseEvent::Message(message) if message.is_default_type() => {
            Some(SessionEvent::Message(message.data))
        }
        SseEvent::Message(message) => {
            tracing::trace!(url, event_type = %message.event_type, "Ignoring named event");
            None
        }
        SseEvent::Error {
            ready_state,
            reason,
        } => Some(SessionEvent::Error(ErrorCause {
            readiness: ready_state.into(),
            detail: reason,
        })),
        SseEvent::Closed => Some(SessionEvent::Closed),
    }
}

/// [`StreamSession`] over an [`EventSource`].
struct SseSession {
    source: EventSource,
}

#[async_trait]
impl StreamSession for SseSession {
    fn url(&self) -> &str {
        self.source.url()
    }

    async fn close(&self) -> std::result::Result<(), SessionError> {
        self.source.close().await.map_err(SessionError::from)
    }
}
