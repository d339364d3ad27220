//! Long-lived event-stream connection with readiness tracking.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::StatusCode;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use crate::config::SseConfig;
use crate::error::{Result, SseError};
use crate::parse::{EventParser, Frame, MessageEvent};

/// Readiness of an [`EventSource`], with the numeric values browsers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ReadyState {
    /// Connecting, or waiting to retry after a transient failure
    Connecting = 0,
    /// Response headers accepted, events are flowing
    Open = 1,
    /// Permanently closed; no further retries
    Closed = 2,
}

impl ReadyState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReadyState::Connecting,
            1 => ReadyState::Open,
            _ => ReadyState::Closed,
        }
    }
}

/// Events emitted by an [`EventSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// The endpoint accepted the connection
    Open,
    /// An event was dispatched by the endpoint
    Message(MessageEvent),
    /// Something went wrong. `ready_state` tells whether the source will
    /// retry in place (`Connecting`) or has given up (`Closed`).
    Error { ready_state: ReadyState, reason: String },
    /// The source terminated. Emitted exactly once, always last.
    Closed,
}

/// Receiving half for [`SseEvent`]s.
pub type EventReceiver = mpsc::UnboundedReceiver<SseEvent>;

struct Shared {
    url: String,
    state: AtomicU8,
}

/// Owned by the handles only, so dropping the last handle drops the
/// shutdown sender and stops the connection task.
struct Control {
    shutdown_tx: watch::Sender<bool>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl Shared {
    fn state(&self) -> ReadyState {
        ReadyState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: ReadyState) {
        // Closed is terminal.
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != ReadyState::Closed as u8).then_some(state as u8)
            });
    }
}

/// Handle to a background event-stream connection.
///
/// Cloning the handle is cheap; all clones control the same connection. The
/// connection task stops when [`close`](Self::close) is called or when every
/// handle has been dropped.
#[derive(Clone)]
pub struct EventSource {
    shared: Arc<Shared>,
    control: Arc<Control>,
}

impl std::fmt::Debug for EventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSource")
            .field("url", &self.shared.url)
            .field("ready_state", &self.shared.state())
            .finish()
    }
}

/// Outcome of a single connection attempt.
enum Attempt {
    /// Retry in place after the retry interval
    Transient(String),
    /// Give up
    Fatal(String),
}

impl EventSource {
    /// Validate `config` and start connecting in the background.
    ///
    /// Returns as soon as the connection task is spawned; the caller learns
    /// about the handshake through [`SseEvent::Open`] or [`SseEvent::Error`].
    /// Must be called from within a tokio runtime.
    pub fn connect(config: SseConfig) -> Result<(Self, EventReceiver)> {
        let url = config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()?;

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            url: config.url.clone(),
            state: AtomicU8::new(ReadyState::Connecting as u8),
        });

        let driver = tokio::spawn(Self::drive(
            config,
            url,
            client,
            Arc::clone(&shared),
            events_tx,
            shutdown_rx,
        ));

        let control = Arc::new(Control {
            shutdown_tx,
            driver: Mutex::new(Some(driver)),
        });

        Ok((Self { shared, control }, events_rx))
    }

    /// The endpoint this source connects to.
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Current readiness.
    pub fn ready_state(&self) -> ReadyState {
        self.shared.state()
    }

    /// Close the connection and wait for the background task to finish.
    ///
    /// Safe to call any number of times.
    pub async fn close(&self) -> Result<()> {
        self.shared.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
        let _ = self.control.shutdown_tx.send(true);

        let driver = self.control.driver.lock().await.take();
        match driver {
            Some(handle) => handle
                .await
                .map_err(|e| SseError::DriverFailed(e.to_string())),
            None => Ok(()),
        }
    }

    async fn drive(
        config: SseConfig,
        url: Url,
        client: reqwest::Client,
        shared: Arc<Shared>,
        events_tx: mpsc::UnboundedSender<SseEvent>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let mut parser = EventParser::new();
        let mut retry_interval = config.retry_interval;

        loop {
            if *shutdown_rx.borrow() || shared.state() == ReadyState::Closed {
                break;
            }

            let attempt = tokio::select! {
                _ = shutdown_rx.changed() => break,
                attempt = Self::attempt(
                    &config,
                    &url,
                    &client,
                    &shared,
                    &events_tx,
                    &mut parser,
                    &mut retry_interval,
                ) => attempt,
            };

            match attempt {
                Attempt::Transient(reason) => {
                    if shared.state() == ReadyState::Closed {
                        break;
                    }
                    shared.set_state(ReadyState::Connecting);
                    parser.reset_pending();
                    tracing::debug!(
                        url = %shared.url,
                        retry_in_ms = retry_interval.as_millis() as u64,
                        "Event stream interrupted: {}",
                        reason
                    );
                    let _ = events_tx.send(SseEvent::Error {
                        ready_state: ReadyState::Connecting,
                        reason,
                    });

                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(retry_interval) => {}
                    }
                }
                Attempt::Fatal(reason) => {
                    shared.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
                    tracing::debug!(url = %shared.url, "Event stream failed permanently: {}", reason);
                    let _ = events_tx.send(SseEvent::Error {
                        ready_state: ReadyState::Closed,
                        reason,
                    });
                    break;
                }
            }
        }

        shared.state.store(ReadyState::Closed as u8, Ordering::SeqCst);
        let _ = events_tx.send(SseEvent::Closed);
    }

    async fn attempt(
        config: &SseConfig,
        url: &Url,
        client: &reqwest::Client,
        shared: &Shared,
        events_tx: &mpsc::UnboundedSender<SseEvent>,
        parser: &mut EventParser,
        retry_interval: &mut Duration,
    ) -> Attempt {
        let mut request = client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");

        if let Some(credentials) = &config.credentials {
            request = request.basic_auth(&credentials.user, Some(&credentials.password));
        }
        for (name, value) in &config.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(id) = parser.last_event_id() {
            request = request.header("Last-Event-ID", id);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Attempt::Transient(SseError::Request(e).to_string()),
        };

        let status = response.status();
        if status != StatusCode::OK {
            let error = SseError::UnexpectedStatus(status.as_u16());
            return match status {
                StatusCode::INTERNAL_SERVER_ERROR
                | StatusCode::BAD_GATEWAY
                | StatusCode::SERVICE_UNAVAILABLE
                | StatusCode::GATEWAY_TIMEOUT => Attempt::Transient(error.to_string()),
                _ => Attempt::Fatal(error.to_string()),
            };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if !content_type.starts_with("text/event-stream") {
            return Attempt::Fatal(SseError::InvalidContentType(content_type).to_string());
        }

        shared.set_state(ReadyState::Open);
        let _ = events_tx.send(SseEvent::Open);

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return Attempt::Transient(SseError::Request(e).to_string()),
            };

            for frame in parser.feed(&bytes) {
                match frame {
                    Frame::Message(message) => {
                        let _ = events_tx.send(SseEvent::Message(message));
                    }
                    Frame::Retry(interval) => *retry_interval = interval,
                }
            }
        }

        Attempt::Transient("stream ended".to_string())
    }
}
