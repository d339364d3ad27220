//! Stream session abstraction and its lifecycle state machine.
//!
//! A session wraps one transport connection. The transport reports what
//! happens on it as a stream of [`SessionEvent`]s; the session task folds
//! those through [`ConnectionState::on_event`] and carries out the returned
//! [`SessionAction`].

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::SessionError;

/// Handle to a live transport connection.
///
/// Implementations must be `Send + Sync` so the registry can own them while
/// session tasks and teardown requests run on other tasks.
#[async_trait]
pub trait StreamSession: Send + Sync {
    /// URL the session is connected to.
    fn url(&self) -> &str;

    /// Close the underlying connection.
    ///
    /// Must be safe to call on a session that is already closed.
    async fn close(&self) -> Result<(), SessionError>;
}

/// Events of a session, in delivery order.
pub type SessionEvents = BoxStream<'static, SessionEvent>;

/// Transport readiness reported along with an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Readiness {
    Connecting,
    Open,
    Closed,
}

impl From<sse_client::ReadyState> for Readiness {
    fn from(state: sse_client::ReadyState) -> Self {
        match state {
            sse_client::ReadyState::Connecting => Readiness::Connecting,
            sse_client::ReadyState::Open => Readiness::Open,
            sse_client::ReadyState::Closed => Readiness::Closed,
        }
    }
}

/// Why a session reported an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCause {
    /// Readiness of the transport when the error was raised
    pub readiness: Readiness,
    /// Human-readable detail from the transport
    pub detail: String,
}

impl ErrorCause {
    pub fn transient(detail: impl Into<String>) -> Self {
        Self {
            readiness: Readiness::Connecting,
            detail: detail.into(),
        }
    }

    pub fn fatal(detail: impl Into<String>) -> Self {
        Self {
            readiness: Readiness::Closed,
            detail: detail.into(),
        }
    }

    /// A fatal error leaves the connection unusable; only these trigger
    /// deregistration and a delayed re-open.
    pub fn is_fatal(&self) -> bool {
        self.readiness == Readiness::Closed
    }
}

/// Something that happened on a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The transport confirmed the connection
    Opened,
    /// An inbound event payload
    Message(String),
    /// A transport-level problem
    Error(ErrorCause),
    /// The session terminated, by any path
    Closed,
}

/// Lifecycle state of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Created, waiting for the transport to confirm
    Opening,
    /// Confirmed and delivering events
    Active,
    /// Saw a transient error; the transport is retrying in place
    Erroring,
    /// Terminal
    Closed,
}

/// What the session task must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Nothing beyond logging
    None,
    /// Forward the payload to the notification handler
    Dispatch(String),
    /// Deregister the session and schedule a fresh one
    Recover,
}

impl ConnectionState {
    /// Single transition function of the session lifecycle.
    pub fn on_event(self, event: SessionEvent) -> (ConnectionState, SessionAction) {
        if self == ConnectionState::Closed {
            return (ConnectionState::Closed, SessionAction::None);
        }

        match event {
            SessionEvent::Opened => (ConnectionState::Active, SessionAction::None),
            SessionEvent::Message(payload) => {
                (ConnectionState::Active, SessionAction::Dispatch(payload))
            }
            SessionEvent::Error(cause) if cause.is_fatal() => {
                (ConnectionState::Closed, SessionAction::Recover)
            }
            SessionEvent::Error(_) => (ConnectionState::Erroring, SessionAction::None),
            SessionEvent::Closed => (ConnectionState::Closed, SessionAction::None),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self == ConnectionState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::opened(ConnectionState::Opening, SessionEvent::Opened, ConnectionState::Active, SessionAction::None)]
    #[case::reopened(ConnectionState::Erroring, SessionEvent::Opened, ConnectionState::Active, SessionAction::None)]
    #[case::message(
        ConnectionState::Active,
        SessionEvent::Message("{}".to_string()),
        ConnectionState::Active,
        SessionAction::Dispatch("{}".to_string())
    )]
    #[case::transient(
        ConnectionState::Active,
        SessionEvent::Error(ErrorCause::transient("reset by peer")),
        ConnectionState::Erroring,
        SessionAction::None
    )]
    #[case::fatal_while_active(
        ConnectionState::Active,
        SessionEvent::Error(ErrorCause::fatal("401")),
        ConnectionState::Closed,
        SessionAction::Recover
    )]
    #[case::fatal_while_opening(
        ConnectionState::Opening,
        SessionEvent::Error(ErrorCause::fatal("404")),
        ConnectionState::Closed,
        SessionAction::Recover
    )]
    #[case::closed(ConnectionState::Active, SessionEvent::Closed, ConnectionState::Closed, SessionAction::None)]
    fn test_transitions(
        #[case] from: ConnectionState,
        #[case] event: SessionEvent,
        #[case] to: ConnectionState,
        #[case] action: SessionAction,
    ) {
        assert_eq!(from.on_event(event), (to, action));
    }

    #[test]
    fn test_closed_is_terminal() {
        let state = ConnectionState::Closed;
        assert_eq!(
            state.on_event(SessionEvent::Message("late".to_string())),
            (ConnectionState::Closed, SessionAction::None)
        );
        assert_eq!(
            state.on_event(SessionEvent::Error(ErrorCause::fatal("again"))),
            (ConnectionState::Closed, SessionAction::None)
        );
    }

    #[test]
    fn test_fatal_guard_uses_readiness() {
        assert!(ErrorCause::fatal("x").is_fatal());
        assert!(!ErrorCause::transient("x").is_fatal());

        let open = ErrorCause {
            readiness: Readiness::Open,
            detail: "parse hiccup".to_string(),
        };
        assert!(!open.is_fatal());
    }

    #[test]
    fn test_readiness_from_transport() {
        assert_eq!(Readiness::from(sse_client::ReadyState::Closed), Readiness::Closed);
        assert_eq!(Readiness::from(sse_client::ReadyState::Connecting), Readiness::Connecting);
    }
}
