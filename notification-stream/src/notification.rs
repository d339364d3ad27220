//! Hand-off point between a stream session and the caller's dispatcher.

use crate::types::StreamCategory;

/// One event received on a stream, together with where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Raw event payload, unparsed
    pub payload: String,
    pub controller_name: String,
    pub controller_release: String,
    /// URL of the stream the event arrived on
    pub source_url: String,
    pub category: StreamCategory,
}

/// Receives every event of the streams it was registered with.
///
/// Called synchronously from the session's task, in the order the transport
/// delivered the events. Implementations that do heavy work should hand the
/// notification off to their own queue.
///
/// Any `Fn(&Notification) + Send + Sync` closure is a handler:
///
/// ```
/// use notification_stream::{Notification, NotificationHandler};
/// use std::sync::Arc;
///
/// let handler: Arc<dyn NotificationHandler> = Arc::new(|n: &Notification| {
///     println!("{} {}: {}", n.controller_name, n.category, n.payload);
/// });
/// ```
pub trait NotificationHandler: Send + Sync {
    fn handle(&self, notification: &Notification);
}

impl<F> NotificationHandler for F
where
    F: Fn(&Notification) + Send + Sync,
{
    fn handle(&self, notification: &Notification) {
        self(notification)
    }
}
