//! Integration tests for the event-stream client against a local warp server.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use sse_client::{Credentials, EventReceiver, EventSource, ReadyState, SseConfig, SseEvent};
use warp::http::StatusCode;
use warp::Filter;

/// `Basic` token for admin:secret
const EXPECTED_AUTH: &str = "Basic YWRtaW46c2VjcmV0";

fn start_server() -> SocketAddr {
    let events = warp::path("events")
        .and(warp::header::optional::<String>("authorization"))
        .map(|auth: Option<String>| -> Box<dyn warp::Reply> {
            if auth.as_deref() != Some(EXPECTED_AUTH) {
                return Box::new(warp::reply::with_status(
                    "unauthorized",
                    StatusCode::UNAUTHORIZED,
                ));
            }

            let frames = vec![
                Ok::<_, Infallible>(warp::sse::Event::default().data("first")),
                Ok(warp::sse::Event::default().id("2").data("second")),
                Ok(warp::sse::Event::default().event("alarm").data("third")),
            ];
            let stream = futures::stream::iter(frames).chain(futures::stream::pending());
            Box::new(warp::sse::reply(stream))
        });

    let html = warp::path("html").map(|| warp::reply::html("<html></html>"));

    let unavailable = warp::path("unavailable")
        .map(|| warp::reply::with_status("busy", StatusCode::SERVICE_UNAVAILABLE));

    let (addr, server) =
        warp::serve(events.or(html).or(unavailable)).bind_ephemeral(([127, 0, 0, 1], 0));
    tokio::spawn(server);
    addr
}

async fn next_event(events: &mut EventReceiver) -> SseEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_open_and_receive_messages() {
    let addr = start_server();
    let config = SseConfig::new(format!("http://{addr}/events"))
        .with_credentials(Credentials::new("admin", "secret"));

    let (source, mut events) = EventSource::connect(config).unwrap();

    assert_eq!(next_event(&mut events).await, SseEvent::Open);
    assert_eq!(source.ready_state(), ReadyState::Open);

    match next_event(&mut events).await {
        SseEvent::Message(message) => {
            assert_eq!(message.data, "first");
            assert!(message.is_default_type());
        }
        other => panic!("Expected message, got {:?}", other),
    }

    match next_event(&mut events).await {
        SseEvent::Message(message) => {
            assert_eq!(message.data, "second");
            assert_eq!(message.last_event_id.as_deref(), Some("2"));
        }
        other => panic!("Expected message, got {:?}", other),
    }

    match next_event(&mut events).await {
        SseEvent::Message(message) => {
            assert_eq!(message.event_type, "alarm");
            assert_eq!(message.data, "third");
        }
        other => panic!("Expected message, got {:?}", other),
    }

    source.close().await.unwrap();
    assert_eq!(next_event(&mut events).await, SseEvent::Closed);
    assert_eq!(source.ready_state(), ReadyState::Closed);
}

#[tokio::test]
async fn test_missing_credentials_is_fatal() {
    let addr = start_server();
    let (source, mut events) =
        EventSource::connect(SseConfig::new(format!("http://{addr}/events"))).unwrap();

    match next_event(&mut events).await {
        SseEvent::Error { ready_state, reason } => {
            assert_eq!(ready_state, ReadyState::Closed);
            assert!(reason.contains("401"));
        }
        other => panic!("Expected fatal error, got {:?}", other),
    }
    assert_eq!(next_event(&mut events).await, SseEvent::Closed);
    assert_eq!(source.ready_state(), ReadyState::Closed);

    // Closing an already closed source is fine
    source.close().await.unwrap();
}

#[tokio::test]
async fn test_wrong_content_type_is_fatal() {
    let addr = start_server();
    let (_source, mut events) =
        EventSource::connect(SseConfig::new(format!("http://{addr}/html"))).unwrap();

    match next_event(&mut events).await {
        SseEvent::Error { ready_state, reason } => {
            assert_eq!(ready_state, ReadyState::Closed);
            assert!(reason.contains("text/html"));
        }
        other => panic!("Expected fatal error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_service_unavailable_is_transient() {
    let addr = start_server();
    let config = SseConfig::new(format!("http://{addr}/unavailable"))
        .with_retry_interval(Duration::from_millis(20));
    let (source, mut events) = EventSource::connect(config).unwrap();

    // Two transient errors in a row: the source retried in place
    for _ in 0..2 {
        match next_event(&mut events).await {
            SseEvent::Error { ready_state, reason } => {
                assert_eq!(ready_state, ReadyState::Connecting);
                assert!(reason.contains("503"));
            }
            other => panic!("Expected transient error, got {:?}", other),
        }
    }
    assert_ne!(source.ready_state(), ReadyState::Closed);

    source.close().await.unwrap();
    assert_eq!(source.ready_state(), ReadyState::Closed);
}
