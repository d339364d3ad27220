//! Incremental parser for the `text/event-stream` wire format.
//!
//! Bytes arrive in arbitrary chunks from the HTTP body. The parser keeps the
//! partial line and the event being assembled between calls to
//! [`EventParser::feed`], and yields a [`Frame`] whenever a blank line
//! completes an event or a `retry:` field is seen.

use std::time::Duration;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// A dispatched event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    /// Event type, `"message"` unless the server sent an `event:` field
    pub event_type: String,
    /// Payload; multiple `data:` lines are joined with `\n`
    pub data: String,
    /// Last event ID in effect when this event was dispatched
    pub last_event_id: Option<String>,
}

impl MessageEvent {
    /// True for unnamed events, the ones an `onmessage` listener receives.
    pub fn is_default_type(&self) -> bool {
        self.event_type == "message"
    }
}

/// Output of the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Message(MessageEvent),
    /// Server-requested reconnection delay
    Retry(Duration),
}

/// Stateful event-stream parser.
#[derive(Debug, Default)]
pub struct EventParser {
    line: Vec<u8>,
    skip_lf: bool,
    bom_checked: bool,
    event_type: String,
    data: String,
    last_event_id: Option<String>,
}

impl EventParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of body bytes and collect every completed frame.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }

            match byte {
                b'\r' => {
                    self.skip_lf = true;
                    self.finish_line(&mut frames);
                }
                b'\n' => self.finish_line(&mut frames),
                _ => self.line.push(byte),
            }
        }

        frames
    }

    /// The ID sent with `Last-Event-ID` on the next connection attempt.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Drop any partially received line or event. Called when a connection
    /// ends; the last event ID survives.
    pub fn reset_pending(&mut self) {
        self.line.clear();
        self.skip_lf = false;
        self.bom_checked = false;
        self.event_type.clear();
        self.data.clear();
    }

    fn finish_line(&mut self, frames: &mut Vec<Frame>) {
        let mut line = std::mem::take(&mut self.line);

        if !self.bom_checked {
            self.bom_checked = true;
            if line.starts_with(BOM) {
                line.drain(..BOM.len());
            }
        }

        if let Some(frame) = self.process_line(&line) {
            frames.push(frame);
        }
    }

    fn process_line(&mut self, line: &[u8]) -> Option<Frame> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line[0] == b':' {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_ref(), ""),
        };

        match field {
            "event" => self.event_type = value.to_string(),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(millis) = value.parse::<u64>() {
                        return Some(Frame::Retry(Duration::from_millis(millis)));
                    }
                }
            }
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<Frame> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }

        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }

        Some(Frame::Message(MessageEvent {
            event_type: if event_type.is_empty() {
                "message".to_string()
            } else {
                event_type
            },
            data,
            last_event_id: self.last_event_id.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn messages(frames: Vec<Frame>) -> Vec<MessageEvent> {
        frames
            .into_iter()
            .filter_map(|f| match f {
                Frame::Message(m) => Some(m),
                Frame::Retry(_) => None,
            })
            .collect()
    }

    #[rstest]
    #[case::lf("data: hello\n\n")]
    #[case::cr("data: hello\r\r")]
    #[case::crlf("data: hello\r\n\r\n")]
    fn test_line_endings(#[case] input: &str) {
        let mut parser = EventParser::new();
        let events = messages(parser.feed(input.as_bytes()));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert_eq!(events[0].event_type, "message");
    }

    #[test]
    fn test_multiline_data_is_joined() {
        let mut parser = EventParser::new();
        let events = messages(parser.feed(b"data: first\ndata: second\n\n"));
        assert_eq!(events[0].data, "first\nsecond");
    }

    #[test]
    fn test_chunk_boundaries() {
        let mut parser = EventParser::new();
        assert!(parser.feed(b"da").is_empty());
        assert!(parser.feed(b"ta: {\"state\":").is_empty());
        assert!(parser.feed(b"\"up\"}\r").is_empty());
        let events = messages(parser.feed(b"\n\r\n"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"state\":\"up\"}");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut parser = EventParser::new();
        let events = messages(parser.feed(b": keep-alive\nfoo: bar\ndata: x\n\n"));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_named_event_and_id() {
        let mut parser = EventParser::new();
        let events = messages(parser.feed(b"event: alarm\nid: 42\ndata: on\n\n"));
        assert_eq!(events[0].event_type, "alarm");
        assert!(!events[0].is_default_type());
        assert_eq!(events[0].last_event_id.as_deref(), Some("42"));
        assert_eq!(parser.last_event_id(), Some("42"));
    }

    #[test]
    fn test_id_with_nul_is_ignored() {
        let mut parser = EventParser::new();
        parser.feed(b"id: 1\n\nid: a\0b\n\n");
        assert_eq!(parser.last_event_id(), Some("1"));
    }

    #[test]
    fn test_event_without_data_is_dropped() {
        let mut parser = EventParser::new();
        assert!(messages(parser.feed(b"event: ping\n\n")).is_empty());

        // The event type does not leak into the next event
        let events = messages(parser.feed(b"data: y\n\n"));
        assert_eq!(events[0].event_type, "message");
    }

    #[test]
    fn test_retry_field() {
        let mut parser = EventParser::new();
        let frames = parser.feed(b"retry: 2500\nretry: 1x\n\n");
        assert_eq!(frames, vec![Frame::Retry(Duration::from_millis(2500))]);
    }

    #[test]
    fn test_leading_bom_is_stripped() {
        let mut parser = EventParser::new();
        let events = messages(parser.feed(b"\xEF\xBB\xBFdata: bom\n\n"));
        assert_eq!(events[0].data, "bom");
    }

    #[test]
    fn test_reset_discards_partial_event_but_keeps_id() {
        let mut parser = EventParser::new();
        parser.feed(b"id: 7\n\ndata: partial\n");
        parser.reset_pending();
        assert!(messages(parser.feed(b"\n")).is_empty());
        assert_eq!(parser.last_event_id(), Some("7"));
    }
}
