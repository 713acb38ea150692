use crate::domain::{DomainError, DomainResult, EventKind, RawEvent, RawEventStream};
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

/// One dispatched Server-Sent Events frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder.
///
/// Chunks may split lines (and UTF-8 sequences) anywhere; only complete lines
/// are interpreted.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every frame it completes
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.apply_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn apply_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        if self.event.is_none() && self.data.is_empty() {
            return None;
        }

        let event = self.event.take().unwrap_or_else(|| "message".to_string());
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data })
    }
}

#[derive(Debug, Deserialize)]
struct FramePayload {
    path: String,
    #[serde(default)]
    data: Value,
}

/// Map a Realtime Database stream frame to a feed event.
///
/// `keep-alive` frames produce nothing; `cancel` and `auth_revoked` end the
/// subscription.
pub fn frame_to_event(frame: SseFrame) -> Option<DomainResult<RawEvent>> {
    match frame.event.as_str() {
        "keep-alive" => None,
        "cancel" => Some(Err(DomainError::FeedClosed(frame.data))),
        "auth_revoked" => Some(Err(DomainError::AuthRevoked)),
        name => {
            let kind = EventKind::from_wire(name);
            match serde_json::from_str::<FramePayload>(&frame.data) {
                Ok(payload) => Some(Ok(RawEvent::new(payload.path, kind, payload.data))),
                Err(e) => Some(Err(DomainError::MalformedFrame(format!(
                    "{} frame: {}",
                    name, e
                )))),
            }
        }
    }
}

/// Turn an HTTP body stream into a stream of feed events.
///
/// Every received chunk, keep-alives included, restarts the idle deadline. A
/// body that stays silent for `idle_timeout` yields one error and the stream
/// ends, as does a failed read.
pub fn decode_event_stream<S, E>(body: S, idle_timeout: Duration) -> RawEventStream
where
    S: futures::Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = Some((
        body.boxed(),
        SseDecoder::new(),
        VecDeque::<DomainResult<RawEvent>>::new(),
    ));

    stream::unfold(state, move |state| async move {
        let Some((mut body, mut decoder, mut pending)) = state else {
            return None;
        };
        loop {
            if let Some(item) = pending.pop_front() {
                return Some((item, Some((body, decoder, pending))));
            }

            match tokio::time::timeout(idle_timeout, body.next()).await {
                Ok(Some(Ok(chunk))) => {
                    for frame in decoder.push(&chunk) {
                        if let Some(item) = frame_to_event(frame) {
                            pending.push_back(item);
                        }
                    }
                }
                Ok(Some(Err(e))) => {
                    let error = DomainError::FeedError(format!("stream read failed: {}", e));
                    return Some((Err(error), None));
                }
                Ok(None) => {
                    debug!("event stream body ended");
                    return None;
                }
                Err(_) => {
                    warn!(idle_timeout = ?idle_timeout, "event stream went silent");
                    let error = DomainError::FeedError(format!(
                        "no data received for {:?}",
                        idle_timeout
                    ));
                    return Some((Err(error), None));
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decoder_handles_split_chunks() {
        let mut decoder = SseDecoder::new();

        assert!(decoder.push(b"event: pu").is_empty());
        assert!(decoder.push(b"t\ndata: {\"path\":\"/\",").is_empty());
        let frames = decoder.push(b"\"data\":null}\n\n");

        assert_eq!(
            frames,
            vec![SseFrame {
                event: "put".to_string(),
                data: r#"{"path":"/","data":null}"#.to_string(),
            }]
        );
    }

    #[test]
    fn test_decoder_handles_crlf_and_comments() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b": hello\r\nevent: keep-alive\r\ndata: null\r\n\r\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "keep-alive");
        assert_eq!(frames[0].data, "null");
    }

    #[test]
    fn test_decoder_joins_multiline_data() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.push(b"event: patch\ndata: {\"path\":\"/\",\ndata: \"data\":{}}\n\n");

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "{\"path\":\"/\",\n\"data\":{}}");
    }

    #[test]
    fn test_put_frame_becomes_full_replace() {
        let frame = SseFrame {
            event: "put".to_string(),
            data: r#"{"path":"/-NxA1","data":"q83vEjRWeJA="}"#.to_string(),
        };

        let event = frame_to_event(frame).unwrap().unwrap();

        assert_eq!(event.kind, EventKind::FullReplace);
        assert_eq!(event.path, "/-NxA1");
        assert_eq!(event.payload, json!("q83vEjRWeJA="));
    }

    #[test]
    fn test_keep_alive_is_dropped() {
        let frame = SseFrame {
            event: "keep-alive".to_string(),
            data: "null".to_string(),
        };
        assert!(frame_to_event(frame).is_none());
    }

    #[test]
    fn test_cancel_and_auth_revoked_are_errors() {
        let cancel = SseFrame {
            event: "cancel".to_string(),
            data: "permission denied".to_string(),
        };
        assert!(matches!(
            frame_to_event(cancel),
            Some(Err(DomainError::FeedClosed(_)))
        ));

        let revoked = SseFrame {
            event: "auth_revoked".to_string(),
            data: "credential is no longer valid".to_string(),
        };
        assert!(matches!(
            frame_to_event(revoked),
            Some(Err(DomainError::AuthRevoked))
        ));
    }

    #[test]
    fn test_unparseable_frame_is_malformed() {
        let frame = SseFrame {
            event: "patch".to_string(),
            data: "{not json".to_string(),
        };
        assert!(matches!(
            frame_to_event(frame),
            Some(Err(DomainError::MalformedFrame(_)))
        ));
    }

    #[tokio::test]
    async fn test_decode_event_stream_skips_keep_alive() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(
                b"event: put\ndata: {\"path\":\"/\",\"data\":{\"-a\":\"x\"}}\n\n",
            )),
            Ok(Bytes::from_static(b"event: keep-alive\ndata: null\n\n")),
            Ok(Bytes::from_static(
                b"event: patch\ndata: {\"path\":\"/\",\"data\":{\"-b\":\"y\"}}\n\n",
            )),
        ];

        let events: Vec<_> = decode_event_stream(stream::iter(chunks), Duration::from_secs(5))
            .collect()
            .await;

        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        let second = events[1].as_ref().unwrap();
        assert_eq!(first.kind, EventKind::FullReplace);
        assert!(first.is_root());
        assert_eq!(second.kind, EventKind::PartialPatch);
        assert_eq!(second.payload, json!({"-b": "y"}));
    }

    #[tokio::test]
    async fn test_silent_body_errors_then_ends() {
        let first: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from_static(
            b"event: put\ndata: {\"path\":\"/\",\"data\":null}\n\n",
        ))];
        let body = stream::iter(first).chain(stream::pending());

        let mut events = decode_event_stream(body, Duration::from_millis(50));

        let initial = events.next().await.unwrap().unwrap();
        assert!(initial.is_root());

        let silent = tokio::time::timeout(Duration::from_secs(5), events.next())
            .await
            .expect("idle deadline did not fire");
        assert!(matches!(silent, Some(Err(DomainError::FeedError(_)))));
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_keep_alive_chunks_hold_the_stream_open() {
        let keep_alive = || -> Result<Bytes, std::io::Error> {
            Ok(Bytes::from_static(b"event: keep-alive\ndata: null\n\n"))
        };
        let body = stream::iter(vec![keep_alive(), keep_alive(), keep_alive()])
            .then(|chunk| async move {
                tokio::time::sleep(Duration::from_millis(30)).await;
                chunk
            })
            .chain(stream::iter(vec![Ok(Bytes::from_static(
                b"event: put\ndata: {\"path\":\"/-a\",\"data\":\"x\"}\n\n",
            ))]));

        let events: Vec<_> = decode_event_stream(body, Duration::from_millis(100))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].as_ref().unwrap().path, "/-a");
    }

    #[tokio::test]
    async fn test_read_error_ends_stream() {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from_static(
                b"event: put\ndata: {\"path\":\"/-a\",\"data\":\"x\"}\n\n",
            )),
        ];

        let events: Vec<_> = decode_event_stream(stream::iter(chunks), Duration::from_secs(5))
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(DomainError::FeedError(_))));
    }
}
