use crate::domain::MalformedEventError;
use common::domain::{EncryptedPayload, EventKind, RawEvent};
use serde_json::Value;

/// What a single feed event asks the pipeline to do
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RoutedEvent {
    /// The event was the root snapshot replayed on (re)connection
    pub initial_sync: bool,
    /// New ciphertexts, in delivery order
    pub payloads: Vec<EncryptedPayload>,
    /// Items skipped because they were not strings
    pub malformed: Vec<MalformedEventError>,
}

impl RoutedEvent {
    fn initial_sync() -> Self {
        Self {
            initial_sync: true,
            ..Default::default()
        }
    }
}

/// Interpret one feed notification.
///
/// - full-replace at the root: initial snapshot, nothing to process
/// - full-replace below the root: one new child, expected to be a string
/// - partial-patch: a batch of children, each expected to be a string
/// - anything else: ignored
///
/// A batch is materialized in full before any payload is processed, so the
/// caller gets the payloads as one ordered `Vec` rather than a lazy sequence.
pub fn route(event: RawEvent) -> RoutedEvent {
    match event.kind {
        EventKind::FullReplace if event.is_root() => RoutedEvent::initial_sync(),
        EventKind::FullReplace => match event.payload {
            Value::String(encoded) => RoutedEvent {
                payloads: vec![EncryptedPayload::new(encoded)],
                ..Default::default()
            },
            other => RoutedEvent {
                malformed: vec![MalformedEventError {
                    path: event.path,
                    key: None,
                    reason: format!("expected a string, found {}", describe(&other)),
                }],
                ..Default::default()
            },
        },
        EventKind::PartialPatch => route_batch(event.path, event.payload),
        EventKind::Other(_) => RoutedEvent::default(),
    }
}

fn route_batch(path: String, payload: Value) -> RoutedEvent {
    let Value::Object(children) = payload else {
        return RoutedEvent {
            malformed: vec![MalformedEventError {
                reason: format!("expected a mapping of children, found {}", describe(&payload)),
                path,
                key: None,
            }],
            ..Default::default()
        };
    };

    let mut routed = RoutedEvent::default();
    for (key, value) in children {
        match value {
            Value::String(encoded) => routed.payloads.push(EncryptedPayload::new(encoded)),
            other => routed.malformed.push(MalformedEventError {
                path: path.clone(),
                reason: format!("expected a string, found {}", describe(&other)),
                key: Some(key),
            }),
        }
    }
    routed
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}
