use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of change notification delivered by the live feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Complete new value at `path` ("put")
    FullReplace,
    /// Several children changed at once ("patch")
    PartialPatch,
    /// Any event name this pipeline does not act on
    Other(String),
}

impl EventKind {
    pub fn from_wire(name: &str) -> Self {
        match name {
            "put" => EventKind::FullReplace,
            "patch" => EventKind::PartialPatch,
            other => EventKind::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EventKind::FullReplace => "put",
            EventKind::PartialPatch => "patch",
            EventKind::Other(name) => name,
        }
    }
}

/// A change notification from the live feed, consumed once by the router
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    /// Slash-delimited location relative to the subscribed path
    pub path: String,
    pub kind: EventKind,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(path: impl Into<String>, kind: EventKind, payload: Value) -> Self {
        Self {
            path: path.into(),
            kind,
            payload,
        }
    }

    /// True when the event addresses the subscribed location itself
    pub fn is_root(&self) -> bool {
        self.path.trim_matches('/').is_empty()
    }
}

/// Base64 ciphertext of one reading, as pushed by the device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncryptedPayload(String);

impl EncryptedPayload {
    const PREVIEW_CHARS: usize = 30;

    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    /// Leading characters of the ciphertext, for log lines
    pub fn preview(&self) -> String {
        self.0.chars().take(Self::PREVIEW_CHARS).collect()
    }
}

impl fmt::Display for EncryptedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_kind_from_wire() {
        assert_eq!(EventKind::from_wire("put"), EventKind::FullReplace);
        assert_eq!(EventKind::from_wire("patch"), EventKind::PartialPatch);
        assert_eq!(
            EventKind::from_wire("rules_debug"),
            EventKind::Other("rules_debug".to_string())
        );
    }

    #[test]
    fn test_is_root() {
        assert!(RawEvent::new("/", EventKind::FullReplace, json!({})).is_root());
        assert!(RawEvent::new("", EventKind::FullReplace, json!({})).is_root());
        assert!(!RawEvent::new("/-NxA1", EventKind::FullReplace, json!("abc")).is_root());
    }

    #[test]
    fn test_preview_truncates() {
        let payload = EncryptedPayload::new("A".repeat(64));
        assert_eq!(payload.preview().len(), 30);
        assert_eq!(EncryptedPayload::new("short").preview(), "short");
    }
}
