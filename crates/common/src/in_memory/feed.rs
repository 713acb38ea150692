use crate::domain::{
    DomainError, DomainResult, EncryptedPayload, EventKind, FeedPublisher, FeedSubscriber,
    RawEvent, RawEventStream,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
enum FeedSignal {
    Event(RawEvent),
    Disconnect,
}

/// In-process live feed with the same delivery rules as the hosted one:
/// every subscription starts with a root full-replace carrying all current
/// children, followed by live changes in push order.
#[derive(Clone)]
pub struct InMemoryFeed {
    children: Arc<RwLock<HashMap<String, Map<String, Value>>>>,
    sender: broadcast::Sender<(String, FeedSignal)>,
}

impl InMemoryFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            children: Arc::new(RwLock::new(HashMap::new())),
            sender,
        }
    }

    fn normalize(path: &str) -> String {
        path.trim_matches('/').to_string()
    }

    /// Deliver an arbitrary event to subscribers of `path` without touching stored children
    pub async fn emit(&self, path: &str, event: RawEvent) {
        let _guard = self.children.read().await;
        let _ = self
            .sender
            .send((Self::normalize(path), FeedSignal::Event(event)));
    }

    /// End every open subscription on `path`
    pub async fn disconnect(&self, path: &str) {
        let _guard = self.children.read().await;
        let _ = self.sender.send((Self::normalize(path), FeedSignal::Disconnect));
    }

    /// Number of open subscriptions across all paths
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InMemoryFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedSubscriber for InMemoryFeed {
    async fn subscribe(&self, path: &str) -> DomainResult<RawEventStream> {
        let path = Self::normalize(path);

        // Snapshot and receiver are taken under the same lock as pushes, so no
        // child is both in the snapshot and delivered live (or in neither).
        let (snapshot, receiver) = {
            let children = self.children.read().await;
            let snapshot = children
                .get(&path)
                .filter(|map| !map.is_empty())
                .map(|map| Value::Object(map.clone()))
                .unwrap_or(Value::Null);
            (snapshot, self.sender.subscribe())
        };

        debug!(path = %path, "in-memory subscription opened");

        let initial = stream::once(async move {
            Ok(RawEvent::new("/", EventKind::FullReplace, snapshot))
        });

        let live = stream::unfold((receiver, path), |(mut receiver, path)| async move {
            loop {
                match receiver.recv().await {
                    Ok((target, FeedSignal::Event(event))) if target == path => {
                        return Some((Ok(event), (receiver, path)));
                    }
                    Ok((target, FeedSignal::Disconnect)) if target == path => return None,
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "in-memory subscriber lagged");
                        let error =
                            DomainError::FeedError(format!("subscriber lagged by {}", skipped));
                        return Some((Err(error), (receiver, path)));
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(initial.chain(live).boxed())
    }
}

#[async_trait]
impl FeedPublisher for InMemoryFeed {
    async fn push(&self, path: &str, payload: &EncryptedPayload) -> DomainResult<String> {
        let path = Self::normalize(path);
        let key = xid::new().to_string();
        let value = Value::String(payload.as_str().to_string());

        let mut children = self.children.write().await;
        children
            .entry(path.clone())
            .or_default()
            .insert(key.clone(), value.clone());

        let event = RawEvent::new(format!("/{}", key), EventKind::FullReplace, value);
        let _ = self.sender.send((path, FeedSignal::Event(event)));

        Ok(key)
    }
}
