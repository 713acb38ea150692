use crate::domain::{DomainResult, EncryptedPayload, RawEvent};
use async_trait::async_trait;
use futures::stream::BoxStream;

/// Ordered stream of change notifications for one subscription.
///
/// The first item after (re)connecting is the full snapshot at the root path.
pub type RawEventStream = BoxStream<'static, DomainResult<RawEvent>>;

/// Trait for subscribing to changes on the live feed
///
/// Implementations should:
/// - Deliver the initial full snapshot as a root full-replace event
/// - Deliver later changes in the order the feed produced them
/// - End the stream (or yield an error) when the subscription is lost
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FeedSubscriber: Send + Sync {
    /// Open a subscription at `path`
    async fn subscribe(&self, path: &str) -> DomainResult<RawEventStream>;
}

/// Trait for pushing new children onto the live feed
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait FeedPublisher: Send + Sync {
    /// Append `payload` as a new child under `path`
    ///
    /// # Returns
    /// The key generated for the new child
    async fn push(&self, path: &str, payload: &EncryptedPayload) -> DomainResult<String>;
}
