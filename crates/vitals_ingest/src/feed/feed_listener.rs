use crate::domain::ReadingService;
use common::domain::{DomainError, FeedSubscriber};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct FeedListenerConfig {
    pub path: String,
    pub reconnect_delay: Duration,
    /// Consecutive sessions that end without delivering an event before giving up
    pub max_reconnect_attempts: u32,
}

/// How a subscription session ended
#[derive(Debug)]
enum SessionEnd {
    Cancelled,
    Closed {
        received_events: bool,
        error: Option<DomainError>,
    },
}

/// Long-running subscriber that feeds every live event through the pipeline.
///
/// Events are handled one at a time in delivery order. On cancellation the
/// event in flight is finished before the listener returns.
pub struct FeedListener {
    subscriber: Arc<dyn FeedSubscriber>,
    service: Arc<ReadingService>,
    config: FeedListenerConfig,
}

impl FeedListener {
    pub fn new(
        subscriber: Arc<dyn FeedSubscriber>,
        service: Arc<ReadingService>,
        config: FeedListenerConfig,
    ) -> Self {
        Self {
            subscriber,
            service,
            config,
        }
    }

    pub async fn run(&self, ctx: CancellationToken) -> anyhow::Result<()> {
        info!(path = %self.config.path, "starting feed listener");

        let mut failures: u32 = 0;

        loop {
            if ctx.is_cancelled() {
                break;
            }

            match self.run_session(&ctx).await {
                SessionEnd::Cancelled => break,
                SessionEnd::Closed {
                    received_events,
                    error,
                } => {
                    if received_events {
                        failures = 0;
                    }
                    failures += 1;

                    match &error {
                        Some(e) => error!(path = %self.config.path, error = %e, "feed subscription failed"),
                        None => warn!(path = %self.config.path, "feed subscription closed by server"),
                    }

                    if failures >= self.config.max_reconnect_attempts {
                        error!(
                            path = %self.config.path,
                            max_attempts = self.config.max_reconnect_attempts,
                            "max reconnect attempts reached, stopping feed listener"
                        );
                        return Err(anyhow::anyhow!(
                            "feed subscription at {} failed {} times in a row",
                            self.config.path,
                            failures
                        ));
                    }

                    warn!(
                        path = %self.config.path,
                        attempt = failures,
                        max_attempts = self.config.max_reconnect_attempts,
                        "resubscribing to feed"
                    );
                }
            }

            tokio::select! {
                _ = ctx.cancelled() => break,
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }

        info!(path = %self.config.path, "feed listener stopped");
        Ok(())
    }

    #[instrument(name = "feed_session", skip_all, fields(path = %self.config.path))]
    async fn run_session(&self, ctx: &CancellationToken) -> SessionEnd {
        let mut events = match self.subscriber.subscribe(&self.config.path).await {
            Ok(events) => events,
            Err(e) => {
                return SessionEnd::Closed {
                    received_events: false,
                    error: Some(e),
                }
            }
        };

        debug!("subscribed to feed");
        let mut received_events = false;

        loop {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    debug!("cancellation received, closing subscription");
                    return SessionEnd::Cancelled;
                }
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        received_events = true;
                        // Not raced against cancellation: an in-flight event always completes
                        let outcome = self.service.handle_event(event).await;
                        debug!(
                            persisted = outcome.persisted,
                            dropped = outcome.dropped,
                            malformed = outcome.malformed,
                            "feed event handled"
                        );
                    }
                    Some(Err(e)) => {
                        return SessionEnd::Closed {
                            received_events,
                            error: Some(e),
                        };
                    }
                    None => {
                        return SessionEnd::Closed {
                            received_events,
                            error: None,
                        };
                    }
                }
            }
        }
    }
}
