use crate::domain::ReadingGenerator;
use chrono::Utc;
use common::domain::{DomainResult, EncryptedPayload, FeedPublisher};
use common::CipherCodec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Synthetic device: encrypts generated readings and pushes them onto the feed
pub struct SensorSimulator {
    publisher: Arc<dyn FeedPublisher>,
    codec: Arc<CipherCodec>,
    generator: ReadingGenerator,
    path: String,
}

impl SensorSimulator {
    pub fn new(
        publisher: Arc<dyn FeedPublisher>,
        codec: Arc<CipherCodec>,
        generator: ReadingGenerator,
        path: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            codec,
            generator,
            path: path.into(),
        }
    }

    /// Generate and encrypt one reading stamped with the current time
    pub fn produce(&self) -> EncryptedPayload {
        let reading = self.generator.generate(&mut rand::thread_rng(), Utc::now());
        self.codec.encrypt(&reading)
    }

    /// Push one fresh reading and return the feed key it was stored under
    #[instrument(skip(self), fields(path = %self.path))]
    pub async fn push_one(&self) -> DomainResult<String> {
        let payload = self.produce();
        let key = self.publisher.push(&self.path, &payload).await?;
        debug!(key = %key, payload = %payload.preview(), "pushed simulated reading");
        Ok(key)
    }

    /// Push a reading every `interval` until cancelled. Push failures are
    /// logged and the next attempt waits the same interval.
    pub async fn run(&self, ctx: CancellationToken, interval: Duration) -> anyhow::Result<()> {
        info!(path = %self.path, interval = ?interval, "sensor simulator started");

        loop {
            tokio::select! {
                _ = ctx.cancelled() => {
                    info!("received shutdown signal, stopping sensor simulator");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    if let Err(e) = self.push_one().await {
                        error!(path = %self.path, error = %e, "failed to push simulated reading");
                    }
                }
            }
        }

        info!("sensor simulator stopped");
        Ok(())
    }
}
