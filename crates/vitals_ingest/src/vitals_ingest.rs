use crate::domain::{ReadingNormalizer, ReadingService};
use crate::feed::{FeedListener, FeedListenerConfig};
use common::domain::{FeedSubscriber, PatientStore};
use common::CipherCodec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct VitalsIngestConfig {
    pub sensor_path: String,
    pub patient_id: String,
    pub default_collected_by: String,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

/// Feed-to-store ingestion module: one listener driving the reading pipeline
pub struct VitalsIngest {
    listener: FeedListener,
}

impl VitalsIngest {
    pub fn new(
        subscriber: Arc<dyn FeedSubscriber>,
        store: Arc<dyn PatientStore>,
        codec: Arc<CipherCodec>,
        config: VitalsIngestConfig,
    ) -> Self {
        info!(
            sensor_path = %config.sensor_path,
            patient_id = %config.patient_id,
            "initializing vitals ingest module"
        );

        let service = Arc::new(ReadingService::new(
            codec,
            ReadingNormalizer::new(config.default_collected_by),
            store,
            config.patient_id,
        ));

        let listener = FeedListener::new(
            subscriber,
            service,
            FeedListenerConfig {
                path: config.sensor_path,
                reconnect_delay: config.reconnect_delay,
                max_reconnect_attempts: config.max_reconnect_attempts,
            },
        );

        Self { listener }
    }

    #[allow(clippy::type_complexity)]
    pub fn into_runner_process(
        self,
    ) -> Box<
        dyn FnOnce(
                CancellationToken,
            ) -> std::pin::Pin<
                Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
            > + Send,
    > {
        Box::new({
            let listener = self.listener;
            move |ctx| -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>> {
                Box::pin(async move { listener.run(ctx).await })
            }
        })
    }
}
