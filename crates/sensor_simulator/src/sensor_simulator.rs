use crate::domain::{ReadingGenerator, SensorSimulator};
use common::domain::FeedPublisher;
use common::CipherCodec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SensorSimulatorConfig {
    pub sensor_path: String,
    pub device_id: String,
    pub interval: Duration,
}

/// Synthetic producer module, run in-process next to the ingest listener
pub struct SensorSimulatorModule {
    simulator: SensorSimulator,
    interval: Duration,
}

impl SensorSimulatorModule {
    pub fn new(
        publisher: Arc<dyn FeedPublisher>,
        codec: Arc<CipherCodec>,
        config: SensorSimulatorConfig,
    ) -> Self {
        info!(
            sensor_path = %config.sensor_path,
            device_id = %config.device_id,
            "initializing sensor simulator module"
        );

        let simulator = SensorSimulator::new(
            publisher,
            codec,
            ReadingGenerator::new(config.device_id),
            config.sensor_path,
        );

        Self {
            simulator,
            interval: config.interval,
        }
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
            let simulator = self.simulator;
            let interval = self.interval;
            move |ctx| -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>> {
                Box::pin(async move { simulator.run(ctx, interval).await })
            }
        })
    }
}
