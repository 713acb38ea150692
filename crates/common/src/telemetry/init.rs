use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::TelemetryConfig;

/// Install the global JSON log subscriber.
///
/// `RUST_LOG` takes precedence over `config.log_level` when set. Fails if a
/// global subscriber is already installed.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<()> {
    let env_filter = build_env_filter(&config.log_level);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_span_list(true)
        .with_current_span(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber for {}: {}", config.service_name, e))
}

fn build_env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
