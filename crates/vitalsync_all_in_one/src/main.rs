mod config;

use common::domain::PatientStore;
use common::telemetry::{init_telemetry, TelemetryConfig};
use common::{CipherCodec, FirestoreClient, FirestoreClientConfig, RtdbClient, RtdbClientConfig};
use config::ServiceConfig;
use sensor_simulator::{SensorSimulatorConfig, SensorSimulatorModule};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use vitals_ingest::{VitalsIngest, VitalsIngestConfig};
use vitalsync_runner::Runner;

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&TelemetryConfig {
        service_name: "vitalsync".to_string(),
        log_level: config.log_level.clone(),
    }) {
        eprintln!("Failed to initialize telemetry: {}", e);
        std::process::exit(1);
    }

    info!(
        sensor_path = %config.sensor_path,
        patient_id = %config.patient_id,
        simulator_enabled = config.simulator_enabled,
        "starting vitalsync service"
    );
    debug!("Configuration: {:?}", config);

    // Bad key material must stop the process before anything subscribes
    let codec = match config
        .cipher_material()
        .and_then(|(key, iv)| CipherCodec::new(&key, &iv))
    {
        Ok(codec) => Arc::new(codec),
        Err(e) => {
            error!(error = %e, "invalid cipher configuration");
            std::process::exit(1);
        }
    };

    let (feed, store) = match initialize_clients(&config) {
        Ok(clients) => clients,
        Err(e) => {
            error!(error = %format!("{:#}", e), "failed to initialize Firebase clients");
            std::process::exit(1);
        }
    };

    let vitals_ingest = VitalsIngest::new(
        feed.clone(),
        store.clone(),
        codec.clone(),
        VitalsIngestConfig {
            sensor_path: config.sensor_path.clone(),
            patient_id: config.patient_id.clone(),
            default_collected_by: config.default_collected_by.clone(),
            reconnect_delay: config.reconnect_delay(),
            max_reconnect_attempts: config.max_reconnect_attempts,
        },
    );

    let mut runner = Runner::new().with_named_process("vitals_ingest", vitals_ingest.into_runner_process());

    if config.simulator_enabled {
        let simulator = SensorSimulatorModule::new(
            feed,
            codec,
            SensorSimulatorConfig {
                sensor_path: config.sensor_path.clone(),
                device_id: config.simulator_device_id.clone(),
                interval: Duration::from_secs(config.simulator_interval_secs),
            },
        );
        runner = runner.with_named_process("sensor_simulator", simulator.into_runner_process());
    }

    runner = runner
        .with_closer({
            let store = store.clone();
            let patient_id = config.patient_id.clone();
            move || async move {
                log_last_reading(store.as_ref(), &patient_id).await;
                Ok(())
            }
        })
        .with_closer_timeout(Duration::from_secs(config.closer_timeout_secs));

    match runner.run().await {
        Ok(()) => std::process::exit(0),
        Err(_) => std::process::exit(1),
    }
}

fn initialize_clients(
    config: &ServiceConfig,
) -> anyhow::Result<(Arc<RtdbClient>, Arc<FirestoreClient>)> {
    let feed = RtdbClient::new(RtdbClientConfig {
        database_url: config.database_url.clone(),
        auth_token: config.auth_token(),
        request_timeout: config.request_timeout(),
        stream_idle_timeout: config.stream_idle_timeout(),
    })?;

    let store = FirestoreClient::new(FirestoreClientConfig {
        base_url: config.firestore_base_url.clone(),
        project_id: config.firestore_project_id.clone(),
        patients_collection: config.patients_collection.clone(),
        history_collection: config.history_collection.clone(),
        auth_token: config.auth_token(),
        request_timeout: config.request_timeout(),
    })?;

    Ok((Arc::new(feed), Arc::new(store)))
}

/// Report the newest persisted reading on the way out
async fn log_last_reading(store: &dyn PatientStore, patient_id: &str) {
    match store.recent_history(patient_id, 1).await {
        Ok(entries) => match entries.first() {
            Some(entry) => info!(
                patient_id = %patient_id,
                history_id = %entry.id,
                status = %entry.reading.status,
                timestamp = %entry.reading.reading.timestamp,
                "last persisted reading"
            ),
            None => info!(patient_id = %patient_id, "no readings persisted yet"),
        },
        Err(e) => warn!(patient_id = %patient_id, error = %e, "failed to read recent history"),
    }
}
