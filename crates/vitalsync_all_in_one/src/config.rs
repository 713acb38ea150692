use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Realtime Database (live feed)
    /// Realtime Database base URL
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Optional access token; empty means unauthenticated
    #[serde(default)]
    pub auth_token: String,

    /// Path of the sensor stream inside the database
    #[serde(default = "default_sensor_path")]
    pub sensor_path: String,

    // Firestore (document store)
    #[serde(default = "default_firestore_base_url")]
    pub firestore_base_url: String,

    #[serde(default = "default_firestore_project_id")]
    pub firestore_project_id: String,

    /// Patient record receiving the snapshot and history writes
    #[serde(default = "default_patient_id")]
    pub patient_id: String,

    #[serde(default = "default_patients_collection")]
    pub patients_collection: String,

    #[serde(default = "default_history_collection")]
    pub history_collection: String,

    // Cipher material shared with the device
    /// AES-128 key as UTF-8 text (16 bytes)
    #[serde(default = "default_cipher_key")]
    pub cipher_key: String,

    /// AES-CBC IV as hex (16 bytes)
    #[serde(default = "default_cipher_iv_hex")]
    pub cipher_iv_hex: String,

    /// collectedBy value written when a reading does not name its source
    #[serde(default = "default_collected_by")]
    pub default_collected_by: String,

    // Synthetic producer
    #[serde(default)]
    pub simulator_enabled: bool,

    #[serde(default = "default_simulator_interval_secs")]
    pub simulator_interval_secs: u64,

    #[serde(default = "default_simulator_device_id")]
    pub simulator_device_id: String,

    // Listener resilience
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,

    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Silence on the feed stream, keep-alives included, after which it is resubscribed
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,

    /// HTTP timeout for store writes and feed pushes
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_closer_timeout_secs")]
    pub closer_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_database_url() -> String {
    "http://localhost:9000".to_string()
}

fn default_sensor_path() -> String {
    "sensors/ESP32_01".to_string()
}

fn default_firestore_base_url() -> String {
    "https://firestore.googleapis.com/v1".to_string()
}

fn default_firestore_project_id() -> String {
    "vitalsync-local".to_string()
}

fn default_patient_id() -> String {
    "29sxeWUSDRD1L1RjDEAC".to_string()
}

fn default_patients_collection() -> String {
    "patients".to_string()
}

fn default_history_collection() -> String {
    "sensorData".to_string()
}

fn default_cipher_key() -> String {
    "MaCleSecreteAES1".to_string()
}

fn default_cipher_iv_hex() -> String {
    "000102030405060708090a0b0c0d0e0f".to_string()
}

fn default_collected_by() -> String {
    "ESP32".to_string()
}

fn default_simulator_interval_secs() -> u64 {
    5
}

fn default_simulator_device_id() -> String {
    "ESP32_SIMULATOR".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_max_reconnect_attempts() -> u32 {
    10
}

fn default_stream_idle_timeout_secs() -> u64 {
    90
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_closer_timeout_secs() -> u64 {
    10
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("VITALSYNC"))
            .build()?
            .try_deserialize()
    }

    /// Raw key and IV bytes. Lengths are checked when the codec is built.
    pub fn cipher_material(&self) -> Result<(Vec<u8>, Vec<u8>), common::ConfigError> {
        if self.cipher_key.is_empty() {
            return Err(common::ConfigError::Missing("cipher_key".to_string()));
        }

        let iv = hex::decode(self.cipher_iv_hex.trim()).map_err(|e| {
            common::ConfigError::InvalidHex {
                field: "cipher_iv_hex".to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok((self.cipher_key.as_bytes().to_vec(), iv))
    }

    pub fn auth_token(&self) -> Option<String> {
        Some(self.auth_token.clone()).filter(|token| !token.is_empty())
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

// Key material and tokens stay out of logs
impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("database_url", &self.database_url)
            .field("sensor_path", &self.sensor_path)
            .field("firestore_base_url", &self.firestore_base_url)
            .field("firestore_project_id", &self.firestore_project_id)
            .field("patient_id", &self.patient_id)
            .field("patients_collection", &self.patients_collection)
            .field("history_collection", &self.history_collection)
            .field("default_collected_by", &self.default_collected_by)
            .field("simulator_enabled", &self.simulator_enabled)
            .field("simulator_interval_secs", &self.simulator_interval_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("stream_idle_timeout_secs", &self.stream_idle_timeout_secs)
            .finish_non_exhaustive()
    }
}
