use chrono::{DateTime, SecondsFormat, Utc};
use common::domain::{
    FIELD_COLLECTED_BY, FIELD_HEART_RATE, FIELD_O2_SATURATION, FIELD_PATIENT_TEMPERATURE,
    FIELD_ROOM_HUMIDITY, FIELD_ROOM_TEMPERATURE, FIELD_TIMESTAMP,
};
use rand::Rng;
use serde_json::{json, Map, Value};
use std::ops::RangeInclusive;

const HEART_RATE: RangeInclusive<i64> = 65..=95;
const PATIENT_TEMPERATURE: RangeInclusive<f64> = 36.5..=37.5;
const ROOM_TEMPERATURE: RangeInclusive<f64> = 22.0..=26.0;
const ROOM_HUMIDITY: RangeInclusive<f64> = 40.0..=55.0;
const O2_SATURATION: RangeInclusive<f64> = 96.0..=99.0;

/// Produces plaintext readings shaped like the device firmware's
#[derive(Debug, Clone)]
pub struct ReadingGenerator {
    device_id: String,
}

impl ReadingGenerator {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }

    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R, now: DateTime<Utc>) -> Map<String, Value> {
        let mut reading = Map::new();
        reading.insert(FIELD_HEART_RATE.to_string(), json!(rng.gen_range(HEART_RATE)));
        reading.insert(
            FIELD_PATIENT_TEMPERATURE.to_string(),
            json!(round_to(rng.gen_range(PATIENT_TEMPERATURE), 2)),
        );
        reading.insert(
            FIELD_ROOM_TEMPERATURE.to_string(),
            json!(round_to(rng.gen_range(ROOM_TEMPERATURE), 2)),
        );
        reading.insert(
            FIELD_ROOM_HUMIDITY.to_string(),
            json!(round_to(rng.gen_range(ROOM_HUMIDITY), 2)),
        );
        reading.insert(
            FIELD_O2_SATURATION.to_string(),
            json!(round_to(rng.gen_range(O2_SATURATION), 1)),
        );
        reading.insert(
            FIELD_TIMESTAMP.to_string(),
            json!(now.to_rfc3339_opts(SecondsFormat::Micros, false)),
        );
        reading.insert(FIELD_COLLECTED_BY.to_string(), json!(self.device_id));
        reading
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
