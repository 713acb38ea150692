use chrono::{DateTime, SecondsFormat, Utc};
use common::domain::{
    NormalizedReading, FIELD_COLLECTED_BY, FIELD_HEART_RATE, FIELD_O2_SATURATION,
    FIELD_PATIENT_TEMPERATURE, FIELD_ROOM_HUMIDITY, FIELD_ROOM_TEMPERATURE, FIELD_TIMESTAMP,
};
use serde_json::{Map, Value};

/// Maps a decrypted payload onto the fixed reading schema
#[derive(Debug, Clone)]
pub struct ReadingNormalizer {
    default_collected_by: String,
}

impl ReadingNormalizer {
    pub fn new(default_collected_by: impl Into<String>) -> Self {
        Self {
            default_collected_by: default_collected_by.into(),
        }
    }

    /// Build the canonical reading. Never fails: values are copied unchecked
    /// and unknown keys are dropped.
    ///
    /// A null, absent or empty-string `timestamp` becomes `now`; any other
    /// value is kept verbatim. `collectedBy` is defaulted only when absent.
    pub fn normalize(&self, decoded: &Map<String, Value>, now: DateTime<Utc>) -> NormalizedReading {
        let timestamp = match decoded.get(FIELD_TIMESTAMP) {
            None | Some(Value::Null) => format_timestamp(now),
            Some(Value::String(s)) if s.is_empty() => format_timestamp(now),
            Some(other) => other.clone(),
        };

        let collected_by = decoded
            .get(FIELD_COLLECTED_BY)
            .cloned()
            .unwrap_or_else(|| Value::String(self.default_collected_by.clone()));

        NormalizedReading {
            timestamp,
            heart_rate: field(decoded, FIELD_HEART_RATE),
            patient_temperature: field(decoded, FIELD_PATIENT_TEMPERATURE),
            room_temperature: field(decoded, FIELD_ROOM_TEMPERATURE),
            room_humidity: field(decoded, FIELD_ROOM_HUMIDITY),
            o2_saturation: field(decoded, FIELD_O2_SATURATION),
            collected_by,
        }
    }
}

fn field(decoded: &Map<String, Value>, name: &str) -> Value {
    decoded.get(name).cloned().unwrap_or(Value::Null)
}

/// ISO-8601 UTC instant with microseconds and an explicit `+00:00` offset
pub fn format_timestamp(now: DateTime<Utc>) -> Value {
    Value::String(now.to_rfc3339_opts(SecondsFormat::Micros, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn normalizer() -> ReadingNormalizer {
        ReadingNormalizer::new("ESP32")
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap()
    }

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn test_copies_known_fields() {
        let decoded = object(json!({
            "heartRate": 72,
            "patientTemperature": 36.9,
            "roomTemperature": 23.5,
            "roomHumidity": 45.25,
            "o2Saturation": 97.5,
            "timestamp": "2024-05-01T09:59:58+00:00",
            "collectedBy": "ESP32_SIMULATOR",
            "firmware": "1.2.0"
        }));

        let reading = normalizer().normalize(&decoded, fixed_now());

        assert_eq!(reading.heart_rate, json!(72));
        assert_eq!(reading.patient_temperature, json!(36.9));
        assert_eq!(reading.room_temperature, json!(23.5));
        assert_eq!(reading.room_humidity, json!(45.25));
        assert_eq!(reading.o2_saturation, json!(97.5));
        assert_eq!(reading.timestamp, json!("2024-05-01T09:59:58+00:00"));
        assert_eq!(reading.collected_by, json!("ESP32_SIMULATOR"));
    }

    #[test]
    fn test_absent_fields_become_null_markers() {
        let reading = normalizer().normalize(&object(json!({"heartRate": 80})), fixed_now());

        let value = serde_json::to_value(&reading).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();

        assert_eq!(
            keys,
            vec![
                "timestamp",
                "heartRate",
                "patientTemperature",
                "roomTemperature",
                "roomHumidity",
                "o2Saturation",
                "collectedBy"
            ]
        );
        assert_eq!(reading.patient_temperature, Value::Null);
        assert_eq!(reading.o2_saturation, Value::Null);
    }

    #[test]
    fn test_missing_timestamp_defaults_to_now() {
        let reading = normalizer().normalize(&Map::new(), fixed_now());
        assert_eq!(reading.timestamp, json!("2024-05-01T10:00:00.000000+00:00"));
    }

    #[test]
    fn test_null_and_empty_timestamps_default_to_now() {
        for raw in [json!(null), json!("")] {
            let mut decoded = Map::new();
            decoded.insert("timestamp".to_string(), raw);

            let reading = normalizer().normalize(&decoded, fixed_now());

            assert_eq!(reading.timestamp, json!("2024-05-01T10:00:00.000000+00:00"));
        }
    }

    #[test]
    fn test_other_timestamp_values_are_kept_verbatim() {
        for raw in [json!(0), json!(false), json!("not-a-date")] {
            let mut decoded = Map::new();
            decoded.insert("timestamp".to_string(), raw.clone());

            let reading = normalizer().normalize(&decoded, fixed_now());

            assert_eq!(reading.timestamp, raw);
        }
    }

    #[test]
    fn test_collected_by_defaults_only_when_absent() {
        let absent = normalizer().normalize(&Map::new(), fixed_now());
        assert_eq!(absent.collected_by, json!("ESP32"));

        let explicit_null = normalizer().normalize(&object(json!({"collectedBy": null})), fixed_now());
        assert_eq!(explicit_null.collected_by, Value::Null);
    }

    #[test]
    fn test_values_pass_through_unchecked() {
        let reading = normalizer().normalize(&object(json!({"heartRate": "fast"})), fixed_now());
        assert_eq!(reading.heart_rate, json!("fast"));
    }

    #[test]
    fn test_normalization_is_repeatable_for_same_now() {
        let decoded = object(json!({"heartRate": 61, "o2Saturation": 99.1}));
        let normalizer = normalizer();

        let first = serde_json::to_vec(&normalizer.normalize(&decoded, fixed_now())).unwrap();
        let second = serde_json::to_vec(&normalizer.normalize(&decoded, fixed_now())).unwrap();

        assert_eq!(first, second);
    }
}
