use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// Wire field names shared by the device firmware, the simulator and the store
pub const FIELD_TIMESTAMP: &str = "timestamp";
pub const FIELD_HEART_RATE: &str = "heartRate";
pub const FIELD_PATIENT_TEMPERATURE: &str = "patientTemperature";
pub const FIELD_ROOM_TEMPERATURE: &str = "roomTemperature";
pub const FIELD_ROOM_HUMIDITY: &str = "roomHumidity";
pub const FIELD_O2_SATURATION: &str = "o2Saturation";
pub const FIELD_COLLECTED_BY: &str = "collectedBy";

/// Fields written by a snapshot merge. Nothing else on the patient record is touched.
pub const SNAPSHOT_FIELDS: [&str; 3] = ["lastReadingAt", "status", "latestSensorData"];

/// Clinical status derived from a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Critical,
    Warning,
    Unknown,
    Stable,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Critical => "critical",
            Status::Warning => "warning",
            Status::Unknown => "unknown",
            Status::Stable => "stable",
        }
    }

    /// Classification priority: critical > warning > unknown > stable
    pub fn severity(&self) -> u8 {
        match self {
            Status::Critical => 3,
            Status::Warning => 2,
            Status::Unknown => 1,
            Status::Stable => 0,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical reading shape used between decrypt and persist.
///
/// Every field is always serialized; an absent upstream value is carried as
/// JSON `null` rather than dropped. Values are passed through unchecked, so a
/// device sending a string heart rate still produces a reading.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NormalizedReading {
    pub timestamp: Value,
    pub heart_rate: Value,
    pub patient_temperature: Value,
    pub room_temperature: Value,
    pub room_humidity: Value,
    pub o2_saturation: Value,
    pub collected_by: Value,
}

impl NormalizedReading {
    pub fn classified(self, status: Status) -> ClassifiedReading {
        ClassifiedReading {
            reading: self,
            status,
        }
    }
}

/// A normalized reading with its status attached. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReading {
    #[serde(flatten)]
    pub reading: NormalizedReading,
    pub status: Status,
}

/// The "latest" projection merged onto the patient record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSnapshot {
    pub last_reading_at: Value,
    pub status: Status,
    pub latest_sensor_data: ClassifiedReading,
}

impl From<&ClassifiedReading> for PatientSnapshot {
    fn from(reading: &ClassifiedReading) -> Self {
        Self {
            last_reading_at: reading.reading.timestamp.clone(),
            status: reading.status,
            latest_sensor_data: reading.clone(),
        }
    }
}

/// One stored history document
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    pub reading: ClassifiedReading,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_fields_serialize_as_null() {
        let reading = NormalizedReading {
            timestamp: json!("2024-05-01T10:00:00+00:00"),
            heart_rate: json!(72),
            collected_by: json!("ESP32"),
            ..Default::default()
        };

        let value = serde_json::to_value(&reading).unwrap();
        let object = value.as_object().unwrap();

        assert_eq!(object.len(), 7);
        assert_eq!(object[FIELD_HEART_RATE], json!(72));
        assert_eq!(object[FIELD_O2_SATURATION], Value::Null);
        assert_eq!(object[FIELD_ROOM_HUMIDITY], Value::Null);
    }

    #[test]
    fn test_classified_reading_flattens_status() {
        let classified = NormalizedReading::default().classified(Status::Unknown);
        let value = serde_json::to_value(&classified).unwrap();

        assert_eq!(value["status"], json!("unknown"));
        assert_eq!(value[FIELD_PATIENT_TEMPERATURE], Value::Null);

        let parsed: ClassifiedReading = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, classified);
    }

    #[test]
    fn test_snapshot_from_reading() {
        let classified = NormalizedReading {
            timestamp: json!("2024-05-01T10:00:00+00:00"),
            ..Default::default()
        }
        .classified(Status::Critical);

        let snapshot = PatientSnapshot::from(&classified);
        let value = serde_json::to_value(&snapshot).unwrap();

        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, SNAPSHOT_FIELDS);
        assert_eq!(value["lastReadingAt"], json!("2024-05-01T10:00:00+00:00"));
        assert_eq!(value["latestSensorData"]["status"], json!("critical"));
    }

    #[test]
    fn test_status_severity_order() {
        assert!(Status::Critical.severity() > Status::Warning.severity());
        assert!(Status::Warning.severity() > Status::Unknown.severity());
        assert!(Status::Unknown.severity() > Status::Stable.severity());
        assert_eq!(Status::Warning.to_string(), "warning");
    }
}
