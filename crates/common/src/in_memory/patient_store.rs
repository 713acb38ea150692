use crate::domain::{
    ClassifiedReading, DomainError, DomainResult, HistoryEntry, PatientSnapshot, PatientStore,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default, Clone)]
struct PatientRecord {
    fields: Map<String, Value>,
    history: Vec<HistoryEntry>,
}

/// In-memory implementation of PatientStore using HashMap
#[derive(Clone, Default)]
pub struct InMemoryPatientStore {
    patients: Arc<RwLock<HashMap<String, PatientRecord>>>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create (or overwrite) a patient record with the given fields
    pub async fn seed_patient(&self, patient_id: &str, fields: Map<String, Value>) {
        let mut patients = self.patients.write().await;
        patients.entry(patient_id.to_string()).or_default().fields = fields;
    }

    pub async fn patient(&self, patient_id: &str) -> Option<Map<String, Value>> {
        let patients = self.patients.read().await;
        patients.get(patient_id).map(|record| record.fields.clone())
    }

    /// History entries in append order
    pub async fn history(&self, patient_id: &str) -> Vec<HistoryEntry> {
        let patients = self.patients.read().await;
        patients
            .get(patient_id)
            .map(|record| record.history.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn merge_snapshot(
        &self,
        patient_id: &str,
        snapshot: &PatientSnapshot,
    ) -> DomainResult<()> {
        let Value::Object(snapshot) = serde_json::to_value(snapshot)
            .map_err(|e| DomainError::StoreError(format!("unserializable snapshot: {}", e)))?
        else {
            return Err(DomainError::StoreError(
                "snapshot must serialize to an object".to_string(),
            ));
        };

        let mut patients = self.patients.write().await;
        let record = patients.entry(patient_id.to_string()).or_default();
        record.fields.extend(snapshot);
        Ok(())
    }

    async fn append_history(
        &self,
        patient_id: &str,
        reading: &ClassifiedReading,
    ) -> DomainResult<String> {
        let id = xid::new().to_string();
        let mut patients = self.patients.write().await;
        patients
            .entry(patient_id.to_string())
            .or_default()
            .history
            .push(HistoryEntry {
                id: id.clone(),
                reading: reading.clone(),
            });
        Ok(id)
    }

    async fn recent_history(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> DomainResult<Vec<HistoryEntry>> {
        let mut entries = self.history(patient_id).await;
        // Non-string timestamps sort as the oldest
        entries.sort_by_key(|entry| {
            Reverse(entry.reading.reading.timestamp.as_str().map(str::to_string))
        });
        entries.truncate(limit);
        Ok(entries)
    }
}
