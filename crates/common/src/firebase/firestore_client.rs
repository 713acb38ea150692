use crate::domain::{
    ClassifiedReading, DomainError, DomainResult, HistoryEntry, PatientSnapshot, PatientStore,
    FIELD_TIMESTAMP, SNAPSHOT_FIELDS,
};
use crate::firebase::{decode_fields, encode_fields};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Connection settings for the Firestore REST API
#[derive(Debug, Clone)]
pub struct FirestoreClientConfig {
    pub base_url: String,
    pub project_id: String,
    pub patients_collection: String,
    pub history_collection: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
}

/// Firestore-backed patient store
pub struct FirestoreClient {
    http: reqwest::Client,
    documents_url: String,
    patients_collection: String,
    history_collection: String,
    auth_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

impl FirestoreClient {
    pub fn new(config: FirestoreClientConfig) -> Result<Self> {
        info!(
            project_id = %config.project_id,
            patients_collection = %config.patients_collection,
            history_collection = %config.history_collection,
            "creating Firestore client"
        );

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(config.request_timeout)
            .build()
            .context("Failed to build Firestore HTTP client")?;

        let documents_url = format!(
            "{}/projects/{}/databases/(default)/documents",
            config.base_url.trim_end_matches('/'),
            config.project_id
        );

        Ok(Self {
            http,
            documents_url,
            patients_collection: config.patients_collection,
            history_collection: config.history_collection,
            auth_token: config.auth_token.filter(|token| !token.is_empty()),
        })
    }

    fn patient_url(&self, patient_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url, self.patients_collection, patient_id
        )
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, operation: &str) -> DomainResult<reqwest::Response> {
        builder
            .send()
            .await
            .map_err(|e| DomainError::StoreError(format!("{} failed: {}", operation, e)))?
            .error_for_status()
            .map_err(|e| DomainError::StoreError(format!("{} rejected: {}", operation, e)))
    }
}

fn document_body<T: serde::Serialize>(value: &T) -> DomainResult<Value> {
    match serde_json::to_value(value).context("Failed to serialize document")? {
        Value::Object(map) => Ok(json!({ "fields": encode_fields(&map) })),
        _ => Err(DomainError::StoreError(
            "document must serialize to an object".to_string(),
        )),
    }
}

fn document_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or(name).to_string()
}

#[async_trait]
impl PatientStore for FirestoreClient {
    #[instrument(skip(self, snapshot), fields(status = %snapshot.status))]
    async fn merge_snapshot(
        &self,
        patient_id: &str,
        snapshot: &PatientSnapshot,
    ) -> DomainResult<()> {
        let update_mask: Vec<(&str, &str)> = SNAPSHOT_FIELDS
            .iter()
            .map(|field| ("updateMask.fieldPaths", *field))
            .collect();

        let builder = self
            .request(Method::PATCH, self.patient_url(patient_id))
            .query(&update_mask)
            .json(&document_body(snapshot)?);

        self.send(builder, "snapshot merge").await?;
        debug!("merged patient snapshot");
        Ok(())
    }

    #[instrument(skip(self, reading), fields(status = %reading.status))]
    async fn append_history(
        &self,
        patient_id: &str,
        reading: &ClassifiedReading,
    ) -> DomainResult<String> {
        let url = format!("{}/{}", self.patient_url(patient_id), self.history_collection);
        let builder = self.request(Method::POST, url).json(&document_body(reading)?);

        let document: Document = self
            .send(builder, "history append")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::StoreError(format!("unexpected append response: {}", e)))?;

        Ok(document_id(&document.name))
    }

    #[instrument(skip(self))]
    async fn recent_history(
        &self,
        patient_id: &str,
        limit: usize,
    ) -> DomainResult<Vec<HistoryEntry>> {
        let url = format!("{}:runQuery", self.patient_url(patient_id));
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": self.history_collection }],
                "orderBy": [{
                    "field": { "fieldPath": FIELD_TIMESTAMP },
                    "direction": "DESCENDING"
                }],
                "limit": limit
            }
        });

        let items: Vec<RunQueryItem> = self
            .send(self.request(Method::POST, url).json(&query), "history query")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::StoreError(format!("unexpected query response: {}", e)))?;

        let mut entries = Vec::with_capacity(items.len());
        for document in items.into_iter().filter_map(|item| item.document) {
            let id = document_id(&document.name);
            match serde_json::from_value::<ClassifiedReading>(Value::Object(decode_fields(
                &document.fields,
            ))) {
                Ok(reading) => entries.push(HistoryEntry { id, reading }),
                Err(e) => {
                    warn!(document_id = %id, error = %e, "skipping unreadable history document");
                }
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NormalizedReading, Status};

    fn client() -> FirestoreClient {
        FirestoreClient::new(FirestoreClientConfig {
            base_url: "https://firestore.googleapis.com/v1/".to_string(),
            project_id: "vitalsync-test".to_string(),
            patients_collection: "patients".to_string(),
            history_collection: "sensorData".to_string(),
            auth_token: Some("access-token".to_string()),
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_patient_url() {
        assert_eq!(
            client().patient_url("29sxeWUSDRD1L1RjDEAC"),
            "https://firestore.googleapis.com/v1/projects/vitalsync-test/databases/(default)/documents/patients/29sxeWUSDRD1L1RjDEAC"
        );
    }

    #[test]
    fn test_document_id_takes_last_segment() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/patients/a/sensorData/XyZ"),
            "XyZ"
        );
        assert_eq!(document_id("plain"), "plain");
    }

    #[test]
    fn test_snapshot_document_body() {
        let reading = NormalizedReading {
            timestamp: json!("2024-05-01T10:00:00+00:00"),
            heart_rate: json!(200),
            ..Default::default()
        }
        .classified(Status::Critical);

        let body = document_body(&PatientSnapshot::from(&reading)).unwrap();
        let fields = body["fields"].as_object().unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["status"], json!({"stringValue": "critical"}));
        assert_eq!(
            fields["lastReadingAt"],
            json!({"stringValue": "2024-05-01T10:00:00+00:00"})
        );
        assert_eq!(
            fields["latestSensorData"]["mapValue"]["fields"]["heartRate"],
            json!({"integerValue": "200"})
        );
    }

    #[test]
    fn test_merge_request_carries_update_mask_and_bearer() {
        let client = client();
        let update_mask: Vec<(&str, &str)> = SNAPSHOT_FIELDS
            .iter()
            .map(|field| ("updateMask.fieldPaths", *field))
            .collect();

        let request = client
            .request(Method::PATCH, client.patient_url("p1"))
            .query(&update_mask)
            .build()
            .unwrap();

        assert_eq!(
            request.url().query(),
            Some("updateMask.fieldPaths=lastReadingAt&updateMask.fieldPaths=status&updateMask.fieldPaths=latestSensorData")
        );
        assert_eq!(
            request.headers()[reqwest::header::AUTHORIZATION],
            "Bearer access-token"
        );
    }
}
