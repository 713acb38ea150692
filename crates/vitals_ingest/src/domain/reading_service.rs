use crate::domain::{
    classify, route, PersistenceWriter, ReadingError, ReadingNormalizer,
};
use chrono::{DateTime, Utc};
use common::domain::{ClassifiedReading, EncryptedPayload, PatientStore, RawEvent};
use common::CipherCodec;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Counts of what happened to one feed event
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EventOutcome {
    pub initial_sync: bool,
    pub persisted: usize,
    pub dropped: usize,
    pub malformed: usize,
}

/// Domain service that runs feed events through the reading pipeline
///
/// Flow per payload:
/// 1. Decrypt the Base64 ciphertext into a JSON object
/// 2. Normalize onto the fixed reading schema
/// 3. Classify the patient status
/// 4. Merge the snapshot and append history
///
/// Failures are isolated to the payload they occur in.
pub struct ReadingService {
    codec: Arc<CipherCodec>,
    normalizer: ReadingNormalizer,
    writer: PersistenceWriter,
    patient_id: String,
}

impl ReadingService {
    pub fn new(
        codec: Arc<CipherCodec>,
        normalizer: ReadingNormalizer,
        store: Arc<dyn PatientStore>,
        patient_id: impl Into<String>,
    ) -> Self {
        Self {
            codec,
            normalizer,
            writer: PersistenceWriter::new(store),
            patient_id: patient_id.into(),
        }
    }

    /// Route an event and process every payload it carries, in order
    #[instrument(skip(self, event), fields(path = %event.path, kind = %event.kind.as_str()))]
    pub async fn handle_event(&self, event: RawEvent) -> EventOutcome {
        let routed = route(event);

        let mut outcome = EventOutcome {
            initial_sync: routed.initial_sync,
            malformed: routed.malformed.len(),
            ..Default::default()
        };

        if routed.initial_sync {
            info!("initial sync completed, waiting for new readings");
        }

        for malformed in &routed.malformed {
            warn!(
                path = %malformed.path,
                key = malformed.key.as_deref().unwrap_or(""),
                reason = %malformed.reason,
                "skipping malformed feed item"
            );
        }

        for payload in &routed.payloads {
            match self.process_payload(payload).await {
                Ok(_) => outcome.persisted += 1,
                Err(_) => outcome.dropped += 1,
            }
        }

        outcome
    }

    /// Run one ciphertext through the pipeline, stamping missing timestamps with now
    pub async fn process_payload(
        &self,
        payload: &EncryptedPayload,
    ) -> Result<ClassifiedReading, ReadingError> {
        self.process_payload_at(payload, Utc::now()).await
    }

    #[instrument(skip(self, payload, now), fields(patient_id = %self.patient_id, payload = %payload.preview()))]
    pub async fn process_payload_at(
        &self,
        payload: &EncryptedPayload,
        now: DateTime<Utc>,
    ) -> Result<ClassifiedReading, ReadingError> {
        let decoded = self.codec.decrypt(payload.as_str()).map_err(|e| {
            warn!(stage = %e.stage(), error = %e, "dropping undecodable reading");
            ReadingError::from(e)
        })?;

        let normalized = self.normalizer.normalize(&decoded, now);
        let status = classify(&normalized);
        let reading = normalized.classified(status);

        debug!(status = %reading.status, timestamp = %reading.reading.timestamp, "classified reading");

        self.writer.persist(&self.patient_id, &reading).await?;

        info!(
            patient_id = %self.patient_id,
            status = %reading.status,
            timestamp = %reading.reading.timestamp,
            "persisted reading"
        );

        Ok(reading)
    }
}
