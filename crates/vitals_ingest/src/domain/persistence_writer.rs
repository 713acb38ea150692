use crate::domain::WriteError;
use common::domain::{ClassifiedReading, PatientSnapshot, PatientStore};
use std::sync::Arc;
use tracing::{debug, error, instrument};

/// Writes a classified reading to the patient's snapshot and history.
///
/// The two writes are not transactional. The snapshot merge goes first so
/// pollers see the new status promptly; the history append is attempted
/// whatever the merge outcome, and nothing is rolled back.
pub struct PersistenceWriter {
    store: Arc<dyn PatientStore>,
}

impl PersistenceWriter {
    pub fn new(store: Arc<dyn PatientStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, reading), fields(status = %reading.status))]
    pub async fn persist(&self, patient_id: &str, reading: &ClassifiedReading) -> Result<(), WriteError> {
        let snapshot = PatientSnapshot::from(reading);

        let snapshot_result = self.store.merge_snapshot(patient_id, &snapshot).await;
        if let Err(e) = &snapshot_result {
            error!(patient_id = %patient_id, error = %e, "failed to merge patient snapshot");
        }

        let history_result = self.store.append_history(patient_id, reading).await;
        match &history_result {
            Ok(history_id) => debug!(patient_id = %patient_id, history_id = %history_id, "appended history entry"),
            Err(e) => error!(patient_id = %patient_id, error = %e, "failed to append history entry"),
        }

        match (snapshot_result, history_result) {
            (Ok(()), Ok(_)) => Ok(()),
            (Err(snapshot), Ok(_)) => Err(WriteError::Snapshot(snapshot)),
            (Ok(()), Err(history)) => Err(WriteError::History(history)),
            (Err(snapshot), Err(history)) => Err(WriteError::Both { snapshot, history }),
        }
    }
}
