use crate::domain::{ClassifiedReading, DomainResult, HistoryEntry, PatientSnapshot};
use async_trait::async_trait;

/// Repository trait for the patient document store
/// Infrastructure layer (e.g., Firestore) implements this trait
///
/// Writes are individually atomic; there is no transaction spanning the
/// snapshot and the history collection.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PatientStore: Send + Sync {
    /// Merge the snapshot fields onto the patient record, creating it if needed.
    /// Fields not named in the snapshot are left untouched.
    async fn merge_snapshot(&self, patient_id: &str, snapshot: &PatientSnapshot)
        -> DomainResult<()>;

    /// Append a reading to the patient's history collection
    ///
    /// # Returns
    /// The id of the new history document
    async fn append_history(
        &self,
        patient_id: &str,
        reading: &ClassifiedReading,
    ) -> DomainResult<String>;

    /// Most recent history entries, newest `timestamp` first
    async fn recent_history(&self, patient_id: &str, limit: usize)
        -> DomainResult<Vec<HistoryEntry>>;
}
