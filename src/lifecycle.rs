//! Ephemeral-object lifecycle manager.
//!
//! Orchestrates the create → deliver → expire state machine for every
//! tracked file. A record moves forward only: CREATED (intent issued, blob
//! not necessarily uploaded yet), DELIVERED (at least one download-info
//! issuance), EXPIRED (eligible for deletion), PURGED (record and blob both
//! gone).
//!
//! The manager is stateless: all mutable state lives in the injected
//! metadata and object stores, so any number of requests and sweeps may run
//! concurrently. Two overlapping download resolutions can lose one counter
//! increment; either write still marks the record downloaded-at-least-once,
//! which is the invariant the sweep acts on. A sweep may also purge a record
//! moments after its download URL was handed out but before the client used
//! it; that is the documented cost of the delete-after-first-download
//! policy.

use chrono::{DateTime, Utc};
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::metadata::store::{FileRecord, MetadataStore};
use crate::metrics::{DOWNLOADS_RESOLVED_TOTAL, INTENTS_CREATED_TOTAL, RECORDS_PURGED_TOTAL, SWEEP_RECORD_FAILURES_TOTAL};
use crate::storage::backend::ObjectStore;

/// Result of a successful upload-intent creation.
#[derive(Debug, Clone)]
pub struct UploadIntent {
    /// Newly assigned file id.
    pub id: String,
    /// Signed PUT URL the client uploads to.
    pub upload_url: String,
}

/// Result of a successful download resolution.
#[derive(Debug, Clone)]
pub struct DownloadGrant {
    /// Original filename, for presentation.
    pub display_name: String,
    /// Declared size in bytes.
    pub size_bytes: u64,
    /// Signed GET URL the client downloads from.
    pub download_url: String,
}

/// The lifecycle manager. Cheap to clone; all fields are shared handles.
#[derive(Clone)]
pub struct Lifecycle {
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    /// Maximum record age before it becomes expiry-eligible.
    expiry_ttl: Duration,
}

impl Lifecycle {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        expiry_ttl: Duration,
    ) -> Self {
        Self {
            metadata,
            objects,
            expiry_ttl,
        }
    }

    /// Derive the object store key for a file. Assigned exactly once at
    /// intent creation and never recomputed from mutable state.
    fn storage_key_for(id: &str, display_name: &str) -> String {
        format!("uploads/{id}/{display_name}")
    }

    /// Whether a record meets an expiry condition at `now`.
    fn is_expired(&self, record: &FileRecord, now: DateTime<Utc>) -> bool {
        if record.download_count >= 1 {
            return true;
        }
        match (now - record.created_at).to_std() {
            Ok(age) => age >= self.expiry_ttl,
            // created_at in the future (clock skew): not aged yet.
            Err(_) => false,
        }
    }

    // -- CreateUploadIntent ---------------------------------------------------

    /// Register a new file and return a signed PUT URL for it.
    ///
    /// The metadata record is written before the URL is returned, so a
    /// download-info request racing right behind the upload always finds
    /// the record. If the metadata write fails the whole operation fails:
    /// a signed URL with no tracking record would be undeletable.
    pub async fn create_upload_intent(
        &self,
        display_name: &str,
        content_type: &str,
        size_bytes: u64,
    ) -> Result<UploadIntent, ApiError> {
        if display_name.is_empty() {
            return Err(ApiError::InvalidArgument {
                message: "displayName is required".to_string(),
            });
        }
        if content_type.is_empty() {
            return Err(ApiError::InvalidArgument {
                message: "contentType is required".to_string(),
            });
        }
        if size_bytes == 0 {
            return Err(ApiError::InvalidArgument {
                message: "sizeBytes must be greater than zero".to_string(),
            });
        }

        let id = Uuid::new_v4().to_string();
        let storage_key = Self::storage_key_for(&id, display_name);

        let upload_url = self
            .objects
            .sign_put(&storage_key, content_type, size_bytes)
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("signing upload URL: {e}"),
            })?;

        let record = FileRecord {
            id: id.clone(),
            display_name: display_name.to_string(),
            content_type: content_type.to_string(),
            size_bytes,
            created_at: Utc::now(),
            download_count: 0,
            storage_key,
        };

        // Fail closed: the URL is already signed, but returning it without
        // a tracking record would leak an untrackable blob.
        self.metadata
            .put(&id, record.to_json()?)
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("writing file record: {e}"),
            })?;

        counter!(INTENTS_CREATED_TOTAL).increment(1);
        info!("Upload intent created: id={} name={}", id, display_name);

        Ok(UploadIntent { id, upload_url })
    }

    // -- ResolveDownload ------------------------------------------------------

    /// Look up a file, mark it delivered, and return a signed GET URL.
    ///
    /// Every call increments the download counter; each issuance is
    /// independently sufficient to mark the record for purge. The increment
    /// is a plain read-modify-write: two concurrent calls may both write
    /// `download_count = 1`, which still satisfies the
    /// downloaded-at-least-once invariant.
    pub async fn resolve_download(&self, id: &str) -> Result<DownloadGrant, ApiError> {
        let raw = self
            .metadata
            .get(id)
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("reading file record: {e}"),
            })?;

        let Some(raw) = raw else {
            return Err(ApiError::NotFound { id: id.to_string() });
        };

        let mut record = match FileRecord::from_json(&raw) {
            Ok(record) if !record.storage_key.is_empty() => record,
            _ => {
                // Undeliverable record; the next sweep drops it.
                warn!("Malformed record for id={}, treating as absent", id);
                return Err(ApiError::NotFound { id: id.to_string() });
            }
        };

        record.download_count += 1;

        // Fail closed: handing out the URL without persisting the counter
        // would allow indefinite redownload.
        self.metadata
            .put(id, record.to_json()?)
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("updating download count: {e}"),
            })?;

        let download_url = self
            .objects
            .sign_get(&record.storage_key)
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("signing download URL: {e}"),
            })?;

        counter!(DOWNLOADS_RESOLVED_TOTAL).increment(1);
        debug!(
            "Download resolved: id={} count={}",
            id, record.download_count
        );

        Ok(DownloadGrant {
            display_name: record.display_name,
            size_bytes: record.size_bytes,
            download_url,
        })
    }

    // -- Sweep ----------------------------------------------------------------

    /// Scan all records and purge those meeting an expiry condition.
    ///
    /// Returns the number of records purged. Deletion order is blob then
    /// metadata: failing after the blob delete leaves a dangling record a
    /// later sweep retries, whereas the reverse order could leak a blob
    /// with no remaining reference. Per-record failures are logged and
    /// skipped; only a failure of the initial listing fails the call.
    pub async fn sweep(&self) -> Result<u64, ApiError> {
        let ids = self
            .metadata
            .list_ids()
            .await
            .map_err(|e| ApiError::DependencyUnavailable {
                message: format!("listing file records: {e}"),
            })?;

        let now = Utc::now();
        let mut purged: u64 = 0;

        for id in ids {
            let raw = match self.metadata.get(&id).await {
                Ok(Some(raw)) => raw,
                // Already purged by a concurrent sweep, or the listing was
                // stale.
                Ok(None) => continue,
                Err(e) => {
                    warn!("Sweep: fetching record {} failed, retry next pass: {}", id, e);
                    counter!(SWEEP_RECORD_FAILURES_TOTAL).increment(1);
                    continue;
                }
            };

            let record = match FileRecord::from_json(&raw) {
                Ok(record) if !record.storage_key.is_empty() => record,
                _ => {
                    // The blob key is unknown, so only the record can go.
                    warn!("Sweep: malformed record {}, deleting metadata only", id);
                    match self.metadata.delete(&id).await {
                        Ok(()) => purged += 1,
                        Err(e) => {
                            warn!("Sweep: deleting malformed record {} failed: {}", id, e);
                            counter!(SWEEP_RECORD_FAILURES_TOTAL).increment(1);
                        }
                    }
                    continue;
                }
            };

            if !self.is_expired(&record, now) {
                continue;
            }

            debug!(
                "Sweep: purging id={} name={} downloads={}",
                id, record.display_name, record.download_count
            );

            if let Err(e) = self.objects.delete(&record.storage_key).await {
                warn!("Sweep: blob delete for {} failed, retry next pass: {}", id, e);
                counter!(SWEEP_RECORD_FAILURES_TOTAL).increment(1);
                continue;
            }
            if let Err(e) = self.metadata.delete(&id).await {
                // The blob is gone; the dangling record is harmless and a
                // later sweep re-deletes it (blob delete is idempotent).
                warn!("Sweep: metadata delete for {} failed, retry next pass: {}", id, e);
                counter!(SWEEP_RECORD_FAILURES_TOTAL).increment(1);
                continue;
            }
            purged += 1;
        }

        if purged > 0 {
            counter!(RECORDS_PURGED_TOTAL).increment(purged);
            info!("Sweep complete: purged {} records", purged);
        }

        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::memory::MemoryMetadataStore;
    use crate::storage::memory::MemoryObjectStore;
    use std::future::Future;
    use std::pin::Pin;

    const HOUR: Duration = Duration::from_secs(3600);

    fn harness() -> (Arc<MemoryMetadataStore>, Arc<MemoryObjectStore>, Lifecycle) {
        let metadata = Arc::new(MemoryMetadataStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let lifecycle = Lifecycle::new(metadata.clone(), objects.clone(), HOUR);
        (metadata, objects, lifecycle)
    }

    async fn fetch_record(metadata: &MemoryMetadataStore, id: &str) -> Option<FileRecord> {
        let raw = metadata.get(id).await.unwrap()?;
        Some(FileRecord::from_json(&raw).unwrap())
    }

    // -- CreateUploadIntent ----------------------------------------------------

    #[tokio::test]
    async fn test_create_intent_writes_record_and_signs_url() {
        let (metadata, objects, lifecycle) = harness();

        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();
        assert!(!intent.upload_url.is_empty());

        let record = fetch_record(&metadata, &intent.id).await.unwrap();
        assert_eq!(record.id, intent.id);
        assert_eq!(record.display_name, "a.txt");
        assert_eq!(record.content_type, "text/plain");
        assert_eq!(record.size_bytes, 42);
        assert_eq!(record.download_count, 0);
        assert_eq!(record.storage_key, format!("uploads/{}/a.txt", intent.id));
        assert!(objects.contains(&record.storage_key));
    }

    #[tokio::test]
    async fn test_create_intent_ids_are_unique() {
        let (_, _, lifecycle) = harness();
        let a = lifecycle
            .create_upload_intent("a.txt", "text/plain", 1)
            .await
            .unwrap();
        let b = lifecycle
            .create_upload_intent("a.txt", "text/plain", 1)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_create_intent_validation() {
        let (_, _, lifecycle) = harness();
        for (name, ct, size) in [
            ("", "text/plain", 42u64),
            ("a.txt", "", 42),
            ("a.txt", "text/plain", 0),
        ] {
            let err = lifecycle
                .create_upload_intent(name, ct, size)
                .await
                .unwrap_err();
            assert_eq!(err.code(), "InvalidArgument");
        }
    }

    /// Metadata store whose writes always fail; reads delegate.
    struct ReadOnlyMetadataStore {
        inner: MemoryMetadataStore,
    }

    impl MetadataStore for ReadOnlyMetadataStore {
        fn get(
            &self,
            id: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
            self.inner.get(id)
        }

        fn put(
            &self,
            _id: &str,
            _value: String,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async move { Err(anyhow::anyhow!("kv write refused")) })
        }

        fn delete(
            &self,
            id: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            self.inner.delete(id)
        }

        fn list_ids(
            &self,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
            self.inner.list_ids()
        }
    }

    #[tokio::test]
    async fn test_create_intent_fails_closed_on_metadata_write_failure() {
        let metadata = Arc::new(ReadOnlyMetadataStore {
            inner: MemoryMetadataStore::new(),
        });
        let objects = Arc::new(MemoryObjectStore::new());
        let lifecycle = Lifecycle::new(metadata, objects, HOUR);

        let err = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "DependencyUnavailable");
    }

    // -- ResolveDownload -------------------------------------------------------

    #[tokio::test]
    async fn test_resolve_download_increments_and_grants() {
        let (metadata, _, lifecycle) = harness();
        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();

        let grant = lifecycle.resolve_download(&intent.id).await.unwrap();
        assert_eq!(grant.display_name, "a.txt");
        assert_eq!(grant.size_bytes, 42);
        assert!(!grant.download_url.is_empty());

        let record = fetch_record(&metadata, &intent.id).await.unwrap();
        assert_eq!(record.download_count, 1);
    }

    #[tokio::test]
    async fn test_resolve_download_counts_every_issuance() {
        let (metadata, _, lifecycle) = harness();
        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();

        lifecycle.resolve_download(&intent.id).await.unwrap();
        lifecycle.resolve_download(&intent.id).await.unwrap();
        lifecycle.resolve_download(&intent.id).await.unwrap();

        let record = fetch_record(&metadata, &intent.id).await.unwrap();
        assert_eq!(record.download_count, 3);
    }

    #[tokio::test]
    async fn test_resolve_download_unknown_id_is_not_found() {
        let (_, _, lifecycle) = harness();
        let err = lifecycle.resolve_download("no-such-id").await.unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[tokio::test]
    async fn test_resolve_download_malformed_record_is_not_found() {
        let (metadata, _, lifecycle) = harness();
        metadata
            .put("bad", "not json".to_string())
            .await
            .unwrap();
        let err = lifecycle.resolve_download("bad").await.unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    // -- Sweep -----------------------------------------------------------------

    #[tokio::test]
    async fn test_sweep_leaves_fresh_undownloaded_record() {
        let (metadata, objects, lifecycle) = harness();
        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();

        let purged = lifecycle.sweep().await.unwrap();
        assert_eq!(purged, 0);

        // Still resolvable afterwards.
        let record = fetch_record(&metadata, &intent.id).await.unwrap();
        assert!(objects.contains(&record.storage_key));
        lifecycle.resolve_download(&intent.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_sweep_purges_downloaded_record() {
        let (metadata, objects, lifecycle) = harness();
        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();
        let storage_key = fetch_record(&metadata, &intent.id).await.unwrap().storage_key;

        lifecycle.resolve_download(&intent.id).await.unwrap();

        let purged = lifecycle.sweep().await.unwrap();
        assert_eq!(purged, 1);
        assert!(fetch_record(&metadata, &intent.id).await.is_none());
        assert!(!objects.contains(&storage_key));

        // Subsequent resolution sees the record gone.
        let err = lifecycle.resolve_download(&intent.id).await.unwrap_err();
        assert_eq!(err.code(), "NotFound");
    }

    #[tokio::test]
    async fn test_sweep_purges_aged_record_never_downloaded() {
        let (metadata, _, lifecycle) = harness();
        let record = FileRecord {
            id: "old".to_string(),
            display_name: "old.bin".to_string(),
            content_type: "application/octet-stream".to_string(),
            size_bytes: 7,
            created_at: Utc::now() - chrono::Duration::hours(2),
            download_count: 0,
            storage_key: "uploads/old/old.bin".to_string(),
        };
        metadata
            .put("old", record.to_json().unwrap())
            .await
            .unwrap();

        let purged = lifecycle.sweep().await.unwrap();
        assert_eq!(purged, 1);
        assert!(metadata.get("old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sweep_is_idempotent() {
        let (_, _, lifecycle) = harness();
        let intent = lifecycle
            .create_upload_intent("a.txt", "text/plain", 42)
            .await
            .unwrap();
        lifecycle.resolve_download(&intent.id).await.unwrap();

        assert_eq!(lifecycle.sweep().await.unwrap(), 1);
        assert_eq!(lifecycle.sweep().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_drops_malformed_records() {
        let (metadata, _, lifecycle) = harness();
        metadata
            .put("garbage", "definitely not json".to_string())
            .await
            .unwrap();
        // Decodes, but the blob key was never assigned.
        let keyless = r#"{
            "id": "keyless",
            "displayName": "x",
            "contentType": "text/plain",
            "sizeBytes": 1,
            "createdAt": "2026-08-01T12:00:00Z"
        }"#;
        metadata
            .put("keyless", keyless.to_string())
            .await
            .unwrap();

        let purged = lifecycle.sweep().await.unwrap();
        assert_eq!(purged, 2);
        assert!(metadata.get("garbage").await.unwrap().is_none());
        assert!(metadata.get("keyless").await.unwrap().is_none());
    }

    /// Object store that refuses to delete one specific key.
    struct FlakyObjectStore {
        inner: MemoryObjectStore,
        fail_key: String,
    }

    impl ObjectStore for FlakyObjectStore {
        fn sign_put(
            &self,
            storage_key: &str,
            content_type: &str,
            size_bytes: u64,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
            self.inner.sign_put(storage_key, content_type, size_bytes)
        }

        fn sign_get(
            &self,
            storage_key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
            self.inner.sign_get(storage_key)
        }

        fn delete(
            &self,
            storage_key: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            if storage_key == self.fail_key {
                return Box::pin(async move { Err(anyhow::anyhow!("blob delete refused")) });
            }
            self.inner.delete(storage_key)
        }
    }

    #[tokio::test]
    async fn test_sweep_isolates_per_record_failures() {
        let metadata = Arc::new(MemoryMetadataStore::new());

        // Find out which key will fail before wiring the flaky store: use a
        // fixed record instead of a generated one.
        let sticky = FileRecord {
            id: "sticky".to_string(),
            display_name: "sticky.txt".to_string(),
            content_type: "text/plain".to_string(),
            size_bytes: 3,
            created_at: Utc::now(),
            download_count: 1,
            storage_key: "uploads/sticky/sticky.txt".to_string(),
        };
        metadata
            .put("sticky", sticky.to_json().unwrap())
            .await
            .unwrap();

        let objects = Arc::new(FlakyObjectStore {
            inner: MemoryObjectStore::new(),
            fail_key: sticky.storage_key.clone(),
        });
        let lifecycle = Lifecycle::new(metadata.clone(), objects, HOUR);

        // Two more expired records that delete cleanly.
        for n in 0..2 {
            let intent = lifecycle
                .create_upload_intent(&format!("f{n}.txt"), "text/plain", 5)
                .await
                .unwrap();
            lifecycle.resolve_download(&intent.id).await.unwrap();
        }

        let purged = lifecycle.sweep().await.unwrap();
        assert_eq!(purged, 2);
        // The failing record survives for the next pass.
        assert!(metadata.get("sticky").await.unwrap().is_some());
    }
}
