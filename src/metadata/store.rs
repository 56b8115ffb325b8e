//! Abstract metadata store trait and the file record it stores.
//!
//! The store is a plain string-keyed, string-valued KV boundary: values are
//! opaquely serialized [`FileRecord`]s and the adapters never interpret
//! them.  The trait uses manual async desugaring with pinned futures so it
//! can be implemented by both the in-memory store and remote KV services.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

// ── Record type ────────────────────────────────────────────────────

/// Metadata record for one tracked file.
///
/// Serialized to JSON with camelCase field names, matching the document
/// shape stored in the KV namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// Opaque unique identifier; primary key in the metadata store.
    pub id: String,
    /// Original filename, for presentation only.
    pub display_name: String,
    /// MIME type, passed through to the signed PUT/GET.
    pub content_type: String,
    /// Declared size at intent time; not verified against the stored blob.
    pub size_bytes: u64,
    /// Intent-creation timestamp; anchors the time-based expiry.
    pub created_at: DateTime<Utc>,
    /// Number of download-info issuances. Monotonically non-decreasing.
    #[serde(default)]
    pub download_count: u64,
    /// Object store key the blob is (or will be) written to. Assigned
    /// exactly once at intent creation. Defaults so a legacy row missing
    /// the field decodes with an empty key and hits the sweep's
    /// malformed-record rule instead of failing the scan.
    #[serde(default)]
    pub storage_key: String,
}

impl FileRecord {
    /// Serialize to the JSON wire form stored in the KV value.
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from a stored KV value.
    pub fn from_json(raw: &str) -> anyhow::Result<FileRecord> {
        Ok(serde_json::from_str(raw)?)
    }
}

// ── Trait ──────────────────────────────────────────────────────────

/// Async metadata store contract.
///
/// All operations are best-effort network calls. `delete` is idempotent:
/// deleting an absent key counts as success. `list_ids` may return a stale
/// or partial view; callers must tolerate ids whose record has since gone.
pub trait MetadataStore: Send + Sync + 'static {
    /// Fetch the raw value for `id`, or `None` if absent.
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>>;

    /// Insert or replace the value for `id`.
    fn put(
        &self,
        id: &str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Delete the value for `id`. Absent keys count as success.
    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// List all known ids, unordered.
    fn list_ids(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_record() -> FileRecord {
        FileRecord {
            id: "f3a1".to_string(),
            display_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size_bytes: 10_240,
            created_at: "2026-08-01T12:00:00Z".parse().unwrap(),
            download_count: 0,
            storage_key: "uploads/f3a1/report.pdf".to_string(),
        }
    }

    #[test]
    fn test_round_trip_preserves_all_fields() {
        let record = make_record();
        let json = record.to_json().unwrap();
        let back = FileRecord::from_json(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_wire_format_is_camel_case() {
        let json = make_record().to_json().unwrap();
        assert!(json.contains("\"displayName\""));
        assert!(json.contains("\"contentType\""));
        assert!(json.contains("\"sizeBytes\""));
        assert!(json.contains("\"createdAt\""));
        assert!(json.contains("\"downloadCount\""));
        assert!(json.contains("\"storageKey\""));
    }

    #[test]
    fn test_missing_storage_key_decodes_empty() {
        let raw = r#"{
            "id": "old-1",
            "displayName": "a.txt",
            "contentType": "text/plain",
            "sizeBytes": 42,
            "createdAt": "2026-08-01T12:00:00Z"
        }"#;
        let record = FileRecord::from_json(raw).unwrap();
        assert_eq!(record.download_count, 0);
        assert!(record.storage_key.is_empty());
    }

    #[test]
    fn test_garbage_value_fails_decode() {
        assert!(FileRecord::from_json("not json at all").is_err());
    }
}
