//! In-memory object store.
//!
//! Issues `memory://` capability URLs and tracks blob presence in a
//! `RwLock<HashSet>`. Useful for tests and single-node dev deployments.
//!
//! There is no out-of-band upload path for an in-process backend, so
//! signing a PUT records the blob as present immediately; the upload the
//! URL authorizes is assumed to happen.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::backend::ObjectStore;

pub struct MemoryObjectStore {
    blobs: RwLock<HashSet<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(HashSet::new()),
        }
    }

    /// Whether a blob is currently present at `storage_key`.
    pub fn contains(&self, storage_key: &str) -> bool {
        let blobs = self.blobs.read().expect("rwlock poisoned");
        blobs.contains(storage_key)
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn sign_put(
        &self,
        storage_key: &str,
        content_type: &str,
        size_bytes: u64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            let mut blobs = self.blobs.write().expect("rwlock poisoned");
            blobs.insert(storage_key.clone());
            Ok(format!(
                "memory://put/{storage_key}?contentType={content_type}&sizeBytes={size_bytes}"
            ))
        })
    }

    fn sign_get(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move { Ok(format!("memory://get/{storage_key}")) })
    }

    fn delete(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            let mut blobs = self.blobs.write().expect("rwlock poisoned");
            // Absent blobs count as success.
            blobs.remove(&storage_key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_put_materializes_blob() {
        let store = MemoryObjectStore::new();
        let url = store
            .sign_put("uploads/x/a.txt", "text/plain", 42)
            .await
            .unwrap();
        assert!(url.starts_with("memory://put/uploads/x/a.txt"));
        assert!(store.contains("uploads/x/a.txt"));
    }

    #[tokio::test]
    async fn test_sign_get_url() {
        let store = MemoryObjectStore::new();
        let url = store.sign_get("uploads/x/a.txt").await.unwrap();
        assert_eq!(url, "memory://get/uploads/x/a.txt");
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryObjectStore::new();
        store
            .sign_put("uploads/x/a.txt", "text/plain", 1)
            .await
            .unwrap();
        store.delete("uploads/x/a.txt").await.unwrap();
        assert!(!store.contains("uploads/x/a.txt"));
        // Deleting the now-absent blob still succeeds, twice.
        store.delete("uploads/x/a.txt").await.unwrap();
        store.delete("never-existed").await.unwrap();
    }
}
