//! In-memory metadata store.
//!
//! Stores all records in memory with no persistence. Useful for tests and
//! single-node dev deployments. Uses `RwLock<HashMap>` for thread-safe
//! access.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use super::store::MetadataStore;

pub struct MemoryMetadataStore {
    records: RwLock<HashMap<String, String>>,
}

impl MemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataStore for MemoryMetadataStore {
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let records = self.records.read().expect("rwlock poisoned");
            Ok(records.get(&id).cloned())
        })
    }

    fn put(
        &self,
        id: &str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut records = self.records.write().expect("rwlock poisoned");
            records.insert(id, value);
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut records = self.records.write().expect("rwlock poisoned");
            // Absent keys count as success.
            records.remove(&id);
            Ok(())
        })
    }

    fn list_ids(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            let records = self.records.read().expect("rwlock poisoned");
            Ok(records.keys().cloned().collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryMetadataStore::new();
        store.put("a", "{\"x\":1}".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("{\"x\":1}"));
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = MemoryMetadataStore::new();
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_replaces_existing_value() {
        let store = MemoryMetadataStore::new();
        store.put("a", "v1".to_string()).await.unwrap();
        store.put("a", "v2".to_string()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("v2"));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = MemoryMetadataStore::new();
        store.put("a", "v".to_string()).await.unwrap();
        store.delete("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
        // Second delete of the now-absent key still succeeds.
        store.delete("a").await.unwrap();
        store.delete("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_ids() {
        let store = MemoryMetadataStore::new();
        assert!(store.list_ids().await.unwrap().is_empty());
        store.put("a", "1".to_string()).await.unwrap();
        store.put("b", "2".to_string()).await.unwrap();
        let mut ids = store.list_ids().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
    }
}
