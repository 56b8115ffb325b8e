//! Abstract object store trait.
//!
//! The object store is a capability issuer, not a byte pipe: it signs
//! time-limited PUT/GET URLs and deletes blobs by key, and file bytes flow
//! directly between the client and the store.  The trait uses manual async
//! desugaring with pinned futures, like the metadata store.

use std::future::Future;
use std::pin::Pin;

/// Async object store contract.
///
/// The validity window of signed URLs is fixed at adapter construction and
/// is independent of the object expiry TTL. `delete` is idempotent:
/// deleting an absent blob counts as success.
pub trait ObjectStore: Send + Sync + 'static {
    /// Sign a PUT URL scoped to `storage_key` for a blob of the declared
    /// content type and size.
    fn sign_put(
        &self,
        storage_key: &str,
        content_type: &str,
        size_bytes: u64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Sign a GET URL scoped to `storage_key`.
    fn sign_get(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>>;

    /// Delete the blob at `storage_key`. Absent blobs count as success.
    fn delete(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}
