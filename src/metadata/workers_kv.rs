//! Cloudflare Workers KV metadata store.
//!
//! Talks to the Workers KV REST API via `reqwest`:
//!   Values:  `GET|PUT|DELETE /accounts/{acct}/storage/kv/namespaces/{ns}/values/{key}`
//!   Listing: `GET /accounts/{acct}/storage/kv/namespaces/{ns}/keys`
//!
//! The adapter degrades when unconfigured (any blank credential field):
//! reads return no data, writes are no-ops, and every degraded call emits a
//! warning. A missing namespace must never corrupt a lifecycle decision by
//! surfacing as an error.

use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use super::store::MetadataStore;
use crate::config::WorkersKvConfig;

/// Cloudflare API base URL.
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

pub struct WorkersKvMetadataStore {
    /// HTTP client for KV REST calls.
    client: reqwest::Client,
    config: WorkersKvConfig,
}

/// One entry of a key listing response.
#[derive(Debug, Deserialize)]
struct KvKey {
    name: String,
}

/// Envelope of the key listing response.
#[derive(Debug, Deserialize)]
struct KvKeyList {
    #[serde(default)]
    result: Vec<KvKey>,
}

impl WorkersKvMetadataStore {
    /// Create a new Workers KV store from configuration.
    ///
    /// Construction succeeds even with blank credentials; the adapter then
    /// runs in degraded no-op mode so callers see "no data" rather than
    /// errors.
    pub fn new(config: WorkersKvConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds.max(1)))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        if !Self::is_configured(&config) {
            warn!("Workers KV credentials not set; metadata operations will be no-ops");
        }

        Ok(Self { client, config })
    }

    fn is_configured(config: &WorkersKvConfig) -> bool {
        !config.account_id.is_empty()
            && !config.api_token.is_empty()
            && !config.namespace_id.is_empty()
    }

    fn configured(&self) -> bool {
        Self::is_configured(&self.config)
    }

    /// URL of a single value.
    fn value_url(&self, id: &str) -> String {
        format!(
            "{}/accounts/{}/storage/kv/namespaces/{}/values/{}",
            CLOUDFLARE_API_BASE, self.config.account_id, self.config.namespace_id, id
        )
    }

    /// URL of the key listing.
    fn keys_url(&self) -> String {
        format!(
            "{}/accounts/{}/storage/kv/namespaces/{}/keys",
            CLOUDFLARE_API_BASE, self.config.account_id, self.config.namespace_id
        )
    }
}

impl MetadataStore for WorkersKvMetadataStore {
    fn get(
        &self,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            if !self.configured() {
                warn!("Workers KV not configured; get({}) returns absent", id);
                return Ok(None);
            }

            debug!("KV get: {}", id);
            let response = self
                .client
                .get(self.value_url(&id))
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("KV get {}: {}", id, e))?;

            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Ok(None);
            }
            if !response.status().is_success() {
                return Err(anyhow::anyhow!(
                    "KV get {}: unexpected status {}",
                    id,
                    response.status()
                ));
            }

            let body = response
                .text()
                .await
                .map_err(|e| anyhow::anyhow!("KV get {}: reading body: {}", id, e))?;
            Ok(Some(body))
        })
    }

    fn put(
        &self,
        id: &str,
        value: String,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            if !self.configured() {
                warn!("Workers KV not configured; put({}) dropped", id);
                return Ok(());
            }

            debug!("KV put: {}", id);
            let response = self
                .client
                .put(self.value_url(&id))
                .bearer_auth(&self.config.api_token)
                .header("content-type", "application/json")
                .body(value)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("KV put {}: {}", id, e))?;

            if !response.status().is_success() {
                return Err(anyhow::anyhow!(
                    "KV put {}: unexpected status {}",
                    id,
                    response.status()
                ));
            }
            Ok(())
        })
    }

    fn delete(&self, id: &str) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let id = id.to_string();
        Box::pin(async move {
            if !self.configured() {
                warn!("Workers KV not configured; delete({}) dropped", id);
                return Ok(());
            }

            debug!("KV delete: {}", id);
            let response = self
                .client
                .delete(self.value_url(&id))
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("KV delete {}: {}", id, e))?;

            // 404 means the key is already gone; deletion is idempotent.
            if response.status() == reqwest::StatusCode::NOT_FOUND
                || response.status().is_success()
            {
                return Ok(());
            }
            Err(anyhow::anyhow!(
                "KV delete {}: unexpected status {}",
                id,
                response.status()
            ))
        })
    }

    fn list_ids(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<String>>> + Send + '_>> {
        Box::pin(async move {
            if !self.configured() {
                warn!("Workers KV not configured; list_ids returns empty");
                return Ok(Vec::new());
            }

            debug!("KV list keys");
            let response = self
                .client
                .get(self.keys_url())
                .bearer_auth(&self.config.api_token)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("KV list keys: {}", e))?;

            if !response.status().is_success() {
                return Err(anyhow::anyhow!(
                    "KV list keys: unexpected status {}",
                    response.status()
                ));
            }

            let listing: KvKeyList = response
                .json()
                .await
                .map_err(|e| anyhow::anyhow!("KV list keys: decoding response: {}", e))?;
            Ok(listing.result.into_iter().map(|k| k.name).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unconfigured() -> WorkersKvMetadataStore {
        WorkersKvMetadataStore::new(WorkersKvConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_unconfigured_get_is_absent() {
        let store = unconfigured();
        assert!(store.get("any").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_writes_are_noops() {
        let store = unconfigured();
        store.put("any", "{}".to_string()).await.unwrap();
        store.delete("any").await.unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_listing_is_empty() {
        let store = unconfigured();
        assert!(store.list_ids().await.unwrap().is_empty());
    }

    #[test]
    fn test_value_url_layout() {
        let store = WorkersKvMetadataStore::new(WorkersKvConfig {
            account_id: "acct".to_string(),
            api_token: "tok".to_string(),
            namespace_id: "ns".to_string(),
            timeout_seconds: 10,
        })
        .unwrap();
        assert_eq!(
            store.value_url("abc"),
            "https://api.cloudflare.com/client/v4/accounts/acct/storage/kv/namespaces/ns/values/abc"
        );
        assert_eq!(
            store.keys_url(),
            "https://api.cloudflare.com/client/v4/accounts/acct/storage/kv/namespaces/ns/keys"
        );
    }
}
