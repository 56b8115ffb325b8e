//! S3-compatible object store adapter.
//!
//! Issues presigned PUT/GET URLs and deletes blobs against any
//! S3-compatible endpoint via the AWS SDK. The original deployment target
//! is Cloudflare R2 (region `auto` with a custom endpoint URL), but plain
//! AWS S3, MinIO, and LocalStack work the same way.
//!
//! Credentials come from the explicit config fields when set, otherwise
//! from the standard AWS credential chain (env vars, `~/.aws/credentials`,
//! IAM role, etc.).

use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, info};

use super::backend::ObjectStore;
use crate::config::S3StorageConfig;

/// Object store that signs URLs against an S3-compatible bucket.
pub struct S3ObjectStore {
    /// AWS S3 SDK client.
    client: Client,
    /// Target bucket name.
    bucket: String,
    /// Validity window of issued signed URLs.
    url_ttl: Duration,
}

impl S3ObjectStore {
    /// Create a new S3 object store.
    ///
    /// `url_ttl` is the fixed validity window applied to every signed URL.
    pub async fn new(config: &S3StorageConfig, url_ttl: Duration) -> anyhow::Result<Self> {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if !config.endpoint_url.is_empty() {
            config_loader = config_loader.endpoint_url(&config.endpoint_url);
        }

        // If explicit credentials are provided, inject them as static credentials.
        if !config.access_key_id.is_empty() && !config.secret_access_key.is_empty() {
            let creds = aws_sdk_s3::config::Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None, // session_token
                None, // expiry
                "fadebox-config",
            );
            config_loader = config_loader.credentials_provider(creds);
        }

        let sdk_config = config_loader.load().await;

        let s3_config_builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(config.use_path_style);

        let client = Client::from_conf(s3_config_builder.build());

        info!(
            "S3 object store initialized: bucket={} region={} endpoint='{}'",
            config.bucket, config.region, config.endpoint_url
        );

        Ok(Self {
            client,
            bucket: config.bucket.clone(),
            url_ttl,
        })
    }

    fn presigning_config(&self) -> anyhow::Result<PresigningConfig> {
        PresigningConfig::expires_in(self.url_ttl)
            .map_err(|e| anyhow::anyhow!("Invalid presigning TTL: {}", e))
    }

    /// Map an AWS SDK error to an anyhow error with context.
    fn map_sdk_error(context: &str, err: impl std::fmt::Display) -> anyhow::Error {
        anyhow::anyhow!("S3 {context}: {err}")
    }
}

impl ObjectStore for S3ObjectStore {
    fn sign_put(
        &self,
        storage_key: &str,
        content_type: &str,
        size_bytes: u64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!("S3 sign_put: bucket={} key={}", self.bucket, storage_key);

            let presigned = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&storage_key)
                .content_type(&content_type)
                .content_length(size_bytes as i64)
                .presigned(self.presigning_config()?)
                .await
                .map_err(|e| Self::map_sdk_error("presign put_object", e))?;

            Ok(presigned.uri().to_string())
        })
    }

    fn sign_get(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<String>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            debug!("S3 sign_get: bucket={} key={}", self.bucket, storage_key);

            let presigned = self
                .client
                .get_object()
                .bucket(&self.bucket)
                .key(&storage_key)
                .presigned(self.presigning_config()?)
                .await
                .map_err(|e| Self::map_sdk_error("presign get_object", e))?;

            Ok(presigned.uri().to_string())
        })
    }

    fn delete(
        &self,
        storage_key: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let storage_key = storage_key.to_string();
        Box::pin(async move {
            debug!("S3 delete_object: bucket={} key={}", self.bucket, storage_key);

            // S3 DeleteObject succeeds for absent keys, so idempotency
            // comes for free.
            self.client
                .delete_object()
                .bucket(&self.bucket)
                .key(&storage_key)
                .send()
                .await
                .map_err(|e| Self::map_sdk_error("delete_object", e))?;

            Ok(())
        })
    }
}
