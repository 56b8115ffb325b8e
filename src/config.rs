//! Configuration loading and types for Fadebox.
//!
//! Configuration is read from a YAML file and deserialized into the
//! [`Config`] struct.  Each subsection governs a different part of the
//! system: networking, metadata persistence, object storage, and the
//! ephemeral-object lifecycle policy.

use serde::Deserialize;
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Metadata store settings.
    #[serde(default)]
    pub metadata: MetadataConfig,

    /// Object storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Ephemeral-object lifecycle policy.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Observability settings (metrics + health probes).
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind host address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: text or json.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Observability settings.
///
/// Controls Prometheus metrics collection and the `/health` probe.
/// Both are enabled by default.
#[derive(Debug, Clone, Deserialize)]
pub struct ObservabilityConfig {
    /// Enable Prometheus metrics collection and `/metrics` endpoint.
    #[serde(default = "default_true")]
    pub metrics: bool,

    /// Enable the `/health` probe.
    #[serde(default = "default_true")]
    pub health_check: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics: true,
            health_check: true,
        }
    }
}

/// Metadata store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Engine type: `memory` or `workers-kv`.
    #[serde(default = "default_metadata_engine")]
    pub engine: String,

    /// Cloudflare Workers KV configuration.
    #[serde(default)]
    pub workers_kv: WorkersKvConfig,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            engine: default_metadata_engine(),
            workers_kv: WorkersKvConfig::default(),
        }
    }
}

/// Cloudflare Workers KV metadata configuration.
///
/// Any blank credential field leaves the adapter unconfigured: reads return
/// no data and writes degrade to logged no-ops instead of failing requests.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersKvConfig {
    /// Cloudflare account ID.
    #[serde(default)]
    pub account_id: String,

    /// API token with KV read/write access.
    #[serde(default)]
    pub api_token: String,

    /// KV namespace ID holding file records.
    #[serde(default)]
    pub namespace_id: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_kv_timeout")]
    pub timeout_seconds: u64,
}

impl Default for WorkersKvConfig {
    fn default() -> Self {
        Self {
            account_id: String::new(),
            api_token: String::new(),
            namespace_id: String::new(),
            timeout_seconds: default_kv_timeout(),
        }
    }
}

/// Object storage backend configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend type: `memory` or `s3`.
    #[serde(default = "default_storage_backend")]
    pub backend: String,

    /// S3-compatible backend configuration (AWS S3, Cloudflare R2, MinIO).
    #[serde(default)]
    pub s3: Option<S3StorageConfig>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
            s3: None,
        }
    }
}

/// S3-compatible storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct S3StorageConfig {
    /// Bucket holding uploaded blobs.
    pub bucket: String,
    /// Region; Cloudflare R2 uses `auto`.
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3-compatible endpoint (e.g. R2, MinIO, LocalStack).
    #[serde(default)]
    pub endpoint_url: String,
    /// Force path-style URL addressing.
    #[serde(default)]
    pub use_path_style: bool,
    /// Explicit access key (falls back to env/credential chain).
    #[serde(default)]
    pub access_key_id: String,
    /// Explicit secret key (falls back to env/credential chain).
    #[serde(default)]
    pub secret_access_key: String,
}

/// Ephemeral-object lifecycle policy.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Maximum record age before it becomes expiry-eligible, in seconds.
    #[serde(default = "default_expiry_ttl")]
    pub expiry_ttl_seconds: u64,

    /// Validity window of issued signed URLs, in seconds. Independent of
    /// the object expiry TTL.
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_seconds: u64,

    /// Interval between background sweeps, in seconds. 0 disables the
    /// background sweeper; `POST /api/sweep` remains available.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            expiry_ttl_seconds: default_expiry_ttl(),
            signed_url_ttl_seconds: default_signed_url_ttl(),
            sweep_interval_seconds: default_sweep_interval(),
        }
    }
}

// -- Defaults ----------------------------------------------------------------

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9470
}

fn default_region() -> String {
    "auto".to_string()
}

fn default_metadata_engine() -> String {
    "memory".to_string()
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_kv_timeout() -> u64 {
    10
}

fn default_expiry_ttl() -> u64 {
    3600
}

fn default_signed_url_ttl() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    300
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

// -- Loader ------------------------------------------------------------------

/// Load and parse configuration from a YAML file at `path`.
pub fn load_config<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    let config: Config = serde_yaml::from_str(&contents)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_empty_document() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.server.port, 9470);
        assert_eq!(config.metadata.engine, "memory");
        assert_eq!(config.storage.backend, "memory");
        assert_eq!(config.lifecycle.expiry_ttl_seconds, 3600);
        assert_eq!(config.lifecycle.signed_url_ttl_seconds, 3600);
        assert!(config.observability.metrics);
    }

    #[test]
    fn test_parses_workers_kv_section() {
        let yaml = r#"
metadata:
  engine: workers-kv
  workers_kv:
    account_id: acct-123
    api_token: token-abc
    namespace_id: ns-1
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.metadata.engine, "workers-kv");
        assert_eq!(config.metadata.workers_kv.account_id, "acct-123");
        assert_eq!(config.metadata.workers_kv.timeout_seconds, 10);
    }

    #[test]
    fn test_parses_s3_section() {
        let yaml = r#"
storage:
  backend: s3
  s3:
    bucket: fadebox-files
    endpoint_url: https://example.r2.cloudflarestorage.com
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.backend, "s3");
        let s3 = config.storage.s3.unwrap();
        assert_eq!(s3.bucket, "fadebox-files");
        assert_eq!(s3.region, "auto");
        assert!(!s3.use_path_style);
    }
}
