use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::s3::constants::MAX_PRESIGNED_TTL;
use crate::s3::types::UploadMode;
use crate::s3::Credentials;

/// Bucket, credentials and endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Bucket all operations run against
    pub bucket: String,

    /// AWS region (default: us-east-2)
    #[serde(default = "default_region")]
    pub region: String,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,

    /// Session token for temporary credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Custom S3-compatible endpoint, addressed path-style
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// Skip TLS certificate verification (self-signed test endpoints)
    #[serde(default)]
    pub insecure_tls: bool,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

fn default_region() -> String {
    "us-east-2".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl StorageConfig {
    pub fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(&self.access_key_id, &self.secret_access_key);
        match &self.session_token {
            Some(token) => credentials.with_session_token(token),
            None => credentials,
        }
    }
}

/// HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 127.0.0.1:3000)
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Largest accepted request body in bytes (default: 250 MiB)
    #[serde(default = "default_max_body_size")]
    pub max_body_size: usize,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_max_body_size() -> usize {
    250 * 1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            max_body_size: default_max_body_size(),
        }
    }
}

/// Upload and download behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Lifetime of download links in seconds
    #[serde(default = "default_url_expiry")]
    pub url_expiry: u64,

    /// Bound on `name(n).ext` probes before an upload gives up
    #[serde(default = "default_max_name_attempts")]
    pub max_name_attempts: u32,

    /// Collision handling when the caller does not pick one
    #[serde(default)]
    pub default_mode: UploadMode,
}

fn default_url_expiry() -> u64 {
    3600
}

fn default_max_name_attempts() -> u32 {
    crate::s3::client::DEFAULT_MAX_NAME_ATTEMPTS
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            url_expiry: default_url_expiry(),
            max_name_attempts: default_max_name_attempts(),
            default_mode: UploadMode::default(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub transfer: TransferConfig,
}

impl Config {
    /// Reject configurations that would only fail later, at request time
    pub fn validate(&self) -> Result<()> {
        if self.storage.bucket.trim().is_empty() {
            anyhow::bail!("storage.bucket must not be empty");
        }
        if self.storage.access_key_id.is_empty() || self.storage.secret_access_key.is_empty() {
            anyhow::bail!("storage credentials must not be empty");
        }
        if self.transfer.url_expiry == 0 || self.transfer.url_expiry > MAX_PRESIGNED_TTL {
            anyhow::bail!(
                "transfer.url_expiry must be between 1 and {} seconds (got {})",
                MAX_PRESIGNED_TTL,
                self.transfer.url_expiry
            );
        }
        if self.transfer.max_name_attempts == 0 {
            anyhow::bail!("transfer.max_name_attempts must be at least 1");
        }
        if self.server.max_body_size == 0 {
            anyhow::bail!("server.max_body_size must be at least 1 byte");
        }
        Ok(())
    }
}

/// Load configuration from a YAML file
pub fn load_from_yaml<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .context(format!("Failed to read config file: {:?}", path.as_ref()))?;

    let config: Config = serde_yaml::from_str(&content)
        .context("Failed to parse YAML configuration")?;

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// - AWS_BUCKET_NAME (required)
/// - AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY (required)
/// - AWS_SESSION_TOKEN (optional)
/// - AWS_REGION (optional, defaults to us-east-2)
/// - S3_ENDPOINT (optional custom endpoint)
/// - S3FILER_INSECURE_TLS (optional, true/1)
/// - S3FILER_LISTEN (optional, defaults to 127.0.0.1:3000)
/// - S3FILER_URL_EXPIRY (optional, seconds)
/// - S3FILER_MAX_NAME_ATTEMPTS (optional)
pub fn load_from_env() -> Result<Config> {
    // Try to load .env file if it exists (don't fail if it doesn't)
    let _ = dotenvy::dotenv();

    let bucket = std::env::var("AWS_BUCKET_NAME")
        .context("AWS_BUCKET_NAME environment variable not set")?;

    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
        .context("AWS_ACCESS_KEY_ID environment variable not set")?;

    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
        .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;

    let region = std::env::var("AWS_REGION").unwrap_or_else(|_| default_region());

    let storage = StorageConfig {
        bucket,
        region,
        access_key_id,
        secret_access_key,
        session_token: std::env::var("AWS_SESSION_TOKEN").ok().filter(|t| !t.is_empty()),
        endpoint: std::env::var("S3_ENDPOINT").ok().filter(|e| !e.is_empty()),
        insecure_tls: std::env::var("S3FILER_INSECURE_TLS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false),
        request_timeout: default_request_timeout(),
    };

    let mut config = Config {
        storage,
        server: ServerConfig::default(),
        transfer: TransferConfig::default(),
    };

    if let Ok(listen) = std::env::var("S3FILER_LISTEN") {
        config.server.listen = listen;
    }

    if let Ok(expiry) = std::env::var("S3FILER_URL_EXPIRY") {
        config.transfer.url_expiry = expiry
            .parse()
            .context(format!("Invalid S3FILER_URL_EXPIRY: {}", expiry))?;
    }

    if let Ok(attempts) = std::env::var("S3FILER_MAX_NAME_ATTEMPTS") {
        config.transfer.max_name_attempts = attempts
            .parse()
            .context(format!("Invalid S3FILER_MAX_NAME_ATTEMPTS: {}", attempts))?;
    }

    config.validate()?;
    Ok(config)
}

/// Load configuration from file or environment
///
/// Uses the YAML file when a path is given, environment variables otherwise.
pub fn load_config(config_path: Option<&str>) -> Result<Config> {
    match config_path {
        Some(path) => load_from_yaml(path),
        None => load_from_env(),
    }
}
