use anyhow::{Context, Result};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::files::FolderView;
use crate::s3::{
    Endpoint, HyperTransport, S3Client, StoredObjectSummary, Transport, UploadMode, UploadOutcome,
};

/// Core shared by both CLI and server modes
///
/// The S3Client is created once and shared. Clones share the same transport
/// and the same signing key cache.
#[derive(Clone)]
pub struct Core {
    pub config: Arc<Config>,
    /// Shared S3 client
    s3_client_shared: S3Client,
}

impl Core {
    /// Build the core over the real HTTPS transport
    pub fn new(config: Config) -> Result<Self> {
        let transport = HyperTransport::new(config.storage.insecure_tls)
            .context("Failed to create HTTP transport")?
            .with_timeout(Duration::from_secs(config.storage.request_timeout));
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build the core over any transport (tests use the in-memory bucket)
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let storage = &config.storage;

        let endpoint = match &storage.endpoint {
            Some(url) => Endpoint::custom(url).context("Invalid storage.endpoint")?,
            None => Endpoint::aws(&storage.bucket, &storage.region),
        };

        let s3_client_shared = S3Client::new(
            storage.bucket.clone(),
            &storage.region,
            storage.credentials(),
            endpoint,
            transport,
        )
        .with_max_name_attempts(config.transfer.max_name_attempts);

        tracing::debug!(
            bucket = %storage.bucket,
            region = %storage.region,
            endpoint = ?storage.endpoint,
            "core_initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            s3_client_shared,
        })
    }

    /// Get a clone of the shared S3 client
    pub fn s3_client(&self) -> S3Client {
        self.s3_client_shared.clone()
    }

    /// Full listing of the bucket
    pub async fn list_files(&self) -> Result<Vec<StoredObjectSummary>> {
        Ok(self.s3_client_shared.list_objects(None).await?)
    }

    /// Listing grouped for a file browser; `None` or `""` is the root
    pub async fn folder_view(&self, folder: Option<&str>) -> Result<FolderView> {
        let prefix = folder
            .map(|f| f.trim_matches('/'))
            .filter(|f| !f.is_empty())
            .map(|f| format!("{}/", f));
        let objects = self.s3_client_shared.list_objects(prefix.as_deref()).await?;
        Ok(FolderView::build(&objects, folder))
    }

    pub async fn file_exists(&self, name: &str) -> Result<bool> {
        Ok(self.s3_client_shared.object_exists(name).await?)
    }

    /// Upload with the configured default mode unless one is given
    pub async fn upload(
        &self,
        name: &str,
        data: Bytes,
        content_type: Option<&str>,
        mode: Option<UploadMode>,
    ) -> Result<UploadOutcome> {
        let mode = mode.unwrap_or(self.config.transfer.default_mode);
        Ok(self
            .s3_client_shared
            .upload(name, data, content_type, mode)
            .await?)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        Ok(self.s3_client_shared.delete_object(key).await?)
    }

    pub async fn rename(&self, from: &str, to: &str) -> Result<()> {
        Ok(self.s3_client_shared.rename_object(from, to).await?)
    }

    /// Presigned download link, valid for `expires_in` seconds or the configured default
    pub fn download_url(&self, key: &str, expires_in: Option<u64>) -> Result<String> {
        let expires_in = expires_in.unwrap_or(self.config.transfer.url_expiry);
        Ok(self.s3_client_shared.presigned_get_url(key, expires_in)?)
    }
}
