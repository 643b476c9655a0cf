mod local;
mod memory;
#[cfg(feature = "s3")]
mod presign;

pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use presign::S3Signer;

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

/// Validity of a presigned upload URL, and of the slot behind it.
pub const UPLOAD_EXPIRATION_SECS: u32 = 60 * 60;
/// Lifetime advertised to browsers caching an attachment preview.
pub const PREVIEW_EXPIRATION_SECS: i64 = 60 * 60 * 24 * 90;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Internal(String),
}

/// A store for opaque blobs keyed by string paths.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write (create or overwrite) an object.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), StoreError>;

    /// Read an object. Returns `StoreError::NotFound` if absent.
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Read an object, returning `None` if it does not exist.
    async fn get_opt(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.get(key).await {
            Ok(data) => Ok(Some(data)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an object. No-op if absent.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// List object keys under a prefix.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Check if an object exists.
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get_opt(key).await?.is_some())
    }
}

/// Issues presigned URLs for direct client-to-storage transfers.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// URL accepting one PUT of exactly `size` bytes of `content_type`, whose
    /// `x-amz-meta-name` header is `file_name` in its encoded header form.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        file_name: &str,
        size: u64,
    ) -> Result<String, StoreError>;

    /// URL for downloading `key`, served as an attachment named `file_name`.
    async fn presign_get(&self, key: &str, file_name: &str) -> Result<String, StoreError>;
}

// -- Key helpers --

/// Replace anything that could escape a key segment.
fn key_segment(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".repeat(cleaned.len().max(1)),
        _ => cleaned,
    }
}

pub fn comment_prefix(doc_id: &str) -> String {
    format!("comments/{}/", key_segment(doc_id))
}

pub fn comment_key(doc_id: &str, section_id: &str) -> String {
    format!("{}{}.json", comment_prefix(doc_id), key_segment(section_id))
}

pub fn upload_key(key: &str) -> String {
    format!("uploads/{}", key_segment(key))
}

/// Content type and name recorded next to an upload.
pub fn upload_meta_key(key: &str) -> String {
    format!("{}.meta.json", upload_key(key))
}

pub fn submission_key(key: &str) -> String {
    format!("submissions/{}.json", key_segment(key))
}

// -- Configuration --

/// Configuration for the object store backend.
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// S3-compatible endpoint URL (e.g., "http://127.0.0.1:3900").
    /// When `None`, use local filesystem.
    pub endpoint_url: Option<String>,
    /// S3 region (e.g., "garage", "us-east-1").
    pub region: Option<String>,
    /// Bucket receiving comment attachments.
    pub bucket: Option<String>,
    /// AWS access key ID.
    pub access_key_id: Option<String>,
    /// AWS secret access key.
    pub secret_access_key: Option<String>,
    /// Local filesystem base directory (used when S3 is not configured).
    pub local_data_dir: Option<String>,
}

impl StoreConfig {
    /// Build from environment variables.
    /// If `REGCOMMENT_S3_ENDPOINT` (or `AWS_ENDPOINT_URL`) is set along with
    /// credentials and a bucket name, presign against S3. Otherwise, fall back to local filesystem.
    pub fn from_env() -> Self {
        Self {
            endpoint_url: std::env::var("REGCOMMENT_S3_ENDPOINT")
                .or_else(|_| std::env::var("AWS_ENDPOINT_URL"))
                .ok(),
            region: std::env::var("REGCOMMENT_S3_REGION")
                .or_else(|_| std::env::var("AWS_REGION"))
                .ok(),
            bucket: std::env::var("REGCOMMENT_ATTACHMENT_BUCKET")
                .or_else(|_| std::env::var("REGCOMMENT_S3_BUCKET"))
                .ok(),
            access_key_id: std::env::var("REGCOMMENT_S3_ACCESS_KEY_ID")
                .or_else(|_| std::env::var("AWS_ACCESS_KEY_ID"))
                .ok(),
            secret_access_key: std::env::var("REGCOMMENT_S3_SECRET_ACCESS_KEY")
                .or_else(|_| std::env::var("AWS_SECRET_ACCESS_KEY"))
                .ok(),
            local_data_dir: std::env::var("REGCOMMENT_DATA_DIR").ok(),
        }
    }

    /// Local-only configuration rooted at `dir`.
    pub fn local(dir: impl Into<String>) -> Self {
        Self {
            endpoint_url: None,
            region: None,
            bucket: None,
            access_key_id: None,
            secret_access_key: None,
            local_data_dir: Some(dir.into()),
        }
    }

    pub fn is_s3(&self) -> bool {
        self.endpoint_url.is_some()
            && self.access_key_id.is_some()
            && self.secret_access_key.is_some()
            && self.bucket.is_some()
    }
}

// -- Factory --

/// Create the object store used for comment drafts and submissions.
pub fn create_store(config: &StoreConfig) -> Result<Arc<dyn ObjectStore>, StoreError> {
    Ok(Arc::new(LocalStore::new(config)))
}

/// Create a signer for the configured bucket, or `None` when S3 is not configured.
pub fn create_signer(config: &StoreConfig) -> Result<Option<Arc<dyn UrlSigner>>, StoreError> {
    if !config.is_s3() {
        return Ok(None);
    }
    #[cfg(feature = "s3")]
    {
        Ok(Some(Arc::new(S3Signer::new(config)?)))
    }
    #[cfg(not(feature = "s3"))]
    {
        Err(StoreError::Internal(
            "S3 configuration detected but the 's3' feature is not enabled".into(),
        ))
    }
}
