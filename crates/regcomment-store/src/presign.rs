//! Presigned S3 URLs for direct client-to-bucket transfers.
//!
//! The PUT URL signs `content-type`, `content-length` and `x-amz-meta-name`,
//! so the bucket rejects an upload that differs from what the slot was
//! issued for.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use http::HeaderMap;
use regcomment_core::attachment::{
    content_disposition, encode_name_metadata, NAME_METADATA_HEADER,
};
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::region::Region;
use s3::Bucket;

use crate::{
    StoreConfig, StoreError, UrlSigner, PREVIEW_EXPIRATION_SECS, UPLOAD_EXPIRATION_SECS,
};

pub struct S3Signer {
    bucket: Box<Bucket>,
}

impl std::fmt::Debug for S3Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Signer")
            .field("bucket", &self.bucket.name())
            .finish_non_exhaustive()
    }
}

impl S3Signer {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let region = Region::Custom {
            region: config.region.clone().unwrap_or_else(|| "us-east-1".into()),
            endpoint: config.endpoint_url.clone().unwrap_or_default(),
        };

        let credentials = Credentials::new(
            config.access_key_id.as_deref(),
            config.secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .map_err(|e| StoreError::Internal(format!("credentials: {e}")))?;

        let bucket_name = config
            .bucket
            .as_deref()
            .ok_or_else(|| StoreError::Internal("bucket name required".into()))?;

        let mut bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StoreError::Internal(format!("bucket: {e}")))?;
        bucket.set_path_style();

        Ok(Self { bucket })
    }
}

fn map_s3_error(e: S3Error) -> StoreError {
    StoreError::Internal(format!("s3: {e}"))
}

fn header_value(value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value)
        .map_err(|e| StoreError::Internal(format!("header value {value:?}: {e}")))
}

/// Headers the PUT must carry verbatim.
fn upload_headers(
    content_type: &str,
    file_name: &str,
    size: u64,
) -> Result<HeaderMap, StoreError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, header_value(content_type)?);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(
        HeaderName::from_static(NAME_METADATA_HEADER),
        header_value(&encode_name_metadata(file_name))?,
    );
    Ok(headers)
}

#[async_trait]
impl UrlSigner for S3Signer {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        file_name: &str,
        size: u64,
    ) -> Result<String, StoreError> {
        let headers = upload_headers(content_type, file_name, size)?;
        self.bucket
            .presign_put(key, UPLOAD_EXPIRATION_SECS, Some(headers), None)
            .await
            .map_err(map_s3_error)
    }

    async fn presign_get(&self, key: &str, file_name: &str) -> Result<String, StoreError> {
        let expires = Utc::now() + Duration::seconds(PREVIEW_EXPIRATION_SECS);
        let queries = HashMap::from([
            (
                "response-content-disposition".to_string(),
                content_disposition(file_name),
            ),
            (
                "response-expires".to_string(),
                expires.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
        ]);
        self.bucket
            .presign_get(key, UPLOAD_EXPIRATION_SECS, Some(queries))
            .await
            .map_err(map_s3_error)
    }
}
