use async_trait::async_trait;
use regcomment_core::paths::ATTACHMENT_PATH;
use regcomment_core::{FileSpec, UploadSlot};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use crate::ClientError;

/// Obtains a presigned upload destination for one file.
#[async_trait]
pub trait SlotRequester: Send + Sync {
    async fn request_upload_slot(&self, file: &FileSpec) -> Result<UploadSlot, ClientError>;
}

/// Asks the comment server for slots over HTTP.
pub struct HttpSlotRequester {
    base_url: String,
    client: Client,
}

impl HttpSlotRequester {
    /// `base_url` is the server origin plus its path prefix, e.g.
    /// `http://127.0.0.1:8000/eregs/`.
    pub fn new(base_url: &str) -> Self {
        Self::with_client(base_url, Client::new())
    }

    pub fn with_client(base_url: &str, client: Client) -> Self {
        let base_url = format!("{}/", base_url.trim_end_matches('/'));
        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl SlotRequester for HttpSlotRequester {
    async fn request_upload_slot(&self, file: &FileSpec) -> Result<UploadSlot, ClientError> {
        let resp = self
            .client
            .get(format!("{}{ATTACHMENT_PATH}", self.base_url))
            .query(&[
                ("size", file.size.to_string()),
                ("name", file.name.clone()),
                ("type", file.content_type().to_string()),
            ])
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("slot request failed: {e}")))?;

        let slot: UploadSlot = handle_response(resp).await?;
        if slot.key.is_empty() || slot.urls.put.is_empty() || slot.urls.get.is_empty() {
            return Err(ClientError::InvalidResponse(
                "upload slot is missing its key or URLs".into(),
            ));
        }
        debug!(key = %slot.key, name = %file.name, "granted upload slot");
        Ok(slot)
    }
}

pub(crate) async fn handle_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if status.is_success() {
        resp.json::<T>()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("json decode: {e}")))
    } else {
        Err(parse_error_with_status(status, resp).await)
    }
}

pub(crate) async fn parse_error_with_status(
    status: StatusCode,
    resp: reqwest::Response,
) -> ClientError {
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or(body);
    warn!(status = status.as_u16(), %message, "request rejected");

    if status == StatusCode::NOT_FOUND {
        ClientError::NotFound(message)
    } else {
        ClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}
