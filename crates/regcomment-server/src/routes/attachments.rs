use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use regcomment_core::attachment::{
    content_disposition, decode_name_metadata, effective_mime_type, SlotUrls,
    DEFAULT_MIME_TYPE, NAME_METADATA_HEADER,
};
use regcomment_core::paths::{ATTACHMENT_PATH, UPLOADS_PATH};
use regcomment_core::UploadSlot;
use regcomment_store::{upload_key, upload_meta_key};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{api_error, core_error, store_error, ApiError, AppState};
use crate::keys::generate_key;

pub fn routes(max_size: u64) -> Router<AppState> {
    let body_limit = usize::try_from(max_size)
        .unwrap_or(usize::MAX)
        .saturating_add(1);
    Router::new()
        .route(&format!("/{ATTACHMENT_PATH}"), get(upload_proxy))
        .route(
            &format!("/{UPLOADS_PATH}/{{key}}"),
            get(download).put(upload),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

#[derive(Debug, Deserialize)]
struct SlotQuery {
    name: String,
    size: u64,
    #[serde(rename = "type")]
    mime_type: Option<String>,
}

/// What the download route needs once the slot binding is gone.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredUpload {
    content_type: String,
    name: String,
}

/// Issue a random key plus presigned PUT and GET URLs for one attachment.
async fn upload_proxy(
    State(state): State<AppState>,
    Query(q): Query<SlotQuery>,
) -> Result<Json<UploadSlot>, ApiError> {
    if let Err(e) = state.policy.validate(&q.name, q.size) {
        warn!(name = %q.name, size = q.size, "rejected attachment: {e}");
        return Err(core_error(StatusCode::BAD_REQUEST, e));
    }

    let content_type = effective_mime_type(q.mime_type.as_deref());
    let key = generate_key();
    let put = state
        .signer
        .presign_put(&key, content_type, &q.name, q.size)
        .await
        .map_err(store_error)?;
    let get = state
        .signer
        .presign_get(&key, &q.name)
        .await
        .map_err(store_error)?;

    info!(key = %key, name = %q.name, size = q.size, "issued upload slot");
    Ok(Json(UploadSlot {
        urls: SlotUrls { put, get },
        key,
    }))
}

/// Local stand-in for the storage backend's presigned PUT.
async fn upload(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let binding = state
        .bindings
        .get(&key)
        .ok_or_else(|| api_error(StatusCode::FORBIDDEN, "no upload slot for key"))?;

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != binding.content_type {
        warn!(key = %key, expected = %binding.content_type, got = %content_type, "content type mismatch");
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "content type does not match the signed upload",
        ));
    }

    let name = headers
        .get(NAME_METADATA_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(decode_name_metadata)
        .unwrap_or_default();
    if name != binding.name {
        warn!(key = %key, expected = %binding.name, got = %name, "metadata mismatch");
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "name metadata does not match the signed upload",
        ));
    }

    if body.len() as u64 != binding.size {
        warn!(key = %key, expected = binding.size, got = body.len(), "content length mismatch");
        return Err(api_error(
            StatusCode::FORBIDDEN,
            "content length does not match the signed upload",
        ));
    }

    let meta = serde_json::to_vec(&StoredUpload {
        content_type: binding.content_type.clone(),
        name: binding.name.clone(),
    })
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state
        .store
        .put(&upload_key(&key), body)
        .await
        .map_err(store_error)?;
    state
        .store
        .put(&upload_meta_key(&key), Bytes::from(meta))
        .await
        .map_err(store_error)?;
    state.bindings.take(&key);
    info!(key = %key, name = %binding.name, size = binding.size, "stored upload");
    Ok(StatusCode::OK)
}

/// Local stand-in for the presigned preview GET.
async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, ApiError> {
    let data = state
        .store
        .get(&upload_key(&key))
        .await
        .map_err(store_error)?;
    let meta = match state
        .store
        .get_opt(&upload_meta_key(&key))
        .await
        .map_err(store_error)?
    {
        Some(raw) => match serde_json::from_slice::<StoredUpload>(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                warn!(key = %key, "unreadable upload metadata: {e}");
                None
            }
        },
        None => None,
    };

    let mut builder = Response::builder().status(StatusCode::OK);
    match meta {
        Some(meta) => {
            builder = builder
                .header(header::CONTENT_TYPE, meta.content_type)
                .header(header::CONTENT_DISPOSITION, content_disposition(&meta.name));
        }
        None => {
            builder = builder.header(header::CONTENT_TYPE, DEFAULT_MIME_TYPE);
        }
    }
    builder
        .body(Body::from(data))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
