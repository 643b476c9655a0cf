pub mod attachments;
pub mod health;
pub mod submissions;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use regcomment_core::{AttachmentPolicy, CoreError};
use regcomment_store::{ObjectStore, StoreError, UrlSigner};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::signer::UploadBindings;

pub struct InnerAppState {
    pub policy: AttachmentPolicy,
    pub signer: Arc<dyn UrlSigner>,
    pub store: Arc<dyn ObjectStore>,
    /// Slots issued by the local signer; empty when presigning against S3.
    pub bindings: Arc<UploadBindings>,
    /// Public origin plus prefix, e.g. `http://127.0.0.1:8000/`.
    pub base_url: String,
}

pub type AppState = Arc<InnerAppState>;

pub type ApiError = (StatusCode, Json<Value>);

/// Mount every route under `prefix` (already normalized, e.g. `/` or `/eregs/`).
pub fn build_router(state: AppState, prefix: &str) -> Router {
    let comments = Router::new()
        .merge(attachments::routes(state.policy.max_size))
        .merge(submissions::routes());

    let app = Router::new().merge(health::routes());
    let app = match prefix.trim_end_matches('/') {
        "" => app.merge(comments),
        nested => app.nest(nested, comments),
    };

    app.layer(CorsLayer::permissive()).with_state(state)
}

pub(crate) fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "message": message.into() })))
}

pub(crate) fn core_error(status: StatusCode, e: CoreError) -> ApiError {
    let msg = match e {
        CoreError::InvalidInput(m) | CoreError::NotFound(m) => m,
    };
    api_error(status, msg)
}

pub(crate) fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::NotFound(key) => api_error(StatusCode::NOT_FOUND, format!("not found: {key}")),
        StoreError::Internal(msg) => {
            tracing::error!("store failure: {msg}");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "storage error")
        }
    }
}
