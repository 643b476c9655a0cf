use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use bytes::Bytes;
use regcomment_core::paths::{SUBMISSIONS_PATH, SUBMIT_PATH};
use regcomment_core::submission::Submission;
use regcomment_store::submission_key;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{api_error, core_error, store_error, ApiError, AppState};
use crate::keys::generate_key;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(&format!("/{SUBMIT_PATH}"), post(submit_comment))
        .route(&format!("/{SUBMISSIONS_PATH}/{{key}}"), get(get_submission))
}

/// Accept a finished comment and record it for delivery.
async fn submit_comment(
    State(state): State<AppState>,
    Json(submission): Json<Submission>,
) -> Result<Json<Value>, ApiError> {
    if let Err(e) = submission.check_attachment_count(&state.policy) {
        warn!(files = submission.files().len(), "rejected submission: {e}");
        return Err(core_error(StatusCode::FORBIDDEN, e));
    }

    let key = generate_key();
    let body = serde_json::to_vec(&submission)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    state
        .store
        .put(&submission_key(&key), Bytes::from(body))
        .await
        .map_err(store_error)?;

    info!(
        key = %key,
        sections = submission.sections.len(),
        files = submission.files().len(),
        "comment submitted"
    );
    Ok(Json(json!({
        "status": "submitted",
        "metadata_url": format!("{}{SUBMISSIONS_PATH}/{key}", state.base_url),
    })))
}

async fn get_submission(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let data = state
        .store
        .get(&submission_key(&key))
        .await
        .map_err(store_error)?;
    serde_json::from_slice(&data)
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
