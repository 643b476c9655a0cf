use regcomment_core::paths::SUBMIT_PATH;
use regcomment_core::submission::Submission;
use reqwest::Client;
use serde::Deserialize;
use tracing::info;

use crate::requester::handle_response;
use crate::ClientError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitReceipt {
    pub status: String,
    pub metadata_url: String,
}

/// Send the finished comments to the server for delivery.
pub async fn submit(
    client: &Client,
    base_url: &str,
    submission: &Submission,
) -> Result<SubmitReceipt, ClientError> {
    let url = format!("{}/{SUBMIT_PATH}", base_url.trim_end_matches('/'));
    let resp = client
        .post(url)
        .json(submission)
        .send()
        .await
        .map_err(|e| ClientError::Transport(format!("submit failed: {e}")))?;
    let receipt: SubmitReceipt = handle_response(resp).await?;
    info!(
        sections = submission.sections.len(),
        metadata_url = %receipt.metadata_url,
        "comment submitted"
    );
    Ok(receipt)
}
