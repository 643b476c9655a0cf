use std::sync::Arc;

use bytes::Bytes;
use regcomment_core::attachment::{encode_name_metadata, NAME_METADATA_HEADER};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::file::LocalFile;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferState {
    Pending,
    InProgress { sent: u64, total: u64 },
    Completed,
    Failed(String),
    Cancelled,
}

impl TransferState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// Owner-side view of one running transfer.
///
/// Dropping the handle does not stop the transfer; call [`cancel`](Self::cancel).
pub struct TransferHandle {
    state: watch::Receiver<TransferState>,
    control: Arc<watch::Sender<TransferState>>,
    task: Option<AbortHandle>,
}

impl TransferHandle {
    fn channel() -> (Self, Arc<watch::Sender<TransferState>>) {
        let (tx, rx) = watch::channel(TransferState::Pending);
        let control = Arc::new(tx);
        (
            Self {
                state: rx,
                control: control.clone(),
                task: None,
            },
            control,
        )
    }

    /// A handle that is already in `state` and has no task behind it.
    pub fn settled(state: TransferState) -> Self {
        let (handle, control) = Self::channel();
        control.send_replace(state);
        handle
    }

    pub fn state(&self) -> TransferState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TransferState> {
        self.state.clone()
    }

    /// Resolve once the transfer reaches a terminal state.
    pub async fn wait(&self) -> TransferState {
        let mut rx = self.state.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_terminal() {
                return current;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Abort the request if it has not settled yet.
    pub fn cancel(&self) {
        if finish(&self.control, TransferState::Cancelled) {
            if let Some(task) = &self.task {
                task.abort();
            }
        }
    }
}

/// Move to a terminal state unless another terminal state won first.
fn finish(control: &watch::Sender<TransferState>, state: TransferState) -> bool {
    control.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = state;
        true
    })
}

/// Sends file bytes straight to a presigned storage URL.
pub trait Uploader: Send + Sync {
    /// Begin the PUT and return immediately.
    fn start(&self, put_url: &str, file: &LocalFile) -> TransferHandle;
}

pub struct HttpUploader {
    client: Client,
    chunk_size: usize,
}

impl Default for HttpUploader {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpUploader {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }
}

impl Uploader for HttpUploader {
    fn start(&self, put_url: &str, file: &LocalFile) -> TransferHandle {
        let (mut handle, control) = TransferHandle::channel();
        let request = PutRequest {
            client: self.client.clone(),
            url: put_url.to_string(),
            content_type: file.spec().content_type().to_string(),
            name: file.name.clone(),
            data: file.data.clone(),
            chunk_size: self.chunk_size,
        };
        let task = tokio::spawn(async move {
            let outcome = request.send(&control).await;
            finish(&control, outcome);
        });
        handle.task = Some(task.abort_handle());
        handle
    }
}

struct PutRequest {
    client: Client,
    url: String,
    content_type: String,
    name: String,
    data: Bytes,
    chunk_size: usize,
}

impl PutRequest {
    async fn send(self, control: &Arc<watch::Sender<TransferState>>) -> TransferState {
        let total = self.data.len() as u64;
        let chunks: Vec<Bytes> = (0..self.data.len())
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(self.data.len());
                self.data.slice(start..end)
            })
            .collect();

        let progress = control.clone();
        let mut sent = 0u64;
        let body = futures::stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len() as u64;
            progress.send_if_modified(|current| {
                if current.is_terminal() {
                    return false;
                }
                *current = TransferState::InProgress { sent, total };
                true
            });
            Ok::<Bytes, std::io::Error>(chunk)
        }));

        debug!(url = %self.url, name = %self.name, total, "starting upload");
        let result = self
            .client
            .put(&self.url)
            .header(CONTENT_TYPE, &self.content_type)
            .header(CONTENT_LENGTH, total)
            .header(NAME_METADATA_HEADER, encode_name_metadata(&self.name))
            .body(Body::wrap_stream(body))
            .send()
            .await;

        match result {
            Ok(resp) if resp.status().is_success() => {
                info!(name = %self.name, total, "upload complete");
                TransferState::Completed
            }
            Ok(resp) => {
                let status = resp.status();
                warn!(name = %self.name, status = status.as_u16(), "storage rejected upload");
                TransferState::Failed(format!("storage rejected upload ({status})"))
            }
            Err(e) => {
                warn!(name = %self.name, "upload failed: {e}");
                TransferState::Failed(format!("upload failed: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::body::Bytes as AxumBytes;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::put;
    use axum::Router;

    use super::*;

    type Seen = Arc<Mutex<Option<(HeaderMap, Vec<u8>)>>>;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn recording_app(seen: Seen, status: StatusCode) -> Router {
        Router::new().route(
            "/bucket/{key}",
            put(move |headers: HeaderMap, body: AxumBytes| {
                let seen = seen.clone();
                async move {
                    *seen.lock().unwrap() = Some((headers, body.to_vec()));
                    status
                }
            }),
        )
    }

    #[tokio::test]
    async fn put_carries_type_name_and_bytes() {
        let seen: Seen = Arc::default();
        let base = serve(recording_app(seen.clone(), StatusCode::OK)).await;
        let file = LocalFile::new("notice.pdf", Some("application/pdf"), vec![9u8; 2000]);

        let uploader = HttpUploader::default().with_chunk_size(512);
        let handle = uploader.start(&format!("{base}/bucket/k1"), &file);
        assert_eq!(handle.wait().await, TransferState::Completed);

        let (headers, body) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(headers["content-type"], "application/pdf");
        assert_eq!(headers["x-amz-meta-name"], "notice.pdf");
        assert_eq!(headers["content-length"], "2000");
        assert_eq!(body, vec![9u8; 2000]);
    }

    #[tokio::test]
    async fn non_ascii_name_is_sent_encoded() {
        let seen: Seen = Arc::default();
        let base = serve(recording_app(seen.clone(), StatusCode::OK)).await;
        let file = LocalFile::new("résumé.pdf", Some("application/pdf"), "pdf");

        let handle = HttpUploader::default().start(&format!("{base}/bucket/k"), &file);
        assert_eq!(handle.wait().await, TransferState::Completed);
        let (headers, _) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(headers["x-amz-meta-name"], "r%C3%A9sum%C3%A9.pdf");
    }

    #[tokio::test]
    async fn untyped_file_is_sent_as_octet_stream() {
        let seen: Seen = Arc::default();
        let base = serve(recording_app(seen.clone(), StatusCode::OK)).await;
        let file = LocalFile::new("blob", None, "abc");

        let handle = HttpUploader::default().start(&format!("{base}/bucket/k"), &file);
        assert_eq!(handle.wait().await, TransferState::Completed);
        let (headers, _) = seen.lock().unwrap().clone().unwrap();
        assert_eq!(headers["content-type"], "application/octet-stream");
    }

    #[tokio::test]
    async fn storage_rejection_fails_the_transfer() {
        let seen: Seen = Arc::default();
        let base = serve(recording_app(seen, StatusCode::FORBIDDEN)).await;
        let file = LocalFile::new("a.pdf", None, "abc");

        let handle = HttpUploader::default().start(&format!("{base}/bucket/k"), &file);
        match handle.wait().await {
            TransferState::Failed(reason) => assert!(reason.contains("403")),
            other => panic!("unexpected state: {other:?}"),
        }
    }

    #[tokio::test]
    async fn progress_never_exceeds_total() {
        let seen: Seen = Arc::default();
        let base = serve(recording_app(seen, StatusCode::OK)).await;
        let file = LocalFile::new("a.pdf", None, vec![1u8; 4096]);

        let handle = HttpUploader::default()
            .with_chunk_size(1024)
            .start(&format!("{base}/bucket/k"), &file);
        let mut rx = handle.subscribe();
        loop {
            let state = rx.borrow_and_update().clone();
            match state {
                TransferState::InProgress { sent, total } => {
                    assert_eq!(total, 4096);
                    assert!(sent <= total);
                }
                TransferState::Completed => break,
                TransferState::Pending => {}
                other => panic!("unexpected state: {other:?}"),
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        assert_eq!(handle.state(), TransferState::Completed);
    }

    #[tokio::test]
    async fn cancel_aborts_a_stalled_transfer() {
        let app = Router::new().route(
            "/bucket/{key}",
            put(|| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                StatusCode::OK
            }),
        );
        let base = serve(app).await;
        let file = LocalFile::new("a.pdf", None, "abc");

        let handle = HttpUploader::default().start(&format!("{base}/bucket/k"), &file);
        handle.cancel();
        assert_eq!(handle.wait().await, TransferState::Cancelled);
    }

    #[tokio::test]
    async fn cancel_after_completion_keeps_completed() {
        let handle = TransferHandle::settled(TransferState::Completed);
        handle.cancel();
        assert_eq!(handle.state(), TransferState::Completed);
    }

    #[tokio::test]
    async fn unreachable_storage_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let file = LocalFile::new("a.pdf", None, "abc");
        let handle = HttpUploader::default().start(&format!("http://{addr}/bucket/k"), &file);
        assert!(matches!(handle.wait().await, TransferState::Failed(_)));
    }
}
