use regcomment_core::attachment::format_size;
use regcomment_core::AttachmentDescriptor;
use serde::Serialize;

use crate::events::EventPublisher;
use crate::file::LocalFile;
use crate::uploader::{TransferHandle, TransferState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AttachmentStatus {
    Uploaded,
    Uploading { sent: u64, total: u64 },
    Failed { reason: String },
    Cancelled,
}

impl AttachmentStatus {
    pub fn label(&self) -> String {
        match self {
            Self::Uploaded => "uploaded".into(),
            Self::Uploading { sent, total } => match sent.saturating_mul(100).checked_div(*total) {
                Some(percent) => format!("uploading {percent}%"),
                None => "uploading".into(),
            },
            Self::Failed { reason } => format!("failed: {reason}"),
            Self::Cancelled => "cancelled".into(),
        }
    }
}

/// Everything needed to draw one attachment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentRow {
    pub key: String,
    pub name: String,
    pub size: String,
    pub preview_url: Option<String>,
    pub status: AttachmentStatus,
    pub retryable: bool,
}

/// One attachment line of the comment box.
pub struct AttachmentPresenter {
    descriptor: AttachmentDescriptor,
    transfer: Option<TransferHandle>,
    /// Kept until the upload completes so a failed one can be retried.
    source: Option<LocalFile>,
    /// Set when no upload slot could be obtained.
    slot_error: Option<String>,
    publisher: EventPublisher,
    removed: bool,
}

impl AttachmentPresenter {
    /// An attachment already saved with the comment.
    pub fn persisted(descriptor: AttachmentDescriptor, publisher: EventPublisher) -> Self {
        Self {
            descriptor,
            transfer: None,
            source: None,
            slot_error: None,
            publisher,
            removed: false,
        }
    }

    pub fn uploading(
        descriptor: AttachmentDescriptor,
        transfer: TransferHandle,
        source: LocalFile,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            descriptor,
            transfer: Some(transfer),
            source: Some(source),
            slot_error: None,
            publisher,
            removed: false,
        }
    }

    /// A file the server refused a slot for. It gets a local-only key so it
    /// can still be removed or retried.
    pub fn failed(source: LocalFile, reason: String, publisher: EventPublisher) -> Self {
        let descriptor = AttachmentDescriptor {
            key: format!("local-{}", uuid::Uuid::new_v4()),
            name: source.name.clone(),
            size: source.size(),
            preview_url: String::new(),
        };
        Self {
            descriptor,
            transfer: None,
            source: Some(source),
            slot_error: Some(reason),
            publisher,
            removed: false,
        }
    }

    pub fn key(&self) -> &str {
        &self.descriptor.key
    }

    pub fn descriptor(&self) -> &AttachmentDescriptor {
        &self.descriptor
    }

    pub fn source(&self) -> Option<&LocalFile> {
        self.source.as_ref()
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn status(&self) -> AttachmentStatus {
        if let Some(reason) = &self.slot_error {
            return AttachmentStatus::Failed {
                reason: reason.clone(),
            };
        }
        let Some(transfer) = &self.transfer else {
            return AttachmentStatus::Uploaded;
        };
        match transfer.state() {
            TransferState::Pending => AttachmentStatus::Uploading {
                sent: 0,
                total: self.descriptor.size,
            },
            TransferState::InProgress { sent, total } => AttachmentStatus::Uploading { sent, total },
            TransferState::Completed => AttachmentStatus::Uploaded,
            TransferState::Failed(reason) => AttachmentStatus::Failed { reason },
            TransferState::Cancelled => AttachmentStatus::Cancelled,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(
            self.status(),
            AttachmentStatus::Failed { .. } | AttachmentStatus::Cancelled
        )
    }

    /// The descriptor to save with the comment. In-flight uploads are
    /// included; failed and cancelled ones are not.
    pub fn snapshot(&self) -> Option<AttachmentDescriptor> {
        if self.removed || self.is_failed() {
            return None;
        }
        Some(self.descriptor.clone())
    }

    pub fn render(&self) -> AttachmentRow {
        let status = self.status();
        let failed = matches!(
            status,
            AttachmentStatus::Failed { .. } | AttachmentStatus::Cancelled
        );
        AttachmentRow {
            key: self.descriptor.key.clone(),
            name: self.descriptor.name.clone(),
            size: format_size(self.descriptor.size),
            preview_url: (!failed && !self.descriptor.preview_url.is_empty())
                .then(|| self.descriptor.preview_url.clone()),
            retryable: failed && self.source.is_some(),
            status,
        }
    }

    /// Wait for the transfer, if any, to settle.
    pub async fn settle(&mut self) -> AttachmentStatus {
        if let Some(transfer) = &self.transfer {
            if transfer.wait().await == TransferState::Completed {
                self.source = None;
            }
        }
        self.status()
    }

    /// Cancel any upload and ask the owning presenter to drop this line.
    pub fn remove(&mut self) {
        if self.removed {
            return;
        }
        self.cancel();
        self.removed = true;
        self.publisher.attachment_removed(&self.descriptor.key);
    }

    pub(crate) fn cancel(&self) {
        if let Some(transfer) = &self.transfer {
            transfer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::events::{CommentEvent, CommentEvents};

    use super::*;

    fn descriptor(key: &str) -> AttachmentDescriptor {
        AttachmentDescriptor {
            key: key.into(),
            name: "notice.pdf".into(),
            size: 2000,
            preview_url: format!("http://s/{key}"),
        }
    }

    #[test]
    fn persisted_renders_as_uploaded() {
        let events = CommentEvents::new();
        let view = AttachmentPresenter::persisted(descriptor("k1"), events.publisher());
        let row = view.render();
        assert_eq!(row.status, AttachmentStatus::Uploaded);
        assert_eq!(row.size, "2.0 KB");
        assert_eq!(row.preview_url.as_deref(), Some("http://s/k1"));
        assert!(!row.retryable);
        assert_eq!(view.snapshot(), Some(descriptor("k1")));
    }

    #[test]
    fn progress_renders_percentage() {
        let status = AttachmentStatus::Uploading {
            sent: 500,
            total: 2000,
        };
        assert_eq!(status.label(), "uploading 25%");
        let unknown = AttachmentStatus::Uploading { sent: 0, total: 0 };
        assert_eq!(unknown.label(), "uploading");
    }

    #[test]
    fn in_flight_upload_is_part_of_snapshot() {
        let events = CommentEvents::new();
        let file = LocalFile::new("notice.pdf", None, vec![0u8; 2000]);
        let view = AttachmentPresenter::uploading(
            descriptor("k1"),
            TransferHandle::settled(TransferState::InProgress {
                sent: 1000,
                total: 2000,
            }),
            file,
            events.publisher(),
        );
        assert_eq!(view.render().status.label(), "uploading 50%");
        assert_eq!(view.snapshot(), Some(descriptor("k1")));
    }

    #[test]
    fn failed_upload_is_excluded_and_retryable() {
        let events = CommentEvents::new();
        let file = LocalFile::new("notice.pdf", None, vec![0u8; 2000]);
        let view = AttachmentPresenter::uploading(
            descriptor("k1"),
            TransferHandle::settled(TransferState::Failed("storage rejected upload".into())),
            file,
            events.publisher(),
        );
        let row = view.render();
        assert!(matches!(row.status, AttachmentStatus::Failed { .. }));
        assert!(row.retryable);
        assert_eq!(row.preview_url, None);
        assert_eq!(view.snapshot(), None);
    }

    #[test]
    fn slot_failure_gets_local_key() {
        let events = CommentEvents::new();
        let file = LocalFile::new("run.exe", None, "x");
        let view =
            AttachmentPresenter::failed(file, "Invalid attachment type".into(), events.publisher());
        assert!(view.key().starts_with("local-"));
        assert_eq!(
            view.status(),
            AttachmentStatus::Failed {
                reason: "Invalid attachment type".into()
            }
        );
        assert_eq!(view.snapshot(), None);
    }

    #[tokio::test]
    async fn remove_publishes_once_and_cancels() {
        let mut events = CommentEvents::new();
        let file = LocalFile::new("notice.pdf", None, vec![0u8; 2000]);
        let mut view = AttachmentPresenter::uploading(
            descriptor("k1"),
            TransferHandle::settled(TransferState::Pending),
            file,
            events.publisher(),
        );
        view.remove();
        view.remove();

        assert!(view.is_removed());
        assert_eq!(view.status(), AttachmentStatus::Cancelled);
        assert_eq!(
            events.try_next(),
            Some(CommentEvent::AttachmentRemoved { key: "k1".into() })
        );
        assert_eq!(events.try_next(), None);
    }

    #[tokio::test]
    async fn settle_drops_source_after_success() {
        let events = CommentEvents::new();
        let file = LocalFile::new("notice.pdf", None, vec![0u8; 2000]);
        let mut view = AttachmentPresenter::uploading(
            descriptor("k1"),
            TransferHandle::settled(TransferState::Completed),
            file,
            events.publisher(),
        );
        assert_eq!(view.settle().await, AttachmentStatus::Uploaded);
        assert!(view.source().is_none());
    }
}
