pub mod attachment;
pub mod config;
pub mod error;
pub mod events;
pub mod file;
pub mod model;
pub mod presenter;
pub mod requester;
pub mod submit;
pub mod uploader;

pub use attachment::{AttachmentPresenter, AttachmentRow, AttachmentStatus};
pub use error::ClientError;
pub use events::{CommentEvent, CommentEvents, EventPublisher, TargetChange};
pub use file::LocalFile;
pub use model::CommentModel;
pub use presenter::{CommentPresenter, CommentServices, CommentView, PresenterState};
pub use requester::{HttpSlotRequester, SlotRequester};
pub use uploader::{HttpUploader, TransferHandle, TransferState, Uploader};
