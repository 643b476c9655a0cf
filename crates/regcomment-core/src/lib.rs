pub mod attachment;
pub mod comment;
pub mod error;
pub mod paths;
pub mod policy;
pub mod submission;

pub use attachment::{AttachmentDescriptor, FileSpec, UploadSlot};
pub use comment::{Comment, SectionTarget, UpdateComment};
pub use error::CoreError;
pub use policy::AttachmentPolicy;
