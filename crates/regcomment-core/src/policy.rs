use std::collections::BTreeSet;
use std::path::Path;

use crate::error::CoreError;

pub const DEFAULT_MAX_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_ATTACHMENT_COUNT: usize = 10;
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "bmp", "doc", "docx", "gif", "jpeg", "jpg", "pdf", "png", "ppt", "pptx", "rtf", "sgml",
    "tif", "tiff", "txt", "wpd", "xls", "xlsx", "xml",
];

/// Server-side limits on what may be attached to a comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_size: u64,
    /// Lowercase extensions without the leading dot.
    pub valid_extensions: BTreeSet<String>,
    /// Upper bound on documents per submission, including the comment body.
    pub max_attachment_count: usize,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            valid_extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_attachment_count: DEFAULT_MAX_ATTACHMENT_COUNT,
        }
    }
}

impl AttachmentPolicy {
    /// Parse a comma-separated extension list such as `"pdf, .TXT,doc"`.
    pub fn parse_extensions(list: &str) -> BTreeSet<String> {
        list.split(',')
            .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// Check a candidate upload before a slot is issued for it.
    pub fn validate(&self, file_name: &str, size: u64) -> Result<(), CoreError> {
        if size == 0 || size > self.max_size {
            return Err(CoreError::InvalidInput("Invalid attachment size".into()));
        }
        let ext = extension_of(file_name).unwrap_or_default();
        if !self.valid_extensions.contains(&ext) {
            return Err(CoreError::InvalidInput("Invalid attachment type".into()));
        }
        Ok(())
    }

    /// The comment body is submitted as a document of its own, so one slot of
    /// `max_attachment_count` is always taken.
    pub fn max_files_per_submission(&self) -> usize {
        self.max_attachment_count.saturating_sub(1)
    }
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}
