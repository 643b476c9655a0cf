//! URL paths shared by the server routes and the HTTP client.

pub const ATTACHMENT_PATH: &str = "comments/attachment";
pub const SUBMIT_PATH: &str = "comments/submit";
pub const SUBMISSIONS_PATH: &str = "comments/submissions";
pub const UPLOADS_PATH: &str = "uploads";

/// Normalize an application prefix to `/`, or `/a/b/`.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}
