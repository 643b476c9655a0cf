use serde::{Deserialize, Serialize};

/// MIME type used when a file does not declare one.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Metadata header the storage backend binds to the presigned PUT.
pub const NAME_METADATA_HEADER: &str = "x-amz-meta-name";

/// Header form of a file name. Header values must be visible ASCII, so the
/// name travels percent-encoded in [`NAME_METADATA_HEADER`].
pub fn encode_name_metadata(name: &str) -> String {
    percent_encode(name)
}

/// Inverse of [`encode_name_metadata`].
pub fn decode_name_metadata(value: &str) -> String {
    url::form_urlencoded::parse(value.as_bytes())
        .next()
        .map(|(name, _)| name.into_owned())
        .unwrap_or_default()
}

/// `Content-Disposition` value that downloads the object as `name`.
///
/// Carries an ASCII `filename` for old clients and the exact name as
/// RFC 5987 `filename*`.
pub fn content_disposition(name: &str) -> String {
    let fallback: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c == ' ' || c.is_ascii_graphic() => c,
            _ => '_',
        })
        .collect();
    format!(
        "attachment; filename=\"{fallback}\"; filename*=UTF-8''{}",
        percent_encode(name)
    )
}

fn percent_encode(raw: &str) -> String {
    url::form_urlencoded::byte_serialize(raw.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
        .replace('*', "%2A")
}

/// What the client knows about a file before it has an upload slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    pub name: String,
    pub size: u64,
    /// Declared MIME type. Empty or missing means [`DEFAULT_MIME_TYPE`].
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileSpec {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<&str>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type.map(String::from),
        }
    }

    pub fn content_type(&self) -> &str {
        effective_mime_type(self.mime_type.as_deref())
    }
}

pub fn effective_mime_type(mime_type: Option<&str>) -> &str {
    match mime_type {
        Some(m) if !m.trim().is_empty() => m,
        _ => DEFAULT_MIME_TYPE,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotUrls {
    pub put: String,
    pub get: String,
}

/// A granted upload destination, as returned by `GET comments/attachment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadSlot {
    pub urls: SlotUrls,
    pub key: String,
}

impl UploadSlot {
    pub fn put_url(&self) -> &str {
        &self.urls.put
    }

    pub fn get_url(&self) -> &str {
        &self.urls.get
    }

    /// The descriptor recorded for `file` once this slot is granted.
    pub fn descriptor_for(&self, file: &FileSpec) -> AttachmentDescriptor {
        AttachmentDescriptor {
            key: self.key.clone(),
            name: file.name.clone(),
            size: file.size,
            preview_url: self.urls.get.clone(),
        }
    }
}

/// The durable record of one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentDescriptor {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub preview_url: String,
}

/// Human-readable byte count, e.g. `2.0 KB`.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1000 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = "B";
    for u in UNITS {
        if value < 1000.0 {
            break;
        }
        value /= 1000.0;
        unit = u;
    }
    format!("{value:.1} {unit}")
}
