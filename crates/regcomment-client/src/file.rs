use std::path::Path;

use bytes::Bytes;
use regcomment_core::FileSpec;

use crate::ClientError;

/// A file the user picked, held in memory until its upload settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, mime_type: Option<&str>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.map(String::from),
            data: data.into(),
        }
    }

    /// Read `path`, guessing the MIME type from its extension.
    pub async fn from_path(path: &Path) -> Result<Self, ClientError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::InvalidInput(format!("not a file: {}", path.display())))?
            .to_string();
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::InvalidInput(format!("read {}: {e}", path.display())))?;
        let mime_type = mime_type_for_name(&name);
        Ok(Self {
            name,
            mime_type: mime_type.map(String::from),
            data: Bytes::from(data),
        })
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn spec(&self) -> FileSpec {
        FileSpec::new(&self.name, self.size(), self.mime_type.as_deref())
    }
}

/// MIME type for the extensions commenters commonly attach; `None` otherwise.
pub fn mime_type_for_name(name: &str) -> Option<&'static str> {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())?
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "xml" => "application/xml",
        "rtf" => "application/rtf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "jpg" | "jpeg" => "image/jpeg",
        "tif" | "tiff" => "image/tiff",
        _ => return None,
    };
    Some(mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(mime_type_for_name("notice.pdf"), Some("application/pdf"));
        assert_eq!(mime_type_for_name("SCAN.JPEG"), Some("image/jpeg"));
        assert_eq!(mime_type_for_name("archive.tar.gz"), None);
        assert_eq!(mime_type_for_name("README"), None);
    }

    #[test]
    fn spec_reflects_contents() {
        let file = LocalFile::new("notice.pdf", Some("application/pdf"), vec![0u8; 2000]);
        let spec = file.spec();
        assert_eq!(spec.name, "notice.pdf");
        assert_eq!(spec.size, 2000);
        assert_eq!(spec.content_type(), "application/pdf");
    }

    #[tokio::test]
    async fn from_path_reads_name_bytes_and_type() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("letter.txt");
        tokio::fs::write(&path, b"dear agency").await.unwrap();

        let file = LocalFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "letter.txt");
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.data.as_ref(), b"dear agency");
    }

    #[tokio::test]
    async fn from_path_missing_file_is_invalid_input() {
        let tmp = tempfile::tempdir().unwrap();
        let err = LocalFile::from_path(&tmp.path().join("nope.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidInput(_)));
    }
}
