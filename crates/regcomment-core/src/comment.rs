use serde::{Deserialize, Serialize};

use crate::attachment::AttachmentDescriptor;

/// The section a comment box is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionTarget {
    pub section: String,
    pub toc_id: String,
    pub label: String,
}

impl SectionTarget {
    pub fn new(
        section: impl Into<String>,
        toc_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            toc_id: toc_id.into(),
            label: label.into(),
        }
    }
}

/// One user's draft comment on one regulation section.
///
/// Stored with the same field names the web client used for local storage
/// (`comment` for the markdown body, `files` for the attachments).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    #[serde(rename = "id")]
    pub section_id: String,
    pub toc_id: String,
    pub label: String,
    pub doc_id: String,
    #[serde(rename = "comment", default)]
    pub body: String,
    #[serde(rename = "files", default)]
    pub attachments: Vec<AttachmentDescriptor>,
}

impl Comment {
    /// A blank comment bound to `target` within document `doc_id`.
    pub fn blank(target: &SectionTarget, doc_id: &str) -> Self {
        Self {
            section_id: target.section.clone(),
            toc_id: target.toc_id.clone(),
            label: target.label.clone(),
            doc_id: doc_id.to_string(),
            body: String::new(),
            attachments: Vec::new(),
        }
    }

    pub fn target(&self) -> SectionTarget {
        SectionTarget::new(&self.section_id, &self.toc_id, &self.label)
    }

    pub fn is_blank(&self) -> bool {
        self.body.trim().is_empty() && self.attachments.is_empty()
    }

    /// Apply a partial update. Returns `true` if anything changed.
    pub fn apply(&mut self, update: UpdateComment) -> bool {
        let mut changed = false;
        if let Some(toc_id) = update.toc_id {
            changed |= self.toc_id != toc_id;
            self.toc_id = toc_id;
        }
        if let Some(label) = update.label {
            changed |= self.label != label;
            self.label = label;
        }
        if let Some(body) = update.body {
            changed |= self.body != body;
            self.body = body;
        }
        if let Some(attachments) = update.attachments {
            changed |= self.attachments != attachments;
            self.attachments = attachments;
        }
        changed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateComment {
    pub toc_id: Option<String>,
    pub label: Option<String>,
    pub body: Option<String>,
    pub attachments: Option<Vec<AttachmentDescriptor>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> SectionTarget {
        SectionTarget::new("2024-1-a", "2024-1", "§ 2024.1(a)")
    }

    fn descriptor(key: &str) -> AttachmentDescriptor {
        AttachmentDescriptor {
            key: key.into(),
            name: format!("{key}.pdf"),
            size: 10,
            preview_url: format!("http://s/{key}"),
        }
    }

    #[test]
    fn blank_comment_is_bound_to_target() {
        let c = Comment::blank(&target(), "doc-1");
        assert_eq!(c.section_id, "2024-1-a");
        assert_eq!(c.doc_id, "doc-1");
        assert!(c.is_blank());
        assert_eq!(c.target(), target());
    }

    #[test]
    fn apply_reports_changes_only_when_values_differ() {
        let mut c = Comment::blank(&target(), "doc-1");
        assert!(c.apply(UpdateComment {
            body: Some("hello".into()),
            ..Default::default()
        }));
        assert!(!c.apply(UpdateComment {
            body: Some("hello".into()),
            ..Default::default()
        }));
        assert!(c.apply(UpdateComment {
            attachments: Some(vec![descriptor("k1")]),
            ..Default::default()
        }));
        assert!(!c.apply(UpdateComment::default()));
        assert!(!c.is_blank());
    }

    #[test]
    fn serialized_field_names_match_stored_schema() {
        let mut c = Comment::blank(&target(), "doc-1");
        c.body = "text".into();
        c.attachments.push(descriptor("k1"));
        let v = serde_json::to_value(&c).unwrap();
        assert_eq!(v["id"], "2024-1-a");
        assert_eq!(v["tocId"], "2024-1");
        assert_eq!(v["docId"], "doc-1");
        assert_eq!(v["comment"], "text");
        assert_eq!(v["files"][0]["previewUrl"], "http://s/k1");
    }

    #[test]
    fn missing_body_and_files_default_to_empty() {
        let c: Comment = serde_json::from_str(
            r#"{"id": "s", "tocId": "t", "label": "l", "docId": "d"}"#,
        )
        .unwrap();
        assert!(c.is_blank());
    }
}
