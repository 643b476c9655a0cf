use serde::{Deserialize, Serialize};

use crate::comment::Comment;
use crate::error::CoreError;
use crate::policy::AttachmentPolicy;

/// A file referenced by a submission, already uploaded under `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedFile {
    pub key: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedSection {
    pub id: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub files: Vec<SubmittedFile>,
}

impl From<&Comment> for SubmittedSection {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.section_id.clone(),
            comment: c.body.clone(),
            files: c
                .attachments
                .iter()
                .map(|a| SubmittedFile {
                    key: a.key.clone(),
                    name: a.name.clone(),
                })
                .collect(),
        }
    }
}

/// The body of `POST comments/submit`. Fields other than `sections`
/// (submitter details, document number) are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub sections: Vec<SubmittedSection>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Submission {
    pub fn from_comments<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> Self {
        Self {
            sections: comments.into_iter().map(SubmittedSection::from).collect(),
            extra: serde_json::Map::new(),
        }
    }

    /// All files across all sections, in section order.
    pub fn files(&self) -> Vec<&SubmittedFile> {
        self.sections.iter().flat_map(|s| s.files.iter()).collect()
    }

    pub fn check_attachment_count(&self, policy: &AttachmentPolicy) -> Result<(), CoreError> {
        if self.files().len() > policy.max_files_per_submission() {
            return Err(CoreError::InvalidInput("Too many attachments".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::AttachmentDescriptor;
    use crate::comment::SectionTarget;

    fn comment_with(section: &str, keys: &[&str]) -> Comment {
        let mut c = Comment::blank(&SectionTarget::new(section, "toc", "label"), "doc");
        c.body = format!("about {section}");
        c.attachments = keys
            .iter()
            .map(|k| AttachmentDescriptor {
                key: k.to_string(),
                name: format!("{k}.pdf"),
                size: 1,
                preview_url: String::new(),
            })
            .collect();
        c
    }

    #[test]
    fn files_flatten_across_sections() {
        let a = comment_with("a", &["k1", "k2"]);
        let b = comment_with("b", &["k3"]);
        let s = Submission::from_comments([&a, &b]);
        let keys: Vec<_> = s.files().iter().map(|f| f.key.as_str()).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
        assert_eq!(s.sections[1].comment, "about b");
    }

    #[test]
    fn attachment_count_leaves_room_for_the_body() {
        let policy = AttachmentPolicy {
            max_attachment_count: 3,
            ..Default::default()
        };
        let ok = Submission::from_comments([&comment_with("a", &["k1", "k2"])]);
        assert!(ok.check_attachment_count(&policy).is_ok());

        let too_many = Submission::from_comments([&comment_with("a", &["k1", "k2", "k3"])]);
        let err = too_many.check_attachment_count(&policy).unwrap_err();
        assert!(err.to_string().contains("Too many attachments"));
    }

    #[test]
    fn extra_fields_survive_roundtrip() {
        let s: Submission = serde_json::from_str(
            r#"{"sections": [{"id": "a"}], "assembled_comment": [], "first_name": "Ada"}"#,
        )
        .unwrap();
        assert_eq!(s.sections.len(), 1);
        assert!(s.sections[0].files.is_empty());
        assert_eq!(s.extra["first_name"], "Ada");
        let back = serde_json::to_value(&s).unwrap();
        assert_eq!(back["first_name"], "Ada");
    }

    #[test]
    fn missing_sections_means_no_files() {
        let s: Submission = serde_json::from_str("{}").unwrap();
        assert!(s.files().is_empty());
    }
}
