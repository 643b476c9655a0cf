use std::sync::Arc;

use bytes::Bytes;
use regcomment_core::{AttachmentDescriptor, Comment, SectionTarget, UpdateComment};
use regcomment_store::{comment_key, comment_prefix, ObjectStore, StoreError};
use tracing::debug;

use crate::ClientError;

/// A comment bound to its persistence key.
///
/// The key depends only on the document and section ids, so loading the same
/// section twice yields the same record.
pub struct CommentModel {
    comment: Comment,
    store: Arc<dyn ObjectStore>,
    persisted: bool,
    dirty: bool,
}

impl CommentModel {
    pub fn new(store: Arc<dyn ObjectStore>, doc_id: &str, target: &SectionTarget) -> Self {
        Self {
            comment: Comment::blank(target, doc_id),
            store,
            persisted: false,
            dirty: false,
        }
    }

    /// The saved comment for `section_id`, if any.
    pub async fn load(
        store: Arc<dyn ObjectStore>,
        doc_id: &str,
        section_id: &str,
    ) -> Result<Option<Self>, ClientError> {
        let key = comment_key(doc_id, section_id);
        let Some(data) = store.get_opt(&key).await? else {
            return Ok(None);
        };
        let comment: Comment = serde_json::from_slice(&data)
            .map_err(|e| ClientError::InvalidResponse(format!("corrupt comment {key}: {e}")))?;
        Ok(Some(Self {
            comment,
            store,
            persisted: true,
            dirty: false,
        }))
    }

    /// Load the saved comment for `target` or start a blank one.
    pub async fn resolve(
        store: Arc<dyn ObjectStore>,
        doc_id: &str,
        target: &SectionTarget,
    ) -> Result<Self, ClientError> {
        match Self::load(store.clone(), doc_id, &target.section).await? {
            Some(model) => Ok(model),
            None => Ok(Self::new(store, doc_id, target)),
        }
    }

    /// Every saved comment for a document, ordered by section id.
    pub async fn list(
        store: &Arc<dyn ObjectStore>,
        doc_id: &str,
    ) -> Result<Vec<Comment>, ClientError> {
        let mut comments = Vec::new();
        for key in store.list(&comment_prefix(doc_id)).await? {
            if !key.ends_with(".json") {
                continue;
            }
            let data = match store.get(&key).await {
                Ok(data) => data,
                Err(StoreError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            };
            match serde_json::from_slice::<Comment>(&data) {
                Ok(comment) => comments.push(comment),
                Err(e) => tracing::warn!(key = %key, "skipping unreadable comment: {e}"),
            }
        }
        comments.sort_by(|a, b| a.section_id.cmp(&b.section_id));
        Ok(comments)
    }

    pub fn get(&self) -> &Comment {
        &self.comment
    }

    pub fn body(&self) -> &str {
        &self.comment.body
    }

    pub fn attachments(&self) -> &[AttachmentDescriptor] {
        &self.comment.attachments
    }

    pub fn target(&self) -> SectionTarget {
        self.comment.target()
    }

    pub fn key(&self) -> String {
        comment_key(&self.comment.doc_id, &self.comment.section_id)
    }

    pub fn is_persisted(&self) -> bool {
        self.persisted
    }

    /// Apply `update` in memory. Returns whether anything changed.
    pub fn set(&mut self, update: UpdateComment) -> bool {
        let changed = self.comment.apply(update);
        self.dirty |= changed;
        changed
    }

    /// Write the comment under its key. A no-op when nothing changed since
    /// the last save.
    pub async fn save(&mut self) -> Result<(), ClientError> {
        if self.persisted && !self.dirty {
            debug!(key = %self.key(), "comment unchanged; skipping write");
            return Ok(());
        }
        let data = serde_json::to_vec_pretty(&self.comment)
            .map_err(|e| ClientError::InvalidInput(format!("encode comment: {e}")))?;
        self.store.put(&self.key(), Bytes::from(data)).await?;
        self.persisted = true;
        self.dirty = false;
        debug!(key = %self.key(), "saved comment");
        Ok(())
    }

    /// Remove the stored record. The in-memory copy is left untouched.
    pub async fn destroy(&mut self) -> Result<(), ClientError> {
        self.store.delete(&self.key()).await?;
        self.persisted = false;
        debug!(key = %self.key(), "destroyed comment");
        Ok(())
    }
}
