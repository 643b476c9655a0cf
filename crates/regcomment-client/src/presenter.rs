use std::collections::HashSet;
use std::sync::Arc;

use regcomment_core::{AttachmentDescriptor, SectionTarget, UpdateComment};
use regcomment_store::ObjectStore;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::attachment::{AttachmentPresenter, AttachmentRow, AttachmentStatus};
use crate::events::{CommentEvent, CommentEvents, EventPublisher, TargetChange};
use crate::file::LocalFile;
use crate::model::CommentModel;
use crate::requester::{HttpSlotRequester, SlotRequester};
use crate::uploader::{HttpUploader, Uploader};
use crate::ClientError;

pub const SAVED_MESSAGE: &str = "Your comment was saved.";
pub const SAVE_FAILED_MESSAGE: &str = "Your comment could not be saved.";

/// The collaborators a presenter talks to.
#[derive(Clone)]
pub struct CommentServices {
    pub store: Arc<dyn ObjectStore>,
    pub requester: Arc<dyn SlotRequester>,
    pub uploader: Arc<dyn Uploader>,
}

impl CommentServices {
    /// Slots and uploads over HTTP against the server at `base_url`.
    pub fn http(base_url: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            requester: Arc::new(HttpSlotRequester::new(base_url)),
            uploader: Arc::new(HttpUploader::default()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PresenterState {
    /// Showing what is saved.
    Bound,
    /// Holding edits that are not saved yet.
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentView {
    pub section: String,
    pub toc_id: String,
    pub label: String,
    pub context: Option<String>,
    pub body: String,
    pub attachments: Vec<AttachmentRow>,
    pub status: Option<String>,
    pub highlighted: bool,
    pub state: PresenterState,
}

/// Drives the comment box for one section at a time.
pub struct CommentPresenter {
    doc_id: String,
    services: CommentServices,
    publisher: EventPublisher,
    model: CommentModel,
    body: String,
    attachments: Vec<AttachmentPresenter>,
    context: Option<String>,
    status: Option<String>,
    highlighted: bool,
    state: PresenterState,
    /// Saved keys whose upload was cancelled by a removal.
    abandoned: HashSet<String>,
}

impl CommentPresenter {
    /// Bind to `target`, loading its saved comment if there is one.
    pub async fn open(
        doc_id: &str,
        target: &SectionTarget,
        services: CommentServices,
        publisher: EventPublisher,
    ) -> Result<Self, ClientError> {
        let model = CommentModel::resolve(services.store.clone(), doc_id, target).await?;
        let mut presenter = Self {
            doc_id: doc_id.to_string(),
            services,
            publisher,
            model,
            body: String::new(),
            attachments: Vec::new(),
            context: None,
            status: None,
            highlighted: false,
            state: PresenterState::Bound,
            abandoned: HashSet::new(),
        };
        presenter.render();
        Ok(presenter)
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn state(&self) -> PresenterState {
        self.state
    }

    pub fn model(&self) -> &CommentModel {
        &self.model
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[AttachmentPresenter] {
        &self.attachments
    }

    pub fn attachment_mut(&mut self, key: &str) -> Option<&mut AttachmentPresenter> {
        self.attachments.iter_mut().find(|a| a.key() == key)
    }

    /// Release the current comment and bind to the one for `target`.
    ///
    /// Unsaved edits are discarded. Uploads the new comment does not list are
    /// cancelled, and the released comment stops listing any upload that did
    /// not finish.
    pub async fn set_section(&mut self, target: &SectionTarget) -> Result<(), ClientError> {
        let mut model =
            CommentModel::resolve(self.services.store.clone(), &self.doc_id, target).await?;
        debug!(
            from = %self.model.get().section_id,
            to = %target.section,
            "rebinding comment"
        );
        for child in &self.attachments {
            if !model.attachments().iter().any(|d| d.key == child.key()) {
                child.cancel();
            }
        }
        if self.forget_unfinished().await? && model.key() == self.model.key() {
            model =
                CommentModel::resolve(self.services.store.clone(), &self.doc_id, target).await?;
        }
        self.model = model;
        self.render();
        Ok(())
    }

    pub async fn target(&mut self, change: TargetChange) -> Result<(), ClientError> {
        self.set_section(&change.target).await?;
        self.context = change.context;
        Ok(())
    }

    /// Reset the view from the bound comment's saved state.
    ///
    /// Lines whose key the comment still lists keep their transfer; the rest
    /// are cancelled and dropped.
    pub fn render(&mut self) {
        self.body = self.model.body().to_string();
        let mut previous = std::mem::take(&mut self.attachments);
        let mut attachments = Vec::with_capacity(self.model.attachments().len());
        for descriptor in self.model.attachments() {
            match previous
                .iter()
                .position(|c| c.key() == descriptor.key && !c.is_removed())
            {
                Some(index) => attachments.push(previous.remove(index)),
                None => attachments.push(AttachmentPresenter::persisted(
                    descriptor.clone(),
                    self.publisher.clone(),
                )),
            }
        }
        for child in &previous {
            child.cancel();
        }
        self.attachments = attachments;
        self.abandoned.clear();
        self.status = None;
        self.highlighted = false;
        self.state = PresenterState::Bound;
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.edit();
    }

    /// Request a slot for each file and start its upload.
    pub async fn add_attachments(&mut self, files: Vec<LocalFile>) -> Vec<String> {
        self.unhighlight();
        let mut keys = Vec::with_capacity(files.len());
        for file in files {
            keys.push(self.add_attachment(file).await);
        }
        keys
    }

    /// Returns the key of the new attachment line.
    pub async fn add_attachment(&mut self, file: LocalFile) -> String {
        self.edit();
        let child = self.start_upload(file).await;
        let key = child.key().to_string();
        self.attachments.push(child);
        key
    }

    async fn start_upload(&self, file: LocalFile) -> AttachmentPresenter {
        let spec = file.spec();
        match self.services.requester.request_upload_slot(&spec).await {
            Ok(slot) => {
                let transfer = self.services.uploader.start(slot.put_url(), &file);
                info!(key = %slot.key, name = %spec.name, size = spec.size, "uploading attachment");
                AttachmentPresenter::uploading(
                    slot.descriptor_for(&spec),
                    transfer,
                    file,
                    self.publisher.clone(),
                )
            }
            Err(e) => {
                warn!(name = %spec.name, "no upload slot: {e}");
                let reason = match e {
                    ClientError::Rejected { message, .. } => message,
                    other => other.to_string(),
                };
                AttachmentPresenter::failed(file, reason, self.publisher.clone())
            }
        }
    }

    /// Rows for the lines whose key is in `keys`, in list order.
    pub fn rows_for(&self, keys: &[String]) -> Vec<AttachmentRow> {
        self.attachments
            .iter()
            .filter(|a| !a.is_removed() && keys.iter().any(|k| k == a.key()))
            .map(AttachmentPresenter::render)
            .collect()
    }

    /// Drop the attachment line for `key`, cancelling its upload. Unknown
    /// keys are ignored. Nothing is saved.
    pub fn clear_attachment(&mut self, key: &str) -> bool {
        let Some(index) = self.attachments.iter().position(|a| a.key() == key) else {
            debug!(key, "no attachment to clear");
            return false;
        };
        let child = self.attachments.remove(index);
        child.cancel();
        if child.is_failed() && self.model.attachments().iter().any(|d| d.key == key) {
            self.abandoned.insert(key.to_string());
        }
        self.edit();
        true
    }

    /// Ask the attachment line for `key` to remove itself. The line is dropped
    /// once the resulting event is dispatched.
    pub fn remove_attachment(&mut self, key: &str) -> bool {
        match self.attachment_mut(key) {
            Some(child) => {
                child.remove();
                self.edit();
                true
            }
            None => false,
        }
    }

    /// Start over for a failed attachment, keeping its place in the list.
    pub async fn retry_attachment(&mut self, key: &str) -> Result<String, ClientError> {
        let index = self
            .attachments
            .iter()
            .position(|a| a.key() == key)
            .ok_or_else(|| ClientError::NotFound(format!("attachment {key}")))?;
        let child = &self.attachments[index];
        if !child.is_failed() {
            return Err(ClientError::InvalidInput(format!(
                "attachment {key} has not failed"
            )));
        }
        let file = child
            .source()
            .cloned()
            .ok_or_else(|| ClientError::InvalidInput(format!("attachment {key} has no source")))?;

        self.edit();
        let replacement = self.start_upload(file).await;
        let new_key = replacement.key().to_string();
        self.attachments[index] = replacement;
        Ok(new_key)
    }

    /// Store the body and every attachment that has not failed.
    pub async fn save(&mut self) -> Result<(), ClientError> {
        let attachments = self
            .attachments
            .iter()
            .filter_map(AttachmentPresenter::snapshot)
            .collect::<Vec<_>>();
        let files = attachments.len();
        self.model.set(UpdateComment {
            body: Some(self.body.clone()),
            attachments: Some(attachments),
            ..Default::default()
        });

        match self.model.save().await {
            Ok(()) => {
                info!(key = %self.model.key(), files, "comment saved");
                self.abandoned.clear();
                self.state = PresenterState::Bound;
                self.status = Some(SAVED_MESSAGE.to_string());
                Ok(())
            }
            Err(e) => {
                error!(key = %self.model.key(), "comment save failed: {e}");
                self.status = Some(SAVE_FAILED_MESSAGE.to_string());
                Err(e)
            }
        }
    }

    /// Delete the saved comment and start again from a blank one.
    pub async fn clear(&mut self) -> Result<(), ClientError> {
        for child in &self.attachments {
            child.cancel();
        }
        self.model.destroy().await?;
        let target = self.model.target();
        self.model = CommentModel::new(self.services.store.clone(), &self.doc_id, &target);
        self.render();
        info!(section = %target.section, "comment cleared");
        Ok(())
    }

    /// Wait for every running upload to settle. Saved attachments whose
    /// upload failed are then dropped from the stored comment.
    pub async fn settle(&mut self) -> Vec<AttachmentStatus> {
        let mut statuses = Vec::with_capacity(self.attachments.len());
        for child in &mut self.attachments {
            statuses.push(child.settle().await);
        }
        if let Err(e) = self.forget_unfinished().await {
            error!(key = %self.model.key(), "could not drop failed uploads: {e}");
            self.status = Some(SAVE_FAILED_MESSAGE.to_string());
        }
        statuses
    }

    /// Store the bound comment without any descriptor whose upload failed or
    /// was cancelled. Returns whether anything was dropped.
    async fn forget_unfinished(&mut self) -> Result<bool, ClientError> {
        let mut dead = std::mem::take(&mut self.abandoned);
        dead.extend(
            self.attachments
                .iter()
                .filter(|a| a.is_failed())
                .map(|a| a.key().to_string()),
        );
        let saved = self.model.attachments();
        let kept: Vec<AttachmentDescriptor> = saved
            .iter()
            .filter(|d| !dead.contains(&d.key))
            .cloned()
            .collect();
        let dropped = saved.len() - kept.len();
        if dropped == 0 {
            return Ok(false);
        }

        self.model.set(UpdateComment {
            attachments: Some(kept),
            ..Default::default()
        });
        self.model.save().await?;
        warn!(key = %self.model.key(), dropped, "dropped unfinished uploads from saved comment");
        Ok(true)
    }

    pub fn highlight(&mut self) {
        self.highlighted = true;
    }

    pub fn unhighlight(&mut self) {
        self.highlighted = false;
    }

    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    pub async fn handle_event(&mut self, event: CommentEvent) -> Result<(), ClientError> {
        match event {
            CommentEvent::TargetChanged(change) => self.target(change).await,
            CommentEvent::AttachmentRemoved { key } => {
                self.clear_attachment(&key);
                Ok(())
            }
        }
    }

    /// Handle every event queued so far.
    pub async fn dispatch(&mut self, events: &mut CommentEvents) -> Result<(), ClientError> {
        while let Some(event) = events.try_next() {
            self.handle_event(event).await?;
        }
        Ok(())
    }

    pub fn view(&self) -> CommentView {
        let comment = self.model.get();
        CommentView {
            section: comment.section_id.clone(),
            toc_id: comment.toc_id.clone(),
            label: comment.label.clone(),
            context: self.context.clone(),
            body: self.body.clone(),
            attachments: self
                .attachments
                .iter()
                .filter(|a| !a.is_removed())
                .map(AttachmentPresenter::render)
                .collect(),
            status: self.status.clone(),
            highlighted: self.highlighted,
            state: self.state,
        }
    }

    fn edit(&mut self) {
        self.state = PresenterState::Editing;
        self.status = None;
    }
}
