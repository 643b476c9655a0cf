use regcomment_core::SectionTarget;
use tokio::sync::mpsc;

/// The user moved the comment box to another section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetChange {
    pub target: SectionTarget,
    /// Rendered text of the section being commented on, if the caller has it.
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommentEvent {
    TargetChanged(TargetChange),
    AttachmentRemoved { key: String },
}

/// Queue of events for the comment presenter, owned by whoever drives it.
pub struct CommentEvents {
    tx: mpsc::UnboundedSender<CommentEvent>,
    rx: mpsc::UnboundedReceiver<CommentEvent>,
}

impl Default for CommentEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl CommentEvents {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    pub fn publisher(&self) -> EventPublisher {
        EventPublisher {
            tx: self.tx.clone(),
        }
    }

    /// Next queued event, without waiting.
    pub fn try_next(&mut self) -> Option<CommentEvent> {
        self.rx.try_recv().ok()
    }

    pub async fn next(&mut self) -> Option<CommentEvent> {
        self.rx.recv().await
    }
}

/// Cloneable sending side handed to child presenters.
#[derive(Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<CommentEvent>,
}

impl EventPublisher {
    pub fn target_changed(&self, target: SectionTarget, context: Option<String>) {
        self.publish(CommentEvent::TargetChanged(TargetChange { target, context }));
    }

    pub fn attachment_removed(&self, key: &str) {
        self.publish(CommentEvent::AttachmentRemoved { key: key.to_string() });
    }

    fn publish(&self, event: CommentEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("comment event dropped; no receiver");
        }
    }
}
