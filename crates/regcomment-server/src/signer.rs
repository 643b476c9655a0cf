use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regcomment_core::paths::UPLOADS_PATH;
use regcomment_store::{StoreError, UrlSigner, UPLOAD_EXPIRATION_SECS};
use tracing::debug;

/// The metadata an upload URL was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBinding {
    pub content_type: String,
    pub name: String,
    pub size: u64,
}

#[derive(Debug)]
struct Slot {
    binding: UploadBinding,
    issued: Instant,
}

/// Bindings for slots issued by [`LocalSigner`], checked by the local upload route.
///
/// A binding lives until its upload succeeds or the slot expires.
#[derive(Debug)]
pub struct UploadBindings {
    slots: Mutex<HashMap<String, Slot>>,
    ttl: Duration,
}

impl Default for UploadBindings {
    fn default() -> Self {
        Self::with_ttl(Duration::from_secs(UPLOAD_EXPIRATION_SECS.into()))
    }
}

impl UploadBindings {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn insert(&self, key: &str, binding: UploadBinding) {
        let mut slots = self.slots.lock().unwrap();
        let before = slots.len();
        slots.retain(|_, slot| slot.issued.elapsed() < self.ttl);
        if slots.len() < before {
            debug!(expired = before - slots.len(), "dropped expired upload slots");
        }
        slots.insert(
            key.to_string(),
            Slot {
                binding,
                issued: Instant::now(),
            },
        );
    }

    /// The live binding for `key`, if its slot has not expired.
    pub fn get(&self, key: &str) -> Option<UploadBinding> {
        self.slots
            .lock()
            .unwrap()
            .get(key)
            .filter(|slot| slot.issued.elapsed() < self.ttl)
            .map(|slot| slot.binding.clone())
    }

    /// Remove the binding for `key`; its slot cannot be used again.
    pub fn take(&self, key: &str) -> Option<UploadBinding> {
        self.slots
            .lock()
            .unwrap()
            .remove(key)
            .filter(|slot| slot.issued.elapsed() < self.ttl)
            .map(|slot| slot.binding)
    }

    /// Number of live bindings.
    pub fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap()
            .values()
            .filter(|slot| slot.issued.elapsed() < self.ttl)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Signs URLs that point back at this server's own `uploads/{key}` routes.
///
/// Used when no bucket is configured. The "signature" is the binding recorded
/// here; the upload route enforces it the way S3 enforces signed headers.
pub struct LocalSigner {
    base_url: String,
    bindings: Arc<UploadBindings>,
}

impl LocalSigner {
    /// `base_url` is the public origin plus the normalized prefix, e.g.
    /// `http://127.0.0.1:8000/eregs/`.
    pub fn new(base_url: &str, bindings: Arc<UploadBindings>) -> Self {
        Self {
            base_url: base_url.to_string(),
            bindings,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}{UPLOADS_PATH}/{key}", self.base_url)
    }
}

#[async_trait]
impl UrlSigner for LocalSigner {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        file_name: &str,
        size: u64,
    ) -> Result<String, StoreError> {
        self.bindings.insert(
            key,
            UploadBinding {
                content_type: content_type.to_string(),
                name: file_name.to_string(),
                size,
            },
        );
        Ok(self.object_url(key))
    }

    async fn presign_get(&self, key: &str, _file_name: &str) -> Result<String, StoreError> {
        Ok(self.object_url(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_records_binding_and_points_at_uploads() {
        let bindings = Arc::new(UploadBindings::default());
        let signer = LocalSigner::new("http://127.0.0.1:9/eregs/", bindings.clone());

        let url = signer
            .presign_put("k1", "application/pdf", "notice.pdf", 2000)
            .await
            .unwrap();
        assert_eq!(url, "http://127.0.0.1:9/eregs/uploads/k1");
        assert_eq!(
            bindings.get("k1"),
            Some(UploadBinding {
                content_type: "application/pdf".into(),
                name: "notice.pdf".into(),
                size: 2000,
            })
        );

        let get = signer.presign_get("k1", "notice.pdf").await.unwrap();
        assert_eq!(get, url);
        assert_eq!(bindings.len(), 1);
    }

    fn binding(name: &str) -> UploadBinding {
        UploadBinding {
            content_type: "text/plain".into(),
            name: name.into(),
            size: 5,
        }
    }

    #[test]
    fn take_consumes_the_binding() {
        let bindings = UploadBindings::default();
        bindings.insert("k1", binding("a.txt"));
        assert_eq!(bindings.take("k1"), Some(binding("a.txt")));
        assert!(bindings.get("k1").is_none());
        assert!(bindings.take("k1").is_none());
    }

    #[test]
    fn expired_slots_are_invisible_and_pruned() {
        let bindings = UploadBindings::with_ttl(Duration::ZERO);
        bindings.insert("k1", binding("a.txt"));
        assert!(bindings.get("k1").is_none());
        assert!(bindings.take("k1").is_none());

        bindings.insert("k2", binding("b.txt"));
        bindings.insert("k3", binding("c.txt"));
        assert_eq!(bindings.slots.lock().unwrap().len(), 1);
        assert!(bindings.is_empty());
    }

    #[test]
    fn unknown_key_has_no_binding() {
        let bindings = UploadBindings::default();
        assert!(bindings.is_empty());
        assert!(bindings.get("missing").is_none());
    }
}
