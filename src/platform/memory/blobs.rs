use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::platform::{BlobStore, PlatformError, PlatformResult, StoredBlob};

struct Object {
    blob: StoredBlob,
    access_token: Uuid,
}

/// Blob bucket held in process memory. Download URLs point at the console's
/// own `/blobs/*path` route.
pub struct MemoryBlobStore {
    objects: DashMap<String, Object>,
    base_url: String,
    offline: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            objects: DashMap::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            offline: AtomicBool::new(false),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    /// Whether `token` is the access token embedded in the object's URL.
    pub fn token_matches(&self, path: &str, token: &str) -> bool {
        self.objects
            .get(path)
            .is_some_and(|object| object.access_token.to_string() == token)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn ensure_online(&self) -> PlatformResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PlatformError::Unavailable("blob storage offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> PlatformResult<()> {
        self.ensure_online()?;

        match self.objects.entry(path.to_string()) {
            Entry::Occupied(_) => Err(PlatformError::Conflict(format!("object {path} exists"))),
            Entry::Vacant(vacant) => {
                vacant.insert(Object {
                    blob: StoredBlob {
                        bytes,
                        content_type: content_type.to_string(),
                        uploaded_at: Utc::now(),
                    },
                    access_token: Uuid::new_v4(),
                });
                Ok(())
            }
        }
    }

    async fn download_url(&self, path: &str) -> PlatformResult<String> {
        self.ensure_online()?;

        let object = self
            .objects
            .get(path)
            .ok_or_else(|| PlatformError::NotFound(format!("object {path}")))?;

        Ok(format!(
            "{}/blobs/{}?token={}",
            self.base_url, path, object.access_token
        ))
    }

    async fn read(&self, path: &str) -> PlatformResult<StoredBlob> {
        self.ensure_online()?;
        self.objects
            .get(path)
            .map(|object| object.blob.clone())
            .ok_or_else(|| PlatformError::NotFound(format!("object {path}")))
    }

    async fn delete(&self, path: &str) -> PlatformResult<()> {
        self.ensure_online()?;
        self.objects
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(format!("object {path}")))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::MemoryBlobStore;
    use crate::platform::{BlobStore, PlatformError};

    #[tokio::test]
    async fn objects_are_write_once() {
        let store = MemoryBlobStore::new("http://localhost:3000/");
        store
            .put("proofs/a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        let err = store
            .put("proofs/a.jpg", Bytes::from_static(b"other"), "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Conflict(_)));

        let blob = store.read("proofs/a.jpg").await.unwrap();
        assert_eq!(blob.bytes, Bytes::from_static(b"jpeg"));
    }

    #[tokio::test]
    async fn download_url_requires_existing_object() {
        let store = MemoryBlobStore::new("http://localhost:3000");
        assert!(matches!(
            store.download_url("missing.jpg").await,
            Err(PlatformError::NotFound(_))
        ));

        store
            .put("proofs/b.png", Bytes::from_static(b"png"), "image/png")
            .await
            .unwrap();
        let url = store.download_url("proofs/b.png").await.unwrap();
        assert!(url.starts_with("http://localhost:3000/blobs/proofs/b.png?token="));
    }

    #[tokio::test]
    async fn download_token_guards_object() {
        let store = MemoryBlobStore::new("http://localhost:3000");
        store
            .put("proofs/b.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        let url = store.download_url("proofs/b.jpg").await.unwrap();
        let token = url.rsplit_once("token=").unwrap().1;

        assert!(store.token_matches("proofs/b.jpg", token));
        assert!(!store.token_matches("proofs/b.jpg", "guess"));
        assert!(!store.token_matches("proofs/missing.jpg", token));
    }
}
