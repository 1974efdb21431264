//! Blob storage collaborator.
//!
//! Keys are deterministic and scoped by the photo's storage id:
//! `photos/<storage_id>/original.<ext>` and `photos/<storage_id>/<variant>.jpg`.

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::types::Variant;

/// Auth-free object storage the pipeline writes originals and renditions to.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Base URL objects are served under, without a trailing slash
    fn base_url(&self) -> &str;

    async fn put_object(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()>;

    async fn get_object(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Deleting a missing key is not an error.
    async fn delete_object(&self, key: &str) -> StorageResult<()>;

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url().trim_end_matches('/'), key)
    }

    /// Inverse of [`BlobStore::public_url`]; `None` for foreign URLs.
    fn key_from_url(&self, url: &str) -> Option<String> {
        let base = self.base_url().trim_end_matches('/');
        let key = url.strip_prefix(base)?.strip_prefix('/')?;
        let key = key.split(['?', '#']).next().unwrap_or_default();
        (!key.is_empty()).then(|| key.to_string())
    }
}

/// Key of a photo's stored original.
pub fn original_key(storage_id: Uuid, extension: &str) -> String {
    format!("photos/{}/original.{}", storage_id, extension)
}

/// Key of one rendition.
pub fn rendition_key(storage_id: Uuid, variant: Variant) -> String {
    format!("photos/{}/{}.jpg", storage_id, variant.as_str())
}

/// Storage id a `photos/<storage_id>/...` key is scoped by.
pub fn storage_id_from_key(key: &str) -> Option<Uuid> {
    let mut parts = key.split('/');
    if parts.next()? != "photos" {
        return None;
    }
    let id = parts.next()?;
    parts.next()?;
    Uuid::parse_str(id).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let id = Uuid::parse_str("6f1c1f4e-2b7a-4c1e-9b0a-3d1f5e2a7c90").unwrap();
        assert_eq!(
            original_key(id, "jpg"),
            "photos/6f1c1f4e-2b7a-4c1e-9b0a-3d1f5e2a7c90/original.jpg"
        );
        assert_eq!(
            rendition_key(id, Variant::List),
            "photos/6f1c1f4e-2b7a-4c1e-9b0a-3d1f5e2a7c90/list.jpg"
        );
        assert_eq!(storage_id_from_key(&original_key(id, "png")), Some(id));
    }

    #[test]
    fn test_storage_id_from_foreign_keys() {
        assert_eq!(storage_id_from_key("media/abc/original.jpg"), None);
        assert_eq!(storage_id_from_key("photos/not-a-uuid/original.jpg"), None);
        assert_eq!(
            storage_id_from_key("photos/6f1c1f4e-2b7a-4c1e-9b0a-3d1f5e2a7c90"),
            None
        );
    }

    #[test]
    fn test_url_round_trip() {
        let store = MemoryBlobStore::new();
        let url = store.public_url("photos/x/original.jpg");
        assert_eq!(
            store.key_from_url(&url).as_deref(),
            Some("photos/x/original.jpg")
        );
        assert_eq!(store.key_from_url("https://elsewhere.example/photos/x"), None);
    }
}
