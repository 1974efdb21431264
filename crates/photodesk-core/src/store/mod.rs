//! Relational store collaborator.
//!
//! Table-shaped operations over the persisted entities. Implementations must
//! keep at most one rendition row per `(photo_id, variant)` and at most one
//! EXIF and histogram row per photo, answering a duplicate insert with
//! [`StoreError::Conflict`].

pub mod memory;
pub mod schema;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod tests_support;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::types::{
    is_filled, Asset, DerivedFields, ExifData, Histogram, LocationFields, Photo, PhotoRecord,
    PhotoRendition,
};

#[async_trait]
pub trait PhotoStore: Send + Sync {
    async fn insert_asset(&self, asset: &Asset) -> StoreResult<()>;

    async fn delete_asset(&self, id: Uuid) -> StoreResult<()>;

    async fn find_asset_by_checksum(&self, checksum: &str) -> StoreResult<Option<Asset>>;

    async fn insert_photo(&self, photo: &Photo) -> StoreResult<()>;

    /// Deletes the photo together with its renditions, EXIF and histogram rows.
    async fn delete_photo(&self, id: Uuid) -> StoreResult<()>;

    async fn insert_exif(&self, photo_id: Uuid, exif: &ExifData) -> StoreResult<()>;

    async fn insert_rendition(&self, rendition: &PhotoRendition) -> StoreResult<()>;

    /// Returns the number of rows removed.
    async fn delete_renditions(&self, photo_id: Uuid) -> StoreResult<usize>;

    async fn insert_histogram(&self, photo_id: Uuid, histogram: &Histogram) -> StoreResult<()>;

    async fn delete_histogram(&self, photo_id: Uuid) -> StoreResult<()>;

    /// Write derived fields and publish in one update. This is the only
    /// operation that sets `status`, `visibility` and `is_visible`.
    async fn finalize_photo(&self, photo_id: Uuid, derived: &DerivedFields) -> StoreResult<()>;

    /// Current location fields; `None` when the photo no longer exists.
    async fn location(&self, photo_id: Uuid) -> StoreResult<Option<LocationFields>>;

    /// Write each candidate field only where the stored value is still empty,
    /// checked atomically with the write. Returns the fields actually written.
    async fn fill_location(
        &self,
        photo_id: Uuid,
        candidate: &LocationFields,
    ) -> StoreResult<LocationFields>;

    /// Joined select of a photo with its asset, renditions, EXIF and histogram.
    async fn get_photo(&self, id: Uuid) -> StoreResult<Option<PhotoRecord>>;

    /// All photos, most recently uploaded first.
    async fn list_photos(&self) -> StoreResult<Vec<Photo>>;

    /// Distinct capture years, newest first.
    async fn distinct_years(&self) -> StoreResult<Vec<i32>>;
}

/// Fields of `candidate` that may be written over `current`.
pub(crate) fn fillable(current: &LocationFields, candidate: &LocationFields) -> LocationFields {
    let pick = |cur: &Option<String>, new: &Option<String>| {
        if is_filled(cur) || !is_filled(new) {
            None
        } else {
            new.clone()
        }
    };
    LocationFields {
        place: pick(&current.place, &candidate.place),
        city: pick(&current.city, &candidate.city),
        region: pick(&current.region, &candidate.region),
        country: pick(&current.country, &candidate.country),
    }
}

pub(crate) fn not_found(entity: &'static str, id: Uuid) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fillable_only_targets_empty_fields() {
        let current = LocationFields {
            city: Some("Oakland".to_string()),
            region: Some(" ".to_string()),
            ..Default::default()
        };
        let candidate = LocationFields {
            place: Some("Lake Merritt".to_string()),
            city: Some("San Francisco".to_string()),
            region: Some("California".to_string()),
            country: None,
        };
        let writes = fillable(&current, &candidate);
        assert_eq!(writes.place.as_deref(), Some("Lake Merritt"));
        assert_eq!(writes.city, None);
        assert_eq!(writes.region.as_deref(), Some("California"));
        assert_eq!(writes.country, None);
    }
}
