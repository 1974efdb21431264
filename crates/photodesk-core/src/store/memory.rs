//! In-memory relational store.

use async_trait::async_trait;
use chrono::{Datelike, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use super::{fillable, not_found, PhotoStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Asset, DerivedFields, ExifData, Histogram, LocationFields, Photo, PhotoRecord,
    PhotoRendition, PhotoStatus, Visibility,
};

#[derive(Default)]
struct Tables {
    assets: HashMap<Uuid, Asset>,
    photos: HashMap<Uuid, Photo>,
    renditions: Vec<PhotoRendition>,
    exif: HashMap<Uuid, ExifData>,
    histograms: HashMap<Uuid, Histogram>,
}

/// Store backed by hash maps behind one mutex. Each call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an out-of-band edit to a photo row, as the editing UI would.
    pub fn update_photo<F>(&self, id: Uuid, edit: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Photo),
    {
        let mut tables = self.lock();
        let photo = tables.photos.get_mut(&id).ok_or_else(|| not_found("photo", id))?;
        edit(photo);
        photo.updated_at = Utc::now();
        Ok(())
    }

    pub fn photo_count(&self) -> usize {
        self.lock().photos.len()
    }

    pub fn asset_count(&self) -> usize {
        self.lock().assets.len()
    }

    pub fn rendition_count(&self, photo_id: Uuid) -> usize {
        self.lock()
            .renditions
            .iter()
            .filter(|r| r.photo_id == photo_id)
            .count()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PhotoStore for MemoryStore {
    async fn insert_asset(&self, asset: &Asset) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict(format!("asset {} exists", asset.id)));
        }
        tables.assets.insert(asset.id, asset.clone());
        Ok(())
    }

    async fn delete_asset(&self, id: Uuid) -> StoreResult<()> {
        self.lock().assets.remove(&id);
        Ok(())
    }

    async fn find_asset_by_checksum(&self, checksum: &str) -> StoreResult<Option<Asset>> {
        let tables = self.lock();
        Ok(tables
            .assets
            .values()
            .filter(|a| a.checksum == checksum)
            .min_by_key(|a| a.created_at)
            .cloned())
    }

    async fn insert_photo(&self, photo: &Photo) -> StoreResult<()> {
        let mut tables = self.lock();
        if tables.photos.contains_key(&photo.id) {
            return Err(StoreError::Conflict(format!("photo {} exists", photo.id)));
        }
        if !tables.assets.contains_key(&photo.asset_id) {
            return Err(not_found("asset", photo.asset_id));
        }
        tables.photos.insert(photo.id, photo.clone());
        Ok(())
    }

    async fn delete_photo(&self, id: Uuid) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.renditions.retain(|r| r.photo_id != id);
        tables.exif.remove(&id);
        tables.histograms.remove(&id);
        tables.photos.remove(&id);
        Ok(())
    }

    async fn insert_exif(&self, photo_id: Uuid, exif: &ExifData) -> StoreResult<()> {
        let mut tables = self.lock();
        if !tables.photos.contains_key(&photo_id) {
            return Err(not_found("photo", photo_id));
        }
        if tables.exif.contains_key(&photo_id) {
            return Err(StoreError::Conflict(format!("exif for {photo_id} exists")));
        }
        tables.exif.insert(photo_id, exif.clone());
        Ok(())
    }

    async fn insert_rendition(&self, rendition: &PhotoRendition) -> StoreResult<()> {
        let mut tables = self.lock();
        if !tables.photos.contains_key(&rendition.photo_id) {
            return Err(not_found("photo", rendition.photo_id));
        }
        let duplicate = tables
            .renditions
            .iter()
            .any(|r| r.photo_id == rendition.photo_id && r.variant == rendition.variant);
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "{} rendition for {} exists",
                rendition.variant, rendition.photo_id
            )));
        }
        tables.renditions.push(rendition.clone());
        Ok(())
    }

    async fn delete_renditions(&self, photo_id: Uuid) -> StoreResult<usize> {
        let mut tables = self.lock();
        let before = tables.renditions.len();
        tables.renditions.retain(|r| r.photo_id != photo_id);
        Ok(before - tables.renditions.len())
    }

    async fn insert_histogram(&self, photo_id: Uuid, histogram: &Histogram) -> StoreResult<()> {
        let mut tables = self.lock();
        if !tables.photos.contains_key(&photo_id) {
            return Err(not_found("photo", photo_id));
        }
        if tables.histograms.contains_key(&photo_id) {
            return Err(StoreError::Conflict(format!(
                "histogram for {photo_id} exists"
            )));
        }
        tables.histograms.insert(photo_id, histogram.clone());
        Ok(())
    }

    async fn delete_histogram(&self, photo_id: Uuid) -> StoreResult<()> {
        self.lock().histograms.remove(&photo_id);
        Ok(())
    }

    async fn finalize_photo(&self, photo_id: Uuid, derived: &DerivedFields) -> StoreResult<()> {
        let mut tables = self.lock();
        let photo = tables
            .photos
            .get_mut(&photo_id)
            .ok_or_else(|| not_found("photo", photo_id))?;
        photo.dominant_color = Some(derived.dominant_color.clone());
        photo.blurhash = Some(derived.blurhash.clone());
        photo.dynamic_range_usage = Some(derived.dynamic_range_usage);
        photo.status = PhotoStatus::Published;
        photo.visibility = Visibility::Public;
        photo.is_visible = true;
        photo.updated_at = Utc::now();
        Ok(())
    }

    async fn location(&self, photo_id: Uuid) -> StoreResult<Option<LocationFields>> {
        Ok(self.lock().photos.get(&photo_id).map(Photo::location))
    }

    async fn fill_location(
        &self,
        photo_id: Uuid,
        candidate: &LocationFields,
    ) -> StoreResult<LocationFields> {
        let mut tables = self.lock();
        let photo = tables
            .photos
            .get_mut(&photo_id)
            .ok_or_else(|| not_found("photo", photo_id))?;
        let writes = fillable(&photo.location(), candidate);
        if writes.is_empty() {
            return Ok(writes);
        }
        if let Some(v) = &writes.place {
            photo.place = Some(v.clone());
        }
        if let Some(v) = &writes.city {
            photo.city = Some(v.clone());
        }
        if let Some(v) = &writes.region {
            photo.region = Some(v.clone());
        }
        if let Some(v) = &writes.country {
            photo.country = Some(v.clone());
        }
        photo.updated_at = Utc::now();
        Ok(writes)
    }

    async fn get_photo(&self, id: Uuid) -> StoreResult<Option<PhotoRecord>> {
        let tables = self.lock();
        let Some(photo) = tables.photos.get(&id) else {
            return Ok(None);
        };
        let asset = tables
            .assets
            .get(&photo.asset_id)
            .cloned()
            .ok_or_else(|| not_found("asset", photo.asset_id))?;
        let mut renditions: Vec<PhotoRendition> = tables
            .renditions
            .iter()
            .filter(|r| r.photo_id == id)
            .cloned()
            .collect();
        renditions.sort_by_key(|r| r.variant);
        Ok(Some(PhotoRecord {
            photo: photo.clone(),
            asset,
            renditions,
            exif: tables.exif.get(&id).cloned(),
            histogram: tables.histograms.get(&id).cloned(),
        }))
    }

    async fn list_photos(&self) -> StoreResult<Vec<Photo>> {
        let mut photos: Vec<Photo> = self.lock().photos.values().cloned().collect();
        photos.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at).then(a.id.cmp(&b.id)));
        Ok(photos)
    }

    async fn distinct_years(&self) -> StoreResult<Vec<i32>> {
        let mut years: Vec<i32> = self
            .lock()
            .photos
            .values()
            .filter_map(|p| p.captured_at.map(|t| t.year()))
            .collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support;

    #[tokio::test]
    async fn test_store_contract() {
        tests_support::exercise_store(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_update_photo_applies_edit() {
        let store = MemoryStore::new();
        let (asset, photo) = tests_support::sample_rows(None);
        store.insert_asset(&asset).await.unwrap();
        store.insert_photo(&photo).await.unwrap();

        store
            .update_photo(photo.id, |p| p.city = Some("Lisbon".to_string()))
            .unwrap();
        let loc = store.location(photo.id).await.unwrap().unwrap();
        assert_eq!(loc.city.as_deref(), Some("Lisbon"));
        assert!(store.update_photo(Uuid::new_v4(), |_| {}).is_err());
    }
}
