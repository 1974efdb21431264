//! Ingestion orchestrator.
//!
//! Turns one uploaded original into a persisted photo with three renditions,
//! a histogram, a dominant color and a blurhash. Phases run strictly in
//! order. Everything created before the renditions are safely stored is
//! recorded on a [`CompensationStack`] and reverted if the run cannot
//! finish; later failures degrade to a recoverable draft instead.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::compensation::{Compensation, CompensationStack};
use super::decode::{DecodedImage, ImageDecoder};
use super::hash::content_checksum;
use super::metadata::MetadataExtractor;
use super::retry::{with_retry_when, RetryOutcome};
use super::stats::{compute_histogram, dynamic_range_usage};
use super::transform::{
    channel_means, decode_oriented, perceptual_hash, resize_and_encode, to_hex_color,
    EncodedImage,
};
use super::validate::{AcceptedFormat, Validator};
use crate::cache::YearsCache;
use crate::config::Config;
use crate::error::{PipelineError, PipelineResult, StorageError, StoreError, TransformError};
use crate::geocode::{GeocodeJob, GeocodeQueue};
use crate::storage::{original_key, rendition_key, storage_id_from_key, BlobStore};
use crate::store::PhotoStore;
use crate::types::{
    Asset, AssetKind, DerivedFields, ExifData, Histogram, IngestOutcome, Orientation, Photo,
    PhotoRecord, PhotoRendition, PhotoStatus, Variant, Visibility,
};

/// Blurhash components along x and y.
const BLURHASH_COMPONENTS: (u32, u32) = (4, 3);

/// An original whose bytes arrive with the request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: Option<String>,
    pub uploader_id: Option<String>,
    pub title: Option<String>,
}

/// An original the client already wrote to blob storage under `key`.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub key: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub uploader_id: Option<String>,
    pub title: Option<String>,
}

/// Validated original ready to be persisted.
struct Prepared {
    bytes: Arc<Vec<u8>>,
    decoded: DecodedImage,
    checksum: String,
    storage_id: Uuid,
    key: String,
    filename: String,
    uploader_id: Option<String>,
    title: Option<String>,
}

struct StoredRendition {
    variant: Variant,
    url: String,
    encoded: EncodedImage,
    checksum: String,
}

pub struct Ingestor {
    config: Config,
    validator: Validator,
    decoder: ImageDecoder,
    blobs: Arc<dyn BlobStore>,
    store: Arc<dyn PhotoStore>,
    geocode_queue: Option<GeocodeQueue>,
    years_cache: Arc<YearsCache>,
}

impl Ingestor {
    pub fn new(config: Config, blobs: Arc<dyn BlobStore>, store: Arc<dyn PhotoStore>) -> Self {
        Self {
            validator: Validator::new(config.limits.clone()),
            decoder: ImageDecoder::new(config.limits.clone()),
            config,
            blobs,
            store,
            geocode_queue: None,
            years_cache: Arc::new(YearsCache::new()),
        }
    }

    /// Submit GPS-tagged photos to this queue after ingestion.
    pub fn with_geocode_queue(mut self, queue: GeocodeQueue) -> Self {
        self.geocode_queue = Some(queue);
        self
    }

    /// Share a years cache with readers.
    pub fn with_years_cache(mut self, cache: Arc<YearsCache>) -> Self {
        self.years_cache = cache;
        self
    }

    pub fn store(&self) -> &Arc<dyn PhotoStore> {
        &self.store
    }

    /// Ingest an original whose bytes are in hand.
    pub async fn ingest(&self, upload: Upload) -> PipelineResult<IngestOutcome> {
        let start = Instant::now();
        let Upload {
            bytes,
            filename,
            content_type,
            uploader_id,
            title,
        } = upload;
        tracing::debug!(file = %filename, size = bytes.len(), "Ingesting upload");

        let bytes = Arc::new(bytes);
        let (decoded, checksum) = self
            .validate_and_decode(&filename, &bytes, content_type.as_deref())
            .await?;

        let storage_id = Uuid::new_v4();
        let key = original_key(storage_id, decoded.format.extension());
        self.put_with_retry(&key, &bytes, decoded.format.content_type())
            .await?;
        let mut stack = CompensationStack::new();
        stack.push(Compensation::DeleteBlob { key: key.clone() });
        tracing::trace!(key = %key, elapsed = ?start.elapsed(), "Original stored");

        let prepared = Prepared {
            bytes,
            decoded,
            checksum,
            storage_id,
            key,
            filename,
            uploader_id,
            title,
        };
        let outcome = self.persist_and_process(prepared, stack).await;
        if let Ok(outcome) = &outcome {
            tracing::debug!(
                photo_id = %outcome.photo_id,
                status = outcome.status.as_str(),
                elapsed = ?start.elapsed(),
                "Ingestion finished"
            );
        }
        outcome
    }

    /// Ingest an original the client uploaded directly to blob storage.
    pub async fn ingest_stored(&self, upload: StoredUpload) -> PipelineResult<IngestOutcome> {
        let StoredUpload {
            key,
            filename,
            content_type,
            uploader_id,
            title,
        } = upload;
        tracing::debug!(file = %filename, key = %key, "Ingesting stored upload");

        let storage_id =
            storage_id_from_key(&key).ok_or_else(|| PipelineError::UnrecoverableKey(key.clone()))?;
        let bytes = Arc::new(self.get_with_retry(&key).await?);
        let mut stack = CompensationStack::new();
        stack.push(Compensation::DeleteBlob { key: key.clone() });

        // A refused original is removed like any other rolled-back run
        let (decoded, checksum) = match self
            .validate_and_decode(&filename, &bytes, content_type.as_deref())
            .await
        {
            Ok(validated) => validated,
            Err(e) => {
                tracing::warn!(key = %key, "Stored upload refused: {e}");
                stack.unwind(self.blobs.as_ref(), self.store.as_ref()).await;
                return Err(e);
            }
        };

        let prepared = Prepared {
            bytes,
            decoded,
            checksum,
            storage_id,
            key,
            filename,
            uploader_id,
            title,
        };
        self.persist_and_process(prepared, stack).await
    }

    /// Regenerate renditions, histogram and derived fields from the stored
    /// original. EXIF is kept as is.
    pub async fn reprocess(&self, photo_id: Uuid) -> PipelineResult<IngestOutcome> {
        let start = Instant::now();
        let record = self
            .store
            .get_photo(photo_id)
            .await
            .map_err(|e| persist_error("photo", e))?
            .ok_or(PipelineError::PhotoNotFound(photo_id))?;

        let key = self
            .blobs
            .key_from_url(&record.asset.url)
            .ok_or_else(|| PipelineError::UnrecoverableKey(record.asset.url.clone()))?;
        let storage_id =
            storage_id_from_key(&key).ok_or_else(|| PipelineError::UnrecoverableKey(key.clone()))?;
        let bytes = Arc::new(self.get_with_retry(&key).await?);

        self.store
            .delete_renditions(photo_id)
            .await
            .map_err(|e| persist_error("rendition", e))?;
        self.store
            .delete_histogram(photo_id)
            .await
            .map_err(|e| persist_error("histogram", e))?;
        for rendition in &record.renditions {
            let Some(old_key) = self.blobs.key_from_url(&rendition.url) else {
                continue;
            };
            if let Err(e) = self.blobs.delete_object(&old_key).await {
                tracing::warn!(key = %old_key, "Failed to delete old rendition: {e}");
            }
        }

        let outcome = self
            .render_and_publish(
                photo_id,
                storage_id,
                bytes,
                CompensationStack::new(),
                record.photo.status,
            )
            .await?;
        tracing::info!(
            photo_id = %photo_id,
            status = outcome.status.as_str(),
            elapsed = ?start.elapsed(),
            "Reprocessed photo"
        );
        Ok(outcome)
    }

    /// Existing asset with the same content checksum, if any.
    pub async fn find_duplicate(&self, bytes: &[u8]) -> PipelineResult<Option<Asset>> {
        self.find_by_checksum(&content_checksum(bytes)).await
    }

    async fn find_by_checksum(&self, checksum: &str) -> PipelineResult<Option<Asset>> {
        self.store
            .find_asset_by_checksum(checksum)
            .await
            .map_err(|e| persist_error("asset", e))
    }

    /// Phase 2: limits, sniffing, decode, checksum and the duplicate check.
    async fn validate_and_decode(
        &self,
        filename: &str,
        bytes: &Arc<Vec<u8>>,
        content_type: Option<&str>,
    ) -> PipelineResult<(DecodedImage, String)> {
        let format: AcceptedFormat = self.validator.validate(filename, bytes, content_type)?;
        let decoded = self.decoder.decode(bytes.clone(), filename, format).await?;

        let hashed = bytes.clone();
        let checksum = tokio::task::spawn_blocking(move || content_checksum(&hashed))
            .await
            .map_err(|e| PipelineError::Decode {
                name: filename.to_string(),
                message: format!("Task join error: {e}"),
            })?;

        if let Some(existing) = self.find_by_checksum(&checksum).await? {
            if self.config.processing.reject_duplicates {
                return Err(PipelineError::Duplicate {
                    name: filename.to_string(),
                    asset_id: existing.id,
                    checksum,
                });
            }
            tracing::info!(
                file = %filename,
                asset_id = %existing.id,
                "Duplicate content, ingesting anyway"
            );
        }

        tracing::trace!(
            file = %filename,
            format = format.extension(),
            width = decoded.width,
            height = decoded.height,
            "Decoded"
        );
        Ok((decoded, checksum))
    }

    /// Phases 3-10 for a freshly stored original.
    async fn persist_and_process(
        &self,
        prepared: Prepared,
        mut stack: CompensationStack,
    ) -> PipelineResult<IngestOutcome> {
        let Prepared {
            bytes,
            decoded,
            checksum,
            storage_id,
            key,
            filename,
            uploader_id,
            title,
        } = prepared;

        // Phase 3: EXIF, never fatal
        let exif_bytes = bytes.clone();
        let exif = tokio::task::spawn_blocking(move || {
            MetadataExtractor::extract_from_bytes(&exif_bytes)
        })
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(file = %filename, "EXIF extraction task failed: {e}");
            None
        });

        // Phase 4: baseline rows
        let now = Utc::now();
        let asset = Asset {
            id: Uuid::new_v4(),
            kind: AssetKind::Image,
            url: self.blobs.public_url(&key),
            width: decoded.width,
            height: decoded.height,
            byte_size: bytes.len() as u64,
            checksum,
            created_at: now,
            updated_at: now,
            created_by: uploader_id.clone(),
        };
        if let Err(e) = self.store.insert_asset(&asset).await {
            tracing::error!(file = %filename, "Failed to insert asset, rolling back: {e}");
            stack.unwind(self.blobs.as_ref(), self.store.as_ref()).await;
            return Err(persist_error("asset", e));
        }
        stack.push(Compensation::DeleteAsset(asset.id));

        let photo = baseline_photo(&asset, &decoded, storage_id, exif.as_ref(), title, uploader_id);
        if let Err(e) = self.store.insert_photo(&photo).await {
            tracing::error!(file = %filename, "Failed to insert photo, rolling back: {e}");
            stack.unwind(self.blobs.as_ref(), self.store.as_ref()).await;
            return Err(persist_error("photo", e));
        }
        stack.push(Compensation::DeletePhoto(photo.id));

        if let Some(exif) = &exif {
            if let Err(e) = self.store.insert_exif(photo.id, exif).await {
                tracing::warn!(photo_id = %photo.id, "Failed to insert EXIF: {e}");
            }
        }

        let outcome = self
            .render_and_publish(photo.id, storage_id, bytes, stack, PhotoStatus::Draft)
            .await?;

        // Phase 10: side effects
        self.years_cache.invalidate();
        if let (Some(queue), Some((latitude, longitude))) =
            (&self.geocode_queue, exif.as_ref().and_then(ExifData::gps))
        {
            queue.submit(GeocodeJob {
                photo_id: photo.id,
                latitude,
                longitude,
            });
        }

        Ok(outcome)
    }

    /// Phases 5-9. `stack` holds whatever must be reverted if a rendition
    /// cannot be stored; `fallback` is the status reported when the photo
    /// could not be finalized.
    async fn render_and_publish(
        &self,
        photo_id: Uuid,
        storage_id: Uuid,
        bytes: Arc<Vec<u8>>,
        mut stack: CompensationStack,
        fallback: PhotoStatus,
    ) -> PipelineResult<IngestOutcome> {
        // Phases 5 and 6: one tier at a time
        let mut stored = Vec::with_capacity(Variant::ALL.len());
        for variant in Variant::ALL {
            let tier_start = Instant::now();
            let spec = self.config.renditions.get(variant);
            let source = bytes.clone();
            let encoded = run_blocking(move || {
                let encoded = resize_and_encode(&source, spec.max_dimension, spec.quality)?;
                let checksum = content_checksum(&encoded.bytes);
                Ok((encoded, checksum))
            })
            .await;

            let (encoded, checksum) = match encoded {
                Ok(encoded) => encoded,
                Err(e) => {
                    tracing::error!(%photo_id, %variant, "Rendition encode failed, rolling back: {e}");
                    stack.unwind(self.blobs.as_ref(), self.store.as_ref()).await;
                    return Err(PipelineError::Encode {
                        variant: variant.to_string(),
                        message: e.to_string(),
                    });
                }
            };

            let key = rendition_key(storage_id, variant);
            if let Err(e) = self.put_with_retry(&key, &encoded.bytes, "image/jpeg").await {
                tracing::error!(%photo_id, %variant, "Rendition upload failed, rolling back: {e}");
                stack.unwind(self.blobs.as_ref(), self.store.as_ref()).await;
                return Err(e);
            }
            stack.push(Compensation::DeleteBlob { key: key.clone() });
            tracing::trace!(
                %variant,
                width = encoded.width,
                height = encoded.height,
                size = encoded.bytes.len(),
                elapsed = ?tier_start.elapsed(),
                "Rendition stored"
            );

            stored.push(StoredRendition {
                variant,
                url: self.blobs.public_url(&key),
                encoded,
                checksum,
            });
        }

        // Phase 7: rendition rows, tolerated
        let now = Utc::now();
        for rendition in &stored {
            let row = PhotoRendition {
                id: Uuid::new_v4(),
                photo_id,
                variant: rendition.variant,
                url: rendition.url.clone(),
                width: rendition.encoded.width,
                height: rendition.encoded.height,
                byte_size: rendition.encoded.bytes.len() as u64,
                checksum: rendition.checksum.clone(),
                created_at: now,
                updated_at: now,
            };
            if let Err(e) = self.store.insert_rendition(&row).await {
                tracing::warn!(%photo_id, variant = %rendition.variant, "Failed to insert rendition row: {e}");
            }
        }
        stack.commit();

        let detail_url = stored
            .iter()
            .find(|r| r.variant == Variant::Detail)
            .map(|r| r.url.clone())
            .unwrap_or_default();
        let draft = IngestOutcome {
            photo_id,
            detail_url: detail_url.clone(),
            status: fallback,
        };

        // Phase 8: derived statistics
        let encoded_of = |variant: Variant| {
            stored
                .iter()
                .find(|r| r.variant == variant)
                .map(|r| r.encoded.bytes.clone())
                .unwrap_or_default()
        };
        let (detail, list) = (encoded_of(Variant::Detail), encoded_of(Variant::List));
        let stats = run_blocking(move || {
            let image = decode_oriented(&detail)?;
            let histogram = compute_histogram(&image);
            let color = to_hex_color(channel_means(&image));
            let (cx, cy) = BLURHASH_COMPONENTS;
            let blurhash = perceptual_hash(&list, cx, cy)?;
            Ok((histogram, color, blurhash))
        })
        .await;

        let (histogram, dominant_color, blurhash): (Histogram, String, String) = match stats {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!(%photo_id, "Derived statistics failed, leaving photo recoverable: {e}");
                return Ok(draft);
            }
        };

        // Phase 9: persist derived data and publish
        if let Err(e) = self.store.insert_histogram(photo_id, &histogram).await {
            tracing::warn!(%photo_id, "Failed to insert histogram: {e}");
        }
        let derived = DerivedFields {
            dynamic_range_usage: dynamic_range_usage(&histogram),
            dominant_color,
            blurhash,
        };
        if let Err(e) = self.store.finalize_photo(photo_id, &derived).await {
            tracing::warn!(%photo_id, "Failed to finalize photo, leaving it recoverable: {e}");
            return Ok(draft);
        }

        Ok(IngestOutcome {
            photo_id,
            detail_url,
            status: PhotoStatus::Published,
        })
    }

    async fn put_with_retry(&self, key: &str, bytes: &[u8], content_type: &str) -> PipelineResult<()> {
        let outcome = with_retry_when(
            &self.config.retry.storage,
            |_| self.blobs.put_object(key, bytes, content_type),
            StorageError::is_retryable,
        )
        .await;
        match outcome {
            RetryOutcome::Success { attempts, .. } => {
                if attempts > 1 {
                    tracing::debug!(key, attempts, "Upload succeeded after retry");
                }
                Ok(())
            }
            RetryOutcome::Failure { error, attempts } => Err(PipelineError::Storage {
                operation: "put",
                key: key.to_string(),
                attempts,
                message: error.to_string(),
            }),
        }
    }

    async fn get_with_retry(&self, key: &str) -> PipelineResult<Vec<u8>> {
        with_retry_when(
            &self.config.retry.storage,
            |_| self.blobs.get_object(key),
            StorageError::is_retryable,
        )
        .await
            .into_result()
            .map_err(|(error, attempts)| PipelineError::Storage {
                operation: "get",
                key: key.to_string(),
                attempts,
                message: error.to_string(),
            })
    }
}

/// Whether a stored photo is missing anything a full ingestion produces.
pub fn needs_reprocessing(record: &PhotoRecord) -> bool {
    let photo = &record.photo;
    photo.status != PhotoStatus::Published
        || photo.blurhash.is_none()
        || photo.dominant_color.is_none()
        || record.histogram.is_none()
        || Variant::ALL
            .iter()
            .any(|variant| record.rendition(*variant).is_none())
}

fn baseline_photo(
    asset: &Asset,
    decoded: &DecodedImage,
    storage_id: Uuid,
    exif: Option<&ExifData>,
    title: Option<String>,
    created_by: Option<String>,
) -> Photo {
    let (width, height) = (decoded.width, decoded.height);
    let megapixels = ((width as f64 * height as f64) / 1_000_000.0 * 100.0).round() / 100.0;
    let gps = exif.and_then(ExifData::gps);
    Photo {
        id: Uuid::new_v4(),
        title,
        description: None,
        captured_at: exif.and_then(|e| e.captured_at),
        uploaded_at: asset.created_at,
        asset_id: asset.id,
        storage_id,
        width,
        height,
        aspect_ratio: width as f64 / height as f64,
        orientation: Orientation::from_dimensions(width, height),
        megapixels,
        place: None,
        city: None,
        region: None,
        country: None,
        latitude: gps.map(|(lat, _)| lat),
        longitude: gps.map(|(_, lon)| lon),
        dominant_color: None,
        blurhash: None,
        dynamic_range_usage: None,
        is_visible: false,
        status: PhotoStatus::Draft,
        visibility: Visibility::Private,
        created_at: asset.created_at,
        updated_at: asset.created_at,
        created_by,
    }
}

fn persist_error(entity: &'static str, error: StoreError) -> PipelineError {
    PipelineError::Persist {
        entity,
        message: error.to_string(),
    }
}

/// Run CPU-bound image work on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, TransformError>
where
    F: FnOnce() -> Result<T, TransformError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransformError::Decode(format!("Task join error: {e}")))?
}
