//! Fixtures and fault-injecting collaborators for orchestrator tests.

#![allow(dead_code)]

use async_trait::async_trait;
use exif::experimental::Writer;
use exif::{Field, In, Rational, Tag, Value};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use photodesk_core::config::Config;
use photodesk_core::error::{GeocodeError, StorageError, StorageResult, StoreError, StoreResult};
use photodesk_core::pipeline::RetryPolicy;
use photodesk_core::storage::{BlobStore, MemoryBlobStore};
use photodesk_core::store::{MemoryStore, PhotoStore};
use photodesk_core::types::{
    Asset, DerivedFields, ExifData, GeocodedPlace, Histogram, LocationFields, Photo, PhotoRecord,
    PhotoRendition,
};
use photodesk_core::{ReverseGeocoder, Upload};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

// --- Fixtures ---

pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.retry.storage = RetryPolicy {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config.retry.geocode = RetryPolicy {
        max_attempts: 5,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    config
}

pub fn solid(width: u32, height: u32, color: [u8; 3], format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
        .write_to(&mut buf, format)
        .expect("encode fixture");
    buf.into_inner()
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 251) as u8, (y % 241) as u8, 128])
    }))
    .write_to(&mut buf, ImageFormat::Jpeg)
    .expect("encode fixture");
    buf.into_inner()
}

fn rationals(tag: Tag, values: &[(u32, u32)]) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Rational(
            values
                .iter()
                .map(|&(num, denom)| Rational { num, denom })
                .collect(),
        ),
    }
}

fn ascii(tag: Tag, s: &str) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![s.as_bytes().to_vec()]),
    }
}

/// A JPEG tagged as shot in San Francisco on 2022-08-01.
pub fn jpeg_with_gps(width: u32, height: u32) -> Vec<u8> {
    with_exif(
        jpeg(width, height),
        &[
            ascii(Tag::Make, "Ricoh"),
            ascii(Tag::DateTimeOriginal, "2022:08:01 07:45:00"),
            rationals(Tag::GPSLatitude, &[(37, 1), (46, 1), (2964, 100)]),
            ascii(Tag::GPSLatitudeRef, "N"),
            rationals(Tag::GPSLongitude, &[(122, 1), (25, 1), (984, 100)]),
            ascii(Tag::GPSLongitudeRef, "W"),
        ],
    )
}

/// A `width`x`height` JPEG whose EXIF says to rotate it 90 degrees clockwise.
pub fn jpeg_rotated_cw(width: u32, height: u32) -> Vec<u8> {
    let orientation = Field {
        tag: Tag::Orientation,
        ifd_num: In::PRIMARY,
        value: Value::Short(vec![6]),
    };
    with_exif(jpeg(width, height), &[orientation])
}

/// Splice an APP1 EXIF segment in right after the SOI marker.
fn with_exif(plain: Vec<u8>, fields: &[Field]) -> Vec<u8> {
    let mut writer = Writer::new();
    for field in fields {
        writer.push_field(field);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).expect("write exif");
    let tiff = tiff.into_inner();

    let mut out = plain[..2].to_vec();
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&((tiff.len() + 8) as u16).to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&plain[2..]);
    out
}

pub fn upload(bytes: Vec<u8>, filename: &str) -> Upload {
    Upload {
        bytes,
        filename: filename.to_string(),
        content_type: None,
        uploader_id: Some("editor-1".to_string()),
        title: None,
    }
}

// --- Blob store with injected put failures ---

#[derive(Default)]
pub struct FlakyBlobStore {
    pub inner: MemoryBlobStore,
    failing_suffixes: Mutex<Vec<String>>,
    put_attempts: Mutex<HashMap<String, u32>>,
}

impl FlakyBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every put to a key ending in `suffix` fails.
    pub fn fail_puts_ending_with(&self, suffix: &str) {
        self.failing_suffixes.lock().unwrap().push(suffix.to_string());
    }

    pub fn heal(&self) {
        self.failing_suffixes.lock().unwrap().clear();
    }

    pub fn put_attempts(&self, suffix: &str) -> u32 {
        self.put_attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(key, _)| key.ends_with(suffix))
            .map(|(_, n)| *n)
            .sum()
    }
}

#[async_trait]
impl BlobStore for FlakyBlobStore {
    fn name(&self) -> &str {
        "flaky"
    }

    fn base_url(&self) -> &str {
        self.inner.base_url()
    }

    async fn put_object(&self, key: &str, bytes: &[u8], content_type: &str) -> StorageResult<()> {
        *self
            .put_attempts
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default() += 1;
        let failing = self
            .failing_suffixes
            .lock()
            .unwrap()
            .iter()
            .any(|suffix| key.ends_with(suffix.as_str()));
        if failing {
            return Err(StorageError::Backend("503 Slow Down".to_string()));
        }
        self.inner.put_object(key, bytes, content_type).await
    }

    async fn get_object(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get_object(key).await
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.inner.delete_object(key).await
    }
}

// --- Relational store with injected failures ---

#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_finalize: AtomicBool,
    pub fail_photo_insert: AtomicBool,
    pub fail_rendition_insert: AtomicBool,
    /// When set, `distinct_years` reads, then parks until `years_release`
    pub hold_years: AtomicBool,
    pub years_entered: Notify,
    pub years_release: Notify,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn injected(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Backend(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PhotoStore for FlakyStore {
    async fn insert_asset(&self, asset: &Asset) -> StoreResult<()> {
        self.inner.insert_asset(asset).await
    }

    async fn delete_asset(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_asset(id).await
    }

    async fn find_asset_by_checksum(&self, checksum: &str) -> StoreResult<Option<Asset>> {
        self.inner.find_asset_by_checksum(checksum).await
    }

    async fn insert_photo(&self, photo: &Photo) -> StoreResult<()> {
        Self::injected(&self.fail_photo_insert, "photo insert")?;
        self.inner.insert_photo(photo).await
    }

    async fn delete_photo(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete_photo(id).await
    }

    async fn insert_exif(&self, photo_id: Uuid, exif: &ExifData) -> StoreResult<()> {
        self.inner.insert_exif(photo_id, exif).await
    }

    async fn insert_rendition(&self, rendition: &PhotoRendition) -> StoreResult<()> {
        Self::injected(&self.fail_rendition_insert, "rendition insert")?;
        self.inner.insert_rendition(rendition).await
    }

    async fn delete_renditions(&self, photo_id: Uuid) -> StoreResult<usize> {
        self.inner.delete_renditions(photo_id).await
    }

    async fn insert_histogram(&self, photo_id: Uuid, histogram: &Histogram) -> StoreResult<()> {
        self.inner.insert_histogram(photo_id, histogram).await
    }

    async fn delete_histogram(&self, photo_id: Uuid) -> StoreResult<()> {
        self.inner.delete_histogram(photo_id).await
    }

    async fn finalize_photo(&self, photo_id: Uuid, derived: &DerivedFields) -> StoreResult<()> {
        Self::injected(&self.fail_finalize, "finalize")?;
        self.inner.finalize_photo(photo_id, derived).await
    }

    async fn location(&self, photo_id: Uuid) -> StoreResult<Option<LocationFields>> {
        self.inner.location(photo_id).await
    }

    async fn fill_location(
        &self,
        photo_id: Uuid,
        candidate: &LocationFields,
    ) -> StoreResult<LocationFields> {
        self.inner.fill_location(photo_id, candidate).await
    }

    async fn get_photo(&self, id: Uuid) -> StoreResult<Option<PhotoRecord>> {
        self.inner.get_photo(id).await
    }

    async fn list_photos(&self) -> StoreResult<Vec<Photo>> {
        self.inner.list_photos().await
    }

    async fn distinct_years(&self) -> StoreResult<Vec<i32>> {
        let years = self.inner.distinct_years().await;
        if self.hold_years.load(Ordering::SeqCst) {
            self.years_entered.notify_one();
            self.years_release.notified().await;
        }
        years
    }
}

// --- Geocoder that can be held mid-call ---

pub struct GatedGeocoder {
    place: GeocodedPlace,
    pub calls: AtomicU32,
    /// Signalled when a lookup starts
    pub entered: Arc<Notify>,
    /// Lookups wait for this before answering
    pub release: Arc<Notify>,
}

impl GatedGeocoder {
    pub fn new(place: GeocodedPlace) -> Self {
        Self {
            place,
            calls: AtomicU32::new(0),
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }
}

#[async_trait]
impl ReverseGeocoder for GatedGeocoder {
    fn name(&self) -> &str {
        "gated"
    }

    async fn reverse_geocode(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<GeocodedPlace>, GeocodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        Ok(Some(self.place.clone()))
    }
}

pub fn san_francisco() -> GeocodedPlace {
    GeocodedPlace {
        country: Some("United States".to_string()),
        region: Some("California".to_string()),
        city: Some("San Francisco".to_string()),
        place_name: Some("Ferry Building".to_string()),
    }
}
