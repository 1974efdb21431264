//! Core data types for the Photodesk library.
//!
//! These mirror the persisted entities (Asset, Photo, PhotoRendition, the
//! zero-or-one EXIF and histogram rows) plus the values the ingestion
//! pipeline hands back to its caller.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One stored binary blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: Uuid,
    pub kind: AssetKind,

    /// Public URL of the stored original
    pub url: String,

    pub width: u32,
    pub height: u32,
    pub byte_size: u64,

    /// Lowercase hex SHA-256 of the raw bytes
    pub checksum: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Image,
    File,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Image => "image",
            AssetKind::File => "file",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "image" => Some(AssetKind::Image),
            "file" => Some(AssetKind::File),
            _ => None,
        }
    }
}

/// The aggregate root for one logical image.
///
/// `is_visible` and `visibility == Public` only ever become true together with
/// `status == Published`; the store's `finalize_photo` is the single writer of
/// all three.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Photo {
    pub id: Uuid,
    pub title: Option<String>,
    pub description: Option<String>,

    /// Capture time from EXIF, without a zone
    pub captured_at: Option<NaiveDateTime>,
    pub uploaded_at: DateTime<Utc>,

    pub asset_id: Uuid,

    /// Namespace for every blob belonging to this photo
    pub storage_id: Uuid,

    // === Geometry ===
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub orientation: Orientation,
    pub megapixels: f64,

    // === Location ===
    pub place: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    // === Derived ===
    pub dominant_color: Option<String>,
    pub blurhash: Option<String>,
    pub dynamic_range_usage: Option<f64>,

    // === Lifecycle ===
    pub is_visible: bool,
    pub status: PhotoStatus,
    pub visibility: Visibility,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

impl Photo {
    pub fn location(&self) -> LocationFields {
        LocationFields {
            place: self.place.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            country: self.country.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Landscape,
    Portrait,
    Square,
}

impl Orientation {
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        match width.cmp(&height) {
            std::cmp::Ordering::Greater => Orientation::Landscape,
            std::cmp::Ordering::Less => Orientation::Portrait,
            std::cmp::Ordering::Equal => Orientation::Square,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "landscape",
            Orientation::Portrait => "portrait",
            Orientation::Square => "square",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "landscape" => Some(Orientation::Landscape),
            "portrait" => Some(Orientation::Portrait),
            "square" => Some(Orientation::Square),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PhotoStatus {
    Draft,
    Published,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Draft => "draft",
            PhotoStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PhotoStatus::Draft),
            "published" => Some(PhotoStatus::Published),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Private,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Private => "private",
            Visibility::Public => "public",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "private" => Some(Visibility::Private),
            "public" => Some(Visibility::Public),
            _ => None,
        }
    }
}

/// Rendition tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Thumb,
    List,
    Detail,
}

impl Variant {
    /// Generation order: smallest tier first.
    pub const ALL: [Variant; 3] = [Variant::Thumb, Variant::List, Variant::Detail];

    pub fn as_str(&self) -> &'static str {
        match self {
            Variant::Thumb => "thumb",
            Variant::List => "list",
            Variant::Detail => "detail",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "thumb" => Some(Variant::Thumb),
            "list" => Some(Variant::List),
            "detail" => Some(Variant::Detail),
            _ => None,
        }
    }
}

impl std::fmt::Display for Variant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resized derivative of a photo's original.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoRendition {
    pub id: Uuid,
    pub photo_id: Uuid,
    pub variant: Variant,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub byte_size: u64,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// EXIF metadata extracted from an original.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExifData {
    /// When the photo was captured (camera local time)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<NaiveDateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_make: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens_model: Option<String>,

    /// Focal length in mm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focal_length: Option<f64>,

    /// Aperture as an f-number (e.g. 1.8)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f_number: Option<f64>,

    /// Shutter speed (e.g. "1/1000")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_time: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,

    /// Exposure compensation in EV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exposure_bias: Option<f64>,

    /// GPS latitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<f64>,

    /// GPS longitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<f64>,

    /// GPS altitude in metres; negative below sea level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_altitude: Option<f64>,

    /// Image orientation (1-8 per EXIF spec)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orientation: Option<u32>,
}

impl ExifData {
    /// Both GPS coordinates, when present.
    pub fn gps(&self) -> Option<(f64, f64)> {
        Some((self.gps_latitude?, self.gps_longitude?))
    }
}

/// Four 256-bucket histograms plus the clipping percentages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Histogram {
    pub luma: Vec<u32>,
    pub red: Vec<u32>,
    pub green: Vec<u32>,
    pub blue: Vec<u32>,

    /// Share of pixels with luma >= 230, 0-100
    pub highlights_pct: f64,

    /// Share of pixels with luma <= 25, 0-100
    pub shadows_pct: f64,
}

impl Histogram {
    pub fn pixel_count(&self) -> u64 {
        self.luma.iter().map(|&c| c as u64).sum()
    }
}

/// The free-text location columns of a photo.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocationFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl LocationFields {
    /// True when every field holds a non-blank value.
    pub fn is_complete(&self) -> bool {
        [&self.place, &self.city, &self.region, &self.country]
            .iter()
            .all(|f| is_filled(f))
    }

    pub fn is_empty(&self) -> bool {
        [&self.place, &self.city, &self.region, &self.country]
            .iter()
            .all(|f| !is_filled(f))
    }
}

/// Blank strings count as empty so a cleared form field can be refilled.
pub fn is_filled(field: &Option<String>) -> bool {
    field.as_deref().is_some_and(|s| !s.trim().is_empty())
}

/// A reverse-geocoding answer.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeocodedPlace {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub place_name: Option<String>,
}

impl From<GeocodedPlace> for LocationFields {
    fn from(place: GeocodedPlace) -> Self {
        LocationFields {
            place: place.place_name,
            city: place.city,
            region: place.region,
            country: place.country,
        }
    }
}

/// Derived fields written by the finalize step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedFields {
    pub dominant_color: String,
    pub blurhash: String,
    pub dynamic_range_usage: f64,
}

/// Joined select: a photo with everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub photo: Photo,
    pub asset: Asset,
    pub renditions: Vec<PhotoRendition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif: Option<ExifData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram: Option<Histogram>,
}

impl PhotoRecord {
    pub fn rendition(&self, variant: Variant) -> Option<&PhotoRendition> {
        self.renditions.iter().find(|r| r.variant == variant)
    }
}

/// Result of an ingest or reprocess call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestOutcome {
    pub photo_id: Uuid,

    /// URL of the detail rendition
    pub detail_url: String,

    /// `Draft` when a degradable failure left the record for reprocessing
    pub status: PhotoStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orientation_from_dimensions() {
        assert_eq!(
            Orientation::from_dimensions(4000, 3000),
            Orientation::Landscape
        );
        assert_eq!(
            Orientation::from_dimensions(3000, 4000),
            Orientation::Portrait
        );
        assert_eq!(Orientation::from_dimensions(512, 512), Orientation::Square);
    }

    #[test]
    fn test_enum_string_forms_match_serde() {
        for variant in Variant::ALL {
            let json = serde_json::to_string(&variant).unwrap();
            assert_eq!(json, format!("\"{}\"", variant.as_str()));
            assert_eq!(Variant::parse(variant.as_str()), Some(variant));
        }
        assert_eq!(
            serde_json::to_string(&PhotoStatus::Published).unwrap(),
            "\"published\""
        );
        assert_eq!(Visibility::default(), Visibility::Private);
    }

    #[test]
    fn test_location_completeness_ignores_blank_strings() {
        let mut loc = LocationFields {
            place: Some("Ferry Building".to_string()),
            city: Some("San Francisco".to_string()),
            region: Some("California".to_string()),
            country: Some("   ".to_string()),
        };
        assert!(!loc.is_complete());
        assert!(!loc.is_empty());

        loc.country = Some("United States".to_string());
        assert!(loc.is_complete());
        assert!(LocationFields::default().is_empty());
    }

    #[test]
    fn test_exif_gps_requires_both_coordinates() {
        let mut exif = ExifData {
            gps_latitude: Some(37.7749),
            ..Default::default()
        };
        assert_eq!(exif.gps(), None);
        exif.gps_longitude = Some(-122.4194);
        assert_eq!(exif.gps(), Some((37.7749, -122.4194)));
    }

    #[test]
    fn test_exif_serialization_skips_none() {
        let exif = ExifData {
            camera_make: Some("Fujifilm".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&exif).unwrap();
        assert_eq!(json, r#"{"camera_make":"Fujifilm"}"#);
    }
}
