//! SQLite backend implementation.
//!
//! One connection behind a mutex; every call runs on the blocking pool.

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

use super::schema::SCHEMA;
use super::{fillable, not_found, PhotoStore};
use crate::error::{StoreError, StoreResult};
use crate::types::{
    Asset, AssetKind, DerivedFields, ExifData, Histogram, LocationFields, Orientation, Photo,
    PhotoRecord, PhotoRendition, PhotoStatus, Variant, Visibility,
};

const ASSET_COLUMNS: &str =
    "id, kind, url, width, height, byte_size, checksum, created_at, updated_at, created_by";

const PHOTO_COLUMNS: &str = "id, title, description, captured_at, uploaded_at, asset_id, \
     storage_id, width, height, aspect_ratio, orientation, megapixels, place, city, region, \
     country, latitude, longitude, dominant_color, blurhash, dynamic_range_usage, is_visible, \
     status, visibility, created_at, updated_at, created_by";

const RENDITION_COLUMNS: &str =
    "id, photo_id, variant, url, width, height, byte_size, checksum, created_at, updated_at";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("cannot create {}: {}", parent.display(), e))
                })?;
            }
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::initialize(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> StoreResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn call<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("store task failed: {e}")))?
    }
}

// ============================================================================
// Row mapping
// ============================================================================

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn uuid_at(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e.to_string()))
}

fn enum_at<T>(row: &Row, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    parse(&s).ok_or_else(|| conversion_error(idx, format!("unknown value {s:?}")))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s).map_err(|e| conversion_error(idx, e.to_string()))
}

fn asset_from_row(row: &Row) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: uuid_at(row, 0)?,
        kind: enum_at(row, 1, AssetKind::parse)?,
        url: row.get(2)?,
        width: row.get(3)?,
        height: row.get(4)?,
        byte_size: row.get::<_, i64>(5)? as u64,
        checksum: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        created_by: row.get(9)?,
    })
}

fn photo_from_row(row: &Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: uuid_at(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        captured_at: row.get(3)?,
        uploaded_at: row.get(4)?,
        asset_id: uuid_at(row, 5)?,
        storage_id: uuid_at(row, 6)?,
        width: row.get(7)?,
        height: row.get(8)?,
        aspect_ratio: row.get(9)?,
        orientation: enum_at(row, 10, Orientation::parse)?,
        megapixels: row.get(11)?,
        place: row.get(12)?,
        city: row.get(13)?,
        region: row.get(14)?,
        country: row.get(15)?,
        latitude: row.get(16)?,
        longitude: row.get(17)?,
        dominant_color: row.get(18)?,
        blurhash: row.get(19)?,
        dynamic_range_usage: row.get(20)?,
        is_visible: row.get(21)?,
        status: enum_at(row, 22, PhotoStatus::parse)?,
        visibility: enum_at(row, 23, Visibility::parse)?,
        created_at: row.get(24)?,
        updated_at: row.get(25)?,
        created_by: row.get(26)?,
    })
}

fn rendition_from_row(row: &Row) -> rusqlite::Result<PhotoRendition> {
    Ok(PhotoRendition {
        id: uuid_at(row, 0)?,
        photo_id: uuid_at(row, 1)?,
        variant: enum_at(row, 2, Variant::parse)?,
        url: row.get(3)?,
        width: row.get(4)?,
        height: row.get(5)?,
        byte_size: row.get::<_, i64>(6)? as u64,
        checksum: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

fn histogram_from_row(row: &Row) -> rusqlite::Result<Histogram> {
    Ok(Histogram {
        luma: json_at(row, 0)?,
        red: json_at(row, 1)?,
        green: json_at(row, 2)?,
        blue: json_at(row, 3)?,
        highlights_pct: row.get(4)?,
        shadows_pct: row.get(5)?,
    })
}

/// Unique and foreign-key violations become `Conflict`.
fn insert_error(e: rusqlite::Error, what: String) -> StoreError {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(format!("{what}: {e}"))
        }
        _ => StoreError::Sqlite(e),
    }
}

fn query_location(conn: &Connection, id: &str) -> rusqlite::Result<Option<LocationFields>> {
    conn.query_row(
        "SELECT place, city, region, country FROM photos WHERE id = ?",
        [id],
        |row| {
            Ok(LocationFields {
                place: row.get(0)?,
                city: row.get(1)?,
                region: row.get(2)?,
                country: row.get(3)?,
            })
        },
    )
    .optional()
}

#[async_trait]
impl PhotoStore for SqliteStore {
    async fn insert_asset(&self, asset: &Asset) -> StoreResult<()> {
        let asset = asset.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO assets ({ASSET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    asset.id.to_string(),
                    asset.kind.as_str(),
                    asset.url,
                    asset.width,
                    asset.height,
                    asset.byte_size as i64,
                    asset.checksum,
                    asset.created_at,
                    asset.updated_at,
                    asset.created_by,
                ],
            )
            .map_err(|e| insert_error(e, format!("asset {}", asset.id)))?;
            Ok(())
        })
        .await
    }

    async fn delete_asset(&self, id: Uuid) -> StoreResult<()> {
        self.call(move |conn| {
            conn.execute("DELETE FROM assets WHERE id = ?", [id.to_string()])?;
            Ok(())
        })
        .await
    }

    async fn find_asset_by_checksum(&self, checksum: &str) -> StoreResult<Option<Asset>> {
        let checksum = checksum.to_string();
        self.call(move |conn| {
            let asset = conn
                .query_row(
                    &format!(
                        "SELECT {ASSET_COLUMNS} FROM assets WHERE checksum = ? \
                         ORDER BY created_at LIMIT 1"
                    ),
                    [checksum],
                    asset_from_row,
                )
                .optional()?;
            Ok(asset)
        })
        .await
    }

    async fn insert_photo(&self, photo: &Photo) -> StoreResult<()> {
        let p = photo.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO photos ({PHOTO_COLUMNS}) VALUES \
                     (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    p.id.to_string(),
                    p.title,
                    p.description,
                    p.captured_at,
                    p.uploaded_at,
                    p.asset_id.to_string(),
                    p.storage_id.to_string(),
                    p.width,
                    p.height,
                    p.aspect_ratio,
                    p.orientation.as_str(),
                    p.megapixels,
                    p.place,
                    p.city,
                    p.region,
                    p.country,
                    p.latitude,
                    p.longitude,
                    p.dominant_color,
                    p.blurhash,
                    p.dynamic_range_usage,
                    p.is_visible,
                    p.status.as_str(),
                    p.visibility.as_str(),
                    p.created_at,
                    p.updated_at,
                    p.created_by,
                ],
            )
            .map_err(|e| insert_error(e, format!("photo {}", p.id)))?;
            Ok(())
        })
        .await
    }

    async fn delete_photo(&self, id: Uuid) -> StoreResult<()> {
        self.call(move |conn| {
            let id = id.to_string();
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM photo_renditions WHERE photo_id = ?", [&id])?;
            tx.execute("DELETE FROM photo_exif WHERE photo_id = ?", [&id])?;
            tx.execute("DELETE FROM photo_histograms WHERE photo_id = ?", [&id])?;
            tx.execute("DELETE FROM photos WHERE id = ?", [&id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn insert_exif(&self, photo_id: Uuid, exif: &ExifData) -> StoreResult<()> {
        let data = serde_json::to_string(exif)?;
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO photo_exif (photo_id, data) VALUES (?, ?)",
                rusqlite::params![photo_id.to_string(), data],
            )
            .map_err(|e| insert_error(e, format!("exif for {photo_id}")))?;
            Ok(())
        })
        .await
    }

    async fn insert_rendition(&self, rendition: &PhotoRendition) -> StoreResult<()> {
        let r = rendition.clone();
        self.call(move |conn| {
            conn.execute(
                &format!(
                    "INSERT INTO photo_renditions ({RENDITION_COLUMNS}) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
                ),
                rusqlite::params![
                    r.id.to_string(),
                    r.photo_id.to_string(),
                    r.variant.as_str(),
                    r.url,
                    r.width,
                    r.height,
                    r.byte_size as i64,
                    r.checksum,
                    r.created_at,
                    r.updated_at,
                ],
            )
            .map_err(|e| insert_error(e, format!("{} rendition for {}", r.variant, r.photo_id)))?;
            Ok(())
        })
        .await
    }

    async fn delete_renditions(&self, photo_id: Uuid) -> StoreResult<usize> {
        self.call(move |conn| {
            let removed = conn.execute(
                "DELETE FROM photo_renditions WHERE photo_id = ?",
                [photo_id.to_string()],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn insert_histogram(&self, photo_id: Uuid, histogram: &Histogram) -> StoreResult<()> {
        let luma = serde_json::to_string(&histogram.luma)?;
        let red = serde_json::to_string(&histogram.red)?;
        let green = serde_json::to_string(&histogram.green)?;
        let blue = serde_json::to_string(&histogram.blue)?;
        let (highlights, shadows) = (histogram.highlights_pct, histogram.shadows_pct);
        self.call(move |conn| {
            conn.execute(
                "INSERT INTO photo_histograms \
                 (photo_id, luma, red, green, blue, highlights_pct, shadows_pct) \
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                rusqlite::params![
                    photo_id.to_string(),
                    luma,
                    red,
                    green,
                    blue,
                    highlights,
                    shadows
                ],
            )
            .map_err(|e| insert_error(e, format!("histogram for {photo_id}")))?;
            Ok(())
        })
        .await
    }

    async fn delete_histogram(&self, photo_id: Uuid) -> StoreResult<()> {
        self.call(move |conn| {
            conn.execute(
                "DELETE FROM photo_histograms WHERE photo_id = ?",
                [photo_id.to_string()],
            )?;
            Ok(())
        })
        .await
    }

    async fn finalize_photo(&self, photo_id: Uuid, derived: &DerivedFields) -> StoreResult<()> {
        let derived = derived.clone();
        self.call(move |conn| {
            let updated = conn.execute(
                r#"
                UPDATE photos
                SET dominant_color = ?, blurhash = ?, dynamic_range_usage = ?,
                    status = 'published', visibility = 'public', is_visible = 1,
                    updated_at = ?
                WHERE id = ?
                "#,
                rusqlite::params![
                    derived.dominant_color,
                    derived.blurhash,
                    derived.dynamic_range_usage,
                    chrono::Utc::now(),
                    photo_id.to_string(),
                ],
            )?;
            if updated == 0 {
                return Err(not_found("photo", photo_id));
            }
            Ok(())
        })
        .await
    }

    async fn location(&self, photo_id: Uuid) -> StoreResult<Option<LocationFields>> {
        self.call(move |conn| Ok(query_location(conn, &photo_id.to_string())?))
            .await
    }

    async fn fill_location(
        &self,
        photo_id: Uuid,
        candidate: &LocationFields,
    ) -> StoreResult<LocationFields> {
        let candidate = candidate.clone();
        self.call(move |conn| {
            let id = photo_id.to_string();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let current = query_location(&tx, &id)?.ok_or_else(|| not_found("photo", photo_id))?;
            let writes = fillable(&current, &candidate);
            if !writes.is_empty() {
                tx.execute(
                    r#"
                    UPDATE photos
                    SET place = COALESCE(?, place), city = COALESCE(?, city),
                        region = COALESCE(?, region), country = COALESCE(?, country),
                        updated_at = ?
                    WHERE id = ?
                    "#,
                    rusqlite::params![
                        writes.place,
                        writes.city,
                        writes.region,
                        writes.country,
                        chrono::Utc::now(),
                        id,
                    ],
                )?;
            }
            tx.commit()?;
            Ok(writes)
        })
        .await
    }

    async fn get_photo(&self, id: Uuid) -> StoreResult<Option<PhotoRecord>> {
        self.call(move |conn| {
            let id_str = id.to_string();
            let Some(photo) = conn
                .query_row(
                    &format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?"),
                    [&id_str],
                    photo_from_row,
                )
                .optional()?
            else {
                return Ok(None);
            };

            let asset = conn
                .query_row(
                    &format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = ?"),
                    [photo.asset_id.to_string()],
                    asset_from_row,
                )
                .optional()?
                .ok_or_else(|| not_found("asset", photo.asset_id))?;

            let mut stmt = conn.prepare(&format!(
                "SELECT {RENDITION_COLUMNS} FROM photo_renditions WHERE photo_id = ?"
            ))?;
            let mut renditions = stmt
                .query_map([&id_str], rendition_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            renditions.sort_by_key(|r| r.variant);

            let exif: Option<String> = conn
                .query_row(
                    "SELECT data FROM photo_exif WHERE photo_id = ?",
                    [&id_str],
                    |row| row.get(0),
                )
                .optional()?;
            let exif: Option<ExifData> = exif.map(|s| serde_json::from_str(&s)).transpose()?;

            let histogram = conn
                .query_row(
                    "SELECT luma, red, green, blue, highlights_pct, shadows_pct \
                     FROM photo_histograms WHERE photo_id = ?",
                    [&id_str],
                    histogram_from_row,
                )
                .optional()?;

            Ok(Some(PhotoRecord {
                photo,
                asset,
                renditions,
                exif,
                histogram,
            }))
        })
        .await
    }

    async fn list_photos(&self) -> StoreResult<Vec<Photo>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {PHOTO_COLUMNS} FROM photos ORDER BY uploaded_at DESC, id"
            ))?;
            let photos = stmt
                .query_map([], photo_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(photos)
        })
        .await
    }

    async fn distinct_years(&self) -> StoreResult<Vec<i32>> {
        self.call(|conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT DISTINCT CAST(strftime('%Y', captured_at) AS INTEGER) AS year
                FROM photos
                WHERE captured_at IS NOT NULL
                ORDER BY year DESC
                "#,
            )?;
            let years = stmt
                .query_map([], |row| row.get::<_, Option<i32>>(0))?
                .filter_map(|r| r.transpose())
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(years)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests_support;

    #[tokio::test]
    async fn test_store_contract() {
        let store = SqliteStore::open_in_memory().unwrap();
        tests_support::exercise_store(&store).await;
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("photodesk.db");
        let (asset, photo) = tests_support::sample_rows(None);
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_asset(&asset).await.unwrap();
            store.insert_photo(&photo).await.unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        let record = store.get_photo(photo.id).await.unwrap().unwrap();
        assert_eq!(record.photo.storage_id, photo.storage_id);
        assert_eq!(record.asset.checksum, asset.checksum);
        assert_eq!(record.photo.status, PhotoStatus::Draft);
    }

    #[tokio::test]
    async fn test_photo_requires_asset() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (_, photo) = tests_support::sample_rows(None);
        assert!(matches!(
            store.insert_photo(&photo).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
