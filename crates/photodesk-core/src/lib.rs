//! Photodesk Core - photo ingestion pipeline for an admin photo library.
//!
//! An uploaded original becomes a published photo with a content-addressed
//! original, three JPEG renditions, a histogram, a dominant color, a
//! blurhash and EXIF-derived fields. Partial failures either roll back what
//! the run created or leave a draft that `reprocess` can complete.
//!
//! # Architecture
//!
//! ```text
//! Upload → Validate/Decode → EXIF → Baseline rows → Renditions → Stats → Publish
//!                                                                   ↘ geocode queue
//! ```
//!
//! Collaborators sit behind traits: [`storage::BlobStore`] for binaries,
//! [`store::PhotoStore`] for rows and [`geocode::ReverseGeocoder`] for place
//! names.
//!
//! # Usage
//!
//! ```rust,ignore
//! use photodesk_core::{Config, Ingestor, LocalBlobStore, SqliteStore, Upload};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let blobs = LocalBlobStore::new(config.storage_root(), &config.storage.public_base_url).await?;
//!     let store = SqliteStore::open(&config.database_path())?;
//!     let ingestor = Ingestor::new(config, Arc::new(blobs), Arc::new(store));
//!
//!     let bytes = std::fs::read("./harbour.jpg")?;
//!     let outcome = ingestor
//!         .ingest(Upload {
//!             bytes,
//!             filename: "harbour.jpg".into(),
//!             content_type: Some("image/jpeg".into()),
//!             uploader_id: None,
//!             title: None,
//!         })
//!         .await?;
//!     println!("{} is {:?}", outcome.photo_id, outcome.status);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod geocode;
pub mod output;
pub mod pipeline;
pub mod storage;
pub mod store;
pub mod types;

pub use cache::YearsCache;
pub use config::Config;
pub use error::{
    ConfigError, GeocodeError, PhotodeskError, PipelineError, PipelineResult, Result,
    StorageError, StoreError, TransformError,
};
pub use geocode::{
    spawn_geocode_worker, GeocodeEnricher, GeocodeJob, GeocodeOutcome, GeocodeQueue,
    MapboxGeocoder, ReverseGeocoder,
};
pub use output::{IngestReport, OutputWriter};
pub use pipeline::{needs_reprocessing, FileDiscovery, Ingestor, StoredUpload, Upload};
pub use storage::{BlobStore, LocalBlobStore, MemoryBlobStore};
pub use store::{MemoryStore, PhotoStore, SqliteStore};
pub use types::{
    Asset, ExifData, Histogram, IngestOutcome, LocationFields, Photo, PhotoRecord,
    PhotoRendition, PhotoStatus, Variant, Visibility,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
