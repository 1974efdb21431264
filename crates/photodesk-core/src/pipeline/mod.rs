//! Photo ingestion pipeline.
//!
//! - **validate**: size limits and magic-byte sniffing
//! - **decode**: orientation-aware decode under a timeout
//! - **transform**: renditions, channel means and the perceptual hash
//! - **metadata**: EXIF extraction
//! - **stats**: histograms and dynamic range
//! - **hash**: SHA-256 checksums and blurhash encoding
//! - **retry**: backoff wrapper for transient collaborator failures
//! - **compensation**: undo log for partially completed runs
//! - **ingest**: the orchestrator tying the phases together
//! - **discovery**: finding local originals for batch ingestion

pub mod compensation;
pub mod decode;
pub mod discovery;
pub mod hash;
pub mod ingest;
pub mod metadata;
pub mod retry;
pub mod stats;
pub mod transform;
pub mod validate;

pub use compensation::{Compensation, CompensationStack};
pub use decode::{DecodedImage, ImageDecoder};
pub use discovery::{FileDiscovery, LocalOriginal};
pub use hash::{blurhash_encode, content_checksum};
pub use ingest::{needs_reprocessing, Ingestor, StoredUpload, Upload};
pub use metadata::MetadataExtractor;
pub use retry::{with_retry, with_retry_when, RetryOutcome, RetryPolicy};
pub use stats::{compute_histogram, dynamic_range_usage, histogram_from_bytes};
pub use transform::{
    channel_means, dominant_color, fit_inside, perceptual_hash, resize_and_encode, to_hex_color,
    EncodedImage,
};
pub use validate::{AcceptedFormat, Validator};
