//! Error types for the Photodesk ingestion pipeline.
//!
//! Errors are organized by concern so callers can tell a rejected upload
//! (validation) apart from an infrastructure failure that survived retries,
//! and a degradable problem apart from a fatal one.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for Photodesk operations.
#[derive(Error, Debug)]
pub enum PhotodeskError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Blob storage errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Relational store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, organized by the phase that raised them.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image bytes could not be decoded
    #[error("Decode error for {name}: {message}")]
    Decode { name: String, message: String },

    /// Content type / sniffed format is not accepted
    #[error("Unsupported format for {name}: {format}")]
    UnsupportedFormat { name: String, format: String },

    /// Upload exceeds the configured byte limit
    #[error("Upload too large: {name} ({size_bytes} bytes > {max_bytes} bytes)")]
    PayloadTooLarge {
        name: String,
        size_bytes: u64,
        max_bytes: u64,
    },

    /// Image dimensions exceed limit
    #[error("Image too large: {name} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        name: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Decoder produced an image without usable dimensions
    #[error("Image has no usable dimensions: {name}")]
    MissingDimensions { name: String },

    /// Byte-identical content is already stored and duplicates are rejected
    #[error("Duplicate upload: {name} matches asset {asset_id} (sha256 {checksum})")]
    Duplicate {
        name: String,
        asset_id: Uuid,
        checksum: String,
    },

    /// Rendition encoding failed
    #[error("Encoding the {variant} rendition failed: {message}")]
    Encode { variant: String, message: String },

    /// Remote storage operation failed after exhausting retries
    #[error("Storage {operation} failed for {key} after {attempts} attempt(s): {message}")]
    Storage {
        operation: &'static str,
        key: String,
        attempts: u32,
        message: String,
    },

    /// A database write needed for a consistent record failed
    #[error("Persisting {entity} failed: {message}")]
    Persist {
        entity: &'static str,
        message: String,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {name} after {timeout_ms}ms")]
    Timeout {
        name: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Photo lookup failed
    #[error("Photo not found: {0}")]
    PhotoNotFound(Uuid),

    /// The original blob key cannot be derived from the asset URL
    #[error("Cannot recover the original storage key from asset url {0}")]
    UnrecoverableKey(String),
}

impl PipelineError {
    /// Whether the error is a rejection of the input rather than an
    /// infrastructure failure. Validation errors never leave a record behind.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Decode { .. }
                | PipelineError::UnsupportedFormat { .. }
                | PipelineError::PayloadTooLarge { .. }
                | PipelineError::ImageTooLarge { .. }
                | PipelineError::MissingDimensions { .. }
                | PipelineError::Duplicate { .. }
        )
    }
}

/// Errors raised by the pure image transforms.
///
/// `Decode` and `Unsupported` are kept apart so callers can choose between
/// rejecting an upload and degrading a derived field.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransformError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("unsupported image type: {0}")]
    Unsupported(String),

    #[error("cannot encode image: {0}")]
    Encode(String),
}

/// Blob storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Missing objects, rejected keys and permission problems are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NotFound(_) | StorageError::InvalidKey(_) => false,
            StorageError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::NotFound
                    | std::io::ErrorKind::PermissionDenied
                    | std::io::ErrorKind::InvalidInput
            ),
            StorageError::Backend(_) => true,
        }
    }
}

/// Relational store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// Unique constraint violation
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Column encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Reverse geocoding errors.
#[derive(Error, Debug)]
pub enum GeocodeError {
    /// HTTP-level failure; `status_code` is set when the server answered
    #[error("Geocoding request failed: {message}")]
    Http {
        message: String,
        status_code: Option<u16>,
    },

    #[error("Geocoding request timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to parse geocoding response: {0}")]
    Parse(String),
}

impl GeocodeError {
    /// Determine whether a geocoding error is worth retrying.
    ///
    /// Retryable: timeouts, rate limits (429), server errors (5xx), and
    /// connection failures without a status. Auth failures and bad requests
    /// are permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeocodeError::Timeout(_) => true,
            GeocodeError::Http {
                status_code,
                message,
            } => {
                if let Some(code) = status_code {
                    return *code == 429 || (500..=599).contains(code);
                }
                message.contains("timed out") || message.contains("connect")
            }
            GeocodeError::Parse(_) => false,
        }
    }
}

/// Convenience type alias for Photodesk results.
pub type Result<T> = std::result::Result<T, PhotodeskError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Convenience type alias for store results.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Convenience type alias for blob storage results.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
