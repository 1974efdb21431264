//! Sub-configuration structs and their defaults.

use crate::pipeline::retry::RetryPolicy;
use crate::types::Variant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for local state (blob root and database default here)
    pub data_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.photodesk"),
        }
    }
}

/// Processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// File extensions picked up by directory discovery
    pub supported_formats: Vec<String>,

    /// Reject byte-identical re-uploads instead of only logging them
    pub reject_duplicates: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            supported_formats: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
            ],
            reject_duplicates: false,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum upload size in megabytes
    pub max_upload_mb: u64,

    /// Maximum image dimension (width or height) after orientation
    pub max_image_dimension: u32,

    /// Decode timeout in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_mb: 50,
            max_image_dimension: 20000,
            decode_timeout_ms: 15000,
        }
    }
}

impl LimitsConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// One rendition tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RenditionSpec {
    /// Longest edge in pixels
    pub max_dimension: u32,

    /// JPEG quality, 1-100
    pub quality: u8,
}

/// Rendition tier settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenditionsConfig {
    pub thumb: RenditionSpec,
    pub list: RenditionSpec,
    pub detail: RenditionSpec,
}

impl Default for RenditionsConfig {
    fn default() -> Self {
        Self {
            thumb: RenditionSpec {
                max_dimension: 320,
                quality: 80,
            },
            list: RenditionSpec {
                max_dimension: 1024,
                quality: 88,
            },
            detail: RenditionSpec {
                max_dimension: 2048,
                quality: 92,
            },
        }
    }
}

impl RenditionsConfig {
    pub fn get(&self, variant: Variant) -> RenditionSpec {
        match variant {
            Variant::Thumb => self.thumb,
            Variant::List => self.list,
            Variant::Detail => self.detail,
        }
    }
}

/// Retry policies per collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Blob reads and uploads
    pub storage: RetryPolicy,

    /// Reverse-geocoding lookups
    pub geocode: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            storage: RetryPolicy {
                max_attempts: 3,
                base_delay_ms: 200,
                max_delay_ms: 2000,
            },
            geocode: RetryPolicy {
                max_attempts: 5,
                base_delay_ms: 250,
                max_delay_ms: 4000,
            },
        }
    }
}

/// Local blob storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory for stored objects
    pub root: PathBuf,

    /// Base URL objects are served under
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.photodesk/blobs"),
            public_base_url: "http://localhost:8080/media".to_string(),
        }
    }
}

/// Relational store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.photodesk/photodesk.db"),
        }
    }
}

/// Reverse-geocoding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeocodeConfig {
    /// Whether to enqueue lookups for photos with GPS data
    pub enabled: bool,

    /// Mapbox-compatible reverse endpoint
    pub endpoint: String,

    /// Access token, supports `${ENV_VAR}` syntax
    pub token: String,

    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Pending jobs buffered before new ones are dropped
    pub queue_size: usize,
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://api.mapbox.com/search/geocode/v6/reverse".to_string(),
            token: "${MAPBOX_TOKEN}".to_string(),
            timeout_ms: 2000,
            queue_size: 64,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct OutputConfig {
    /// Pretty-print JSON output
    pub pretty: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
