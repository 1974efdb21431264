//! Input validation before decode.
//!
//! The accepted set is fixed: JPEG, PNG and WebP. The format is sniffed from
//! magic bytes; the declared content type is only consulted when sniffing is
//! inconclusive.

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// An upload format the pipeline accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptedFormat {
    Jpeg,
    Png,
    WebP,
}

impl AcceptedFormat {
    /// Identify the format from the leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 4 {
            return None;
        }

        // JPEG: FF D8 FF
        if bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
            return Some(AcceptedFormat::Jpeg);
        }

        // PNG: 89 50 4E 47
        if bytes[0] == 0x89 && bytes[1] == b'P' && bytes[2] == b'N' && bytes[3] == b'G' {
            return Some(AcceptedFormat::Png);
        }

        // WebP: RIFF....WEBP
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            return Some(AcceptedFormat::WebP);
        }

        None
    }

    /// Whether the leading bytes belong to a known image format outside the
    /// accepted set. Such uploads are unsupported rather than corrupt.
    pub fn is_foreign_image(bytes: &[u8]) -> bool {
        if bytes.len() < 4 {
            return false;
        }
        let gif = &bytes[0..4] == b"GIF8";
        let bmp = bytes[0] == b'B' && bytes[1] == b'M';
        let tiff = bytes[0..4] == [b'I', b'I', 0x2A, 0x00] || bytes[0..4] == [b'M', b'M', 0x00, 0x2A];
        let ftyp = bytes.len() >= 12 && &bytes[4..8] == b"ftyp";
        gif || bmp || tiff || ftyp
    }

    /// Map a declared MIME type onto the accepted set.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(AcceptedFormat::Jpeg),
            "image/png" => Some(AcceptedFormat::Png),
            "image/webp" => Some(AcceptedFormat::WebP),
            _ => None,
        }
    }

    /// Map a file extension onto the accepted set.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(AcceptedFormat::Jpeg),
            "png" => Some(AcceptedFormat::Png),
            "webp" => Some(AcceptedFormat::WebP),
            _ => None,
        }
    }

    /// Extension used for the stored original's key.
    pub fn extension(&self) -> &'static str {
        match self {
            AcceptedFormat::Jpeg => "jpg",
            AcceptedFormat::Png => "png",
            AcceptedFormat::WebP => "webp",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            AcceptedFormat::Jpeg => "image/jpeg",
            AcceptedFormat::Png => "image/png",
            AcceptedFormat::WebP => "image/webp",
        }
    }
}

/// Validates uploads before the decoder sees them.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check size and format, returning the format to decode as.
    ///
    /// Checks:
    /// - Payload is non-empty and within the byte limit
    /// - Sniffed format (or the declared type when sniffing is inconclusive)
    ///   is in the accepted set
    pub fn validate(
        &self,
        name: &str,
        bytes: &[u8],
        content_type: Option<&str>,
    ) -> Result<AcceptedFormat, PipelineError> {
        let max_bytes = self.limits.max_upload_bytes();
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::PayloadTooLarge {
                name: name.to_string(),
                size_bytes: bytes.len() as u64,
                max_bytes,
            });
        }

        if bytes.is_empty() {
            return Err(PipelineError::Decode {
                name: name.to_string(),
                message: "Empty upload".to_string(),
            });
        }

        if let Some(format) = AcceptedFormat::sniff(bytes) {
            return Ok(format);
        }

        if AcceptedFormat::is_foreign_image(bytes) {
            return Err(PipelineError::UnsupportedFormat {
                name: name.to_string(),
                format: "unaccepted image signature".to_string(),
            });
        }

        match content_type {
            Some(declared) => AcceptedFormat::from_content_type(declared).ok_or_else(|| {
                PipelineError::UnsupportedFormat {
                    name: name.to_string(),
                    format: declared.to_string(),
                }
            }),
            None => Err(PipelineError::UnsupportedFormat {
                name: name.to_string(),
                format: "unknown".to_string(),
            }),
        }
    }

    /// Reject images whose oriented dimensions are zero or over the limit.
    pub fn check_dimensions(&self, name: &str, width: u32, height: u32) -> Result<(), PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::MissingDimensions {
                name: name.to_string(),
            });
        }
        let max_dim = self.limits.max_image_dimension;
        if width > max_dim || height > max_dim {
            return Err(PipelineError::ImageTooLarge {
                name: name.to_string(),
                width,
                height,
                max_dim,
            });
        }
        Ok(())
    }
}
