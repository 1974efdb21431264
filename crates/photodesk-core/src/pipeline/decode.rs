//! Decode-and-validate phase: orientation-aware decode on the blocking pool
//! under a timeout, yielding the oriented dimensions.

use image::GenericImageView;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::transform::decode_oriented;
use super::validate::{AcceptedFormat, Validator};
use crate::config::LimitsConfig;
use crate::error::{PipelineError, TransformError};

/// Image decoder with configurable limits and timeout.
pub struct ImageDecoder {
    limits: LimitsConfig,
}

/// What the pipeline keeps from a decode. Pixels are dropped right away;
/// renditions decode again from the original bytes one tier at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedImage {
    pub format: AcceptedFormat,
    /// Width after applying the orientation tag
    pub width: u32,
    /// Height after applying the orientation tag
    pub height: u32,
}

impl ImageDecoder {
    /// Create a new decoder with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode `bytes` on the blocking pool and check its oriented dimensions.
    pub async fn decode(
        &self,
        bytes: Arc<Vec<u8>>,
        name: &str,
        format: AcceptedFormat,
    ) -> Result<DecodedImage, PipelineError> {
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let decode_result = timeout(timeout_duration, async {
            tokio::task::spawn_blocking(move || {
                decode_oriented(&bytes).map(|image| image.dimensions())
            })
            .await
        })
        .await;

        let (width, height) = match decode_result {
            Ok(Ok(Ok(dims))) => dims,
            Ok(Ok(Err(TransformError::Unsupported(message)))) => {
                return Err(PipelineError::UnsupportedFormat {
                    name: name.to_string(),
                    format: message,
                })
            }
            Ok(Ok(Err(e))) => {
                return Err(PipelineError::Decode {
                    name: name.to_string(),
                    message: e.to_string(),
                })
            }
            Ok(Err(e)) => {
                return Err(PipelineError::Decode {
                    name: name.to_string(),
                    message: format!("Task join error: {}", e),
                })
            }
            Err(_) => {
                return Err(PipelineError::Timeout {
                    name: name.to_string(),
                    stage: "decode".to_string(),
                    timeout_ms: self.limits.decode_timeout_ms,
                })
            }
        };

        Validator::new(self.limits.clone()).check_dimensions(name, width, height)?;

        Ok(DecodedImage {
            format,
            width,
            height,
        })
    }
}
