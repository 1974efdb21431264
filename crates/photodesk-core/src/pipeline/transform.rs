//! Image transform engine: orientation-aware decode, fit-inside resize,
//! JPEG re-encode, channel statistics and the perceptual hash.
//!
//! Everything here is synchronous and CPU-bound; the orchestrator calls it
//! from `spawn_blocking`. Functions take the original bytes by reference and
//! never mutate shared state, so tiers can be generated one after another
//! from the same buffer.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageReader};
use std::io::Cursor;

use super::hash::blurhash_encode;
use crate::error::TransformError;

/// Side of the raster the perceptual hash is computed over.
pub const PERCEPTUAL_HASH_SIZE: u32 = 32;

/// A re-encoded JPEG rendition.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` and rotate/flip according to the embedded orientation tag.
///
/// Bytes in a format the decoder cannot identify are `Unsupported`; an
/// identified but malformed or truncated stream is `Decode`.
pub fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage, TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode(format!("cannot read header: {e}")))?;

    if reader.format().is_none() {
        return Err(TransformError::Unsupported(
            "unrecognised image signature".to_string(),
        ));
    }

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| classify_image_error(&e))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(|e| classify_image_error(&e))?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn classify_image_error(err: &image::ImageError) -> TransformError {
    match err {
        image::ImageError::Unsupported(_) => TransformError::Unsupported(err.to_string()),
        _ => TransformError::Decode(err.to_string()),
    }
}

/// Dimensions that fit inside a `max_dimension` square, preserving aspect
/// ratio and never enlarging. Each side is at least 1.
pub fn fit_inside(width: u32, height: u32, max_dimension: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let longest = width.max(height);
    if longest <= max_dimension {
        return (width, height);
    }
    let scale = max_dimension as f64 / longest as f64;
    let fit = |side: u32| ((side as f64 * scale).round() as u32).clamp(1, max_dimension);
    (fit(width), fit(height))
}

/// Decode, auto-orient, convert to 8-bit RGB, fit inside `max_dimension`
/// and encode as JPEG at `quality`.
pub fn resize_and_encode(
    bytes: &[u8],
    max_dimension: u32,
    quality: u8,
) -> Result<EncodedImage, TransformError> {
    let image = decode_oriented(bytes)?;
    encode_rendition(&image, max_dimension, quality)
}

/// Resize an already decoded image and encode it as JPEG.
pub fn encode_rendition(
    image: &DynamicImage,
    max_dimension: u32,
    quality: u8,
) -> Result<EncodedImage, TransformError> {
    let (src_w, src_h) = image.dimensions();
    let (width, height) = fit_inside(src_w, src_h, max_dimension);

    // 8-bit RGB: drops alpha and narrows 16-bit/float sources
    let rgb = if (width, height) == (src_w, src_h) {
        image.to_rgb8()
    } else {
        image
            .resize_exact(width, height, FilterType::Lanczos3)
            .to_rgb8()
    };

    let mut bytes = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
    DynamicImage::ImageRgb8(rgb)
        .write_with_encoder(encoder)
        .map_err(|e| TransformError::Encode(e.to_string()))?;

    Ok(EncodedImage {
        bytes,
        width,
        height,
    })
}

/// Per-channel mean over every pixel, alpha ignored.
pub fn channel_means(image: &DynamicImage) -> [u8; 3] {
    fn mean<'a>(pixels: impl Iterator<Item = &'a [u8]>) -> [u8; 3] {
        let mut sum = [0u64; 3];
        let mut count = 0u64;
        for px in pixels {
            sum[0] += px[0] as u64;
            sum[1] += px[1] as u64;
            sum[2] += px[2] as u64;
            count += 1;
        }
        if count == 0 {
            return [0, 0, 0];
        }
        let avg = |s: u64| ((s as f64 / count as f64).round() as u64).min(255) as u8;
        [avg(sum[0]), avg(sum[1]), avg(sum[2])]
    }

    match image {
        DynamicImage::ImageRgb8(buf) => mean(buf.as_raw().chunks_exact(3)),
        DynamicImage::ImageRgba8(buf) => mean(buf.as_raw().chunks_exact(4)),
        other => mean(other.to_rgb8().as_raw().chunks_exact(3)),
    }
}

/// Format an RGB triplet as lowercase `#rrggbb`.
pub fn to_hex_color(rgb: [u8; 3]) -> String {
    format!("#{:02x}{:02x}{:02x}", rgb[0], rgb[1], rgb[2])
}

/// Dominant color of an encoded image.
pub fn dominant_color(bytes: &[u8]) -> Result<String, TransformError> {
    let image = decode_oriented(bytes)?;
    Ok(to_hex_color(channel_means(&image)))
}

/// Blurhash of an encoded image, computed over a 32x32 fit-inside downsample.
pub fn perceptual_hash(
    bytes: &[u8],
    components_x: u32,
    components_y: u32,
) -> Result<String, TransformError> {
    let image = decode_oriented(bytes)?;
    let (width, height) = fit_inside(image.width(), image.height(), PERCEPTUAL_HASH_SIZE);
    let small = image.thumbnail_exact(width, height).to_rgba8();
    blurhash_encode(
        small.as_raw(),
        small.width(),
        small.height(),
        components_x,
        components_y,
    )
}
