//! Pixel statistics: luma and per-channel histograms, clipping percentages
//! and dynamic range usage.

use image::DynamicImage;

use super::transform::decode_oriented;
use crate::error::TransformError;
use crate::types::Histogram;

/// Luma at or above this counts as a highlight.
pub const HIGHLIGHT_THRESHOLD: u8 = 230;

/// Luma at or below this counts as a shadow.
pub const SHADOW_THRESHOLD: u8 = 25;

/// BT.709 luma, rounded and clamped to 0-255.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.2126 * r as f64 + 0.7152 * g as f64 + 0.0722 * b as f64;
    y.round().clamp(0.0, 255.0) as u8
}

/// One pass over every pixel. RGB and RGBA buffers are walked directly
/// (alpha ignored); other layouts are converted to RGB8 first.
pub fn compute_histogram(image: &DynamicImage) -> Histogram {
    match image {
        DynamicImage::ImageRgb8(buf) => accumulate(buf.as_raw(), 3),
        DynamicImage::ImageRgba8(buf) => accumulate(buf.as_raw(), 4),
        other => accumulate(other.to_rgb8().as_raw(), 3),
    }
}

/// Decode `bytes` and compute its histogram.
pub fn histogram_from_bytes(bytes: &[u8]) -> Result<Histogram, TransformError> {
    let image = decode_oriented(bytes)?;
    Ok(compute_histogram(&image))
}

fn accumulate(raw: &[u8], stride: usize) -> Histogram {
    let mut luma_hist = [0u32; 256];
    let mut red = [0u32; 256];
    let mut green = [0u32; 256];
    let mut blue = [0u32; 256];
    let mut highlights = 0u64;
    let mut shadows = 0u64;
    let mut total = 0u64;

    for px in raw.chunks_exact(stride) {
        let (r, g, b) = (px[0], px[1], px[2]);
        let y = luma(r, g, b);
        luma_hist[y as usize] += 1;
        red[r as usize] += 1;
        green[g as usize] += 1;
        blue[b as usize] += 1;
        if y >= HIGHLIGHT_THRESHOLD {
            highlights += 1;
        }
        if y <= SHADOW_THRESHOLD {
            shadows += 1;
        }
        total += 1;
    }

    let pct = |n: u64| {
        if total == 0 {
            0.0
        } else {
            n as f64 * 100.0 / total as f64
        }
    };

    Histogram {
        luma: luma_hist.to_vec(),
        red: red.to_vec(),
        green: green.to_vec(),
        blue: blue.to_vec(),
        highlights_pct: pct(highlights),
        shadows_pct: pct(shadows),
    }
}

/// `max(0, 100 - highlights - shadows)`
pub fn dynamic_range_usage(histogram: &Histogram) -> f64 {
    (100.0 - histogram.highlights_pct - histogram.shadows_pct).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    #[test]
    fn test_luma_coefficients() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(255, 0, 0), 54);
        assert_eq!(luma(0, 255, 0), 182);
        assert_eq!(luma(0, 0, 255), 18);
    }

    #[test]
    fn test_all_black_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 30));
        let hist = compute_histogram(&img);
        assert_eq!(hist.luma[0], 1200);
        assert_eq!(hist.shadows_pct, 100.0);
        assert_eq!(hist.highlights_pct, 0.0);
        assert_eq!(dynamic_range_usage(&hist), 0.0);
    }

    #[test]
    fn test_buckets_sum_to_pixel_count() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(37, 23, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) % 256) as u8])
        }));
        let hist = compute_histogram(&img);
        for channel in [&hist.luma, &hist.red, &hist.green, &hist.blue] {
            assert_eq!(channel.len(), 256);
            assert_eq!(channel.iter().map(|&c| c as u64).sum::<u64>(), 37 * 23);
        }
        assert!(hist.highlights_pct + hist.shadows_pct <= 100.0);
    }

    #[test]
    fn test_alpha_ignored() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 255, 255, 0])));
        let hist = compute_histogram(&img);
        assert_eq!(hist.luma[255], 100);
        assert_eq!(hist.highlights_pct, 100.0);
    }

    #[test]
    fn test_histogram_from_encoded_png() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(16, 9, |x, y| {
            Rgb([(x * 16) as u8, (y * 28) as u8, 200])
        }));
        let mut png = std::io::Cursor::new(Vec::new());
        img.write_to(&mut png, image::ImageFormat::Png).unwrap();

        let from_bytes = histogram_from_bytes(png.get_ref()).unwrap();
        assert_eq!(from_bytes, compute_histogram(&img));
        assert!(histogram_from_bytes(b"not an image").is_err());
    }

    #[test]
    fn test_grayscale_converted() {
        let img = DynamicImage::ImageLuma8(GrayImage::from_pixel(5, 4, Luma([128])));
        let hist = compute_histogram(&img);
        assert_eq!(hist.red[128], 20);
        assert_eq!(hist.luma[128], 20);
    }

    #[test]
    fn test_half_clipped_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([0, 0, 0])
            } else {
                Rgb([255, 255, 255])
            }
        }));
        let hist = compute_histogram(&img);
        assert_eq!(hist.shadows_pct, 50.0);
        assert_eq!(hist.highlights_pct, 50.0);
        assert_eq!(dynamic_range_usage(&hist), 0.0);
    }

    #[test]
    fn test_empty_image_has_zero_percentages() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(0, 0));
        let hist = compute_histogram(&img);
        assert_eq!(hist.highlights_pct, 0.0);
        assert_eq!(hist.shadows_pct, 0.0);
        assert_eq!(dynamic_range_usage(&hist), 100.0);
    }
}
