//! Content checksums and the blurhash encoder.
//!
//! Checksums are lowercase hex SHA-256 over raw bytes, so identical uploads
//! always collide on the Asset checksum. Blurhash follows the reference
//! algorithm (sRGB linearisation, cosine basis, base-83 packing) and produces
//! strings any standard decoder understands.

use sha2::{Digest, Sha256};
use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::error::TransformError;

const BASE83: &[u8; 83] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz#$%*+,-.:;=?@[]^_{|}~";

/// Lowercase hex SHA-256 of `data`.
pub fn content_checksum(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Encode an RGBA8 raster as a blurhash with `components_x` by
/// `components_y` frequency components (each 1-9).
pub fn blurhash_encode(
    rgba: &[u8],
    width: u32,
    height: u32,
    components_x: u32,
    components_y: u32,
) -> Result<String, TransformError> {
    if !(1..=9).contains(&components_x) || !(1..=9).contains(&components_y) {
        return Err(TransformError::Encode(format!(
            "blurhash components must be 1-9, got {components_x}x{components_y}"
        )));
    }
    if width == 0 || height == 0 {
        return Err(TransformError::Encode("blurhash of an empty image".into()));
    }
    let (w, h) = (width as usize, height as usize);
    if rgba.len() < w * h * 4 {
        return Err(TransformError::Encode(format!(
            "raster holds {} bytes, {}x{} RGBA needs {}",
            rgba.len(),
            w,
            h,
            w * h * 4
        )));
    }

    let linear = linear_table();
    let scale = 1.0 / (w * h) as f64;
    let mut factors: Vec<[f64; 3]> = Vec::with_capacity((components_x * components_y) as usize);

    for j in 0..components_y {
        for i in 0..components_x {
            let normalisation = if i == 0 && j == 0 { 1.0 } else { 2.0 };
            let mut sum = [0.0f64; 3];
            for y in 0..h {
                let basis_y = (PI * j as f64 * y as f64 / h as f64).cos();
                let row = &rgba[y * w * 4..(y + 1) * w * 4];
                for (x, px) in row.chunks_exact(4).enumerate() {
                    let basis =
                        normalisation * (PI * i as f64 * x as f64 / w as f64).cos() * basis_y;
                    sum[0] += basis * linear[px[0] as usize];
                    sum[1] += basis * linear[px[1] as usize];
                    sum[2] += basis * linear[px[2] as usize];
                }
            }
            factors.push([sum[0] * scale, sum[1] * scale, sum[2] * scale]);
        }
    }

    let dc = factors[0];
    let ac = &factors[1..];

    let mut hash = String::with_capacity(4 + 2 * factors.len());
    encode83((components_x - 1) + (components_y - 1) * 9, 1, &mut hash);

    let max_value = if ac.is_empty() {
        encode83(0, 1, &mut hash);
        1.0
    } else {
        let actual_max = ac
            .iter()
            .flat_map(|f| f.iter())
            .fold(0.0f64, |m, v| m.max(v.abs()));
        let quantised = (actual_max * 166.0 - 0.5).floor().clamp(0.0, 82.0) as u32;
        encode83(quantised, 1, &mut hash);
        (quantised + 1) as f64 / 166.0
    };

    encode83(encode_dc(dc), 4, &mut hash);
    for factor in ac {
        encode83(encode_ac(*factor, max_value), 2, &mut hash);
    }

    Ok(hash)
}

fn encode83(value: u32, length: u32, out: &mut String) {
    for i in 1..=length {
        let digit = (value / 83u32.pow(length - i)) % 83;
        out.push(BASE83[digit as usize] as char);
    }
}

fn encode_dc(value: [f64; 3]) -> u32 {
    (linear_to_srgb(value[0]) << 16) + (linear_to_srgb(value[1]) << 8) + linear_to_srgb(value[2])
}

fn encode_ac(value: [f64; 3], max_value: f64) -> u32 {
    let quant = |v: f64| (sign_pow(v / max_value, 0.5) * 9.0 + 9.5).floor().clamp(0.0, 18.0) as u32;
    quant(value[0]) * 19 * 19 + quant(value[1]) * 19 + quant(value[2])
}

fn sign_pow(value: f64, exp: f64) -> f64 {
    value.abs().powf(exp).copysign(value)
}

fn srgb_to_linear(value: u8) -> f64 {
    let v = value as f64 / 255.0;
    if v <= 0.04045 {
        v / 12.92
    } else {
        ((v + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_to_srgb(value: f64) -> u32 {
    let v = value.clamp(0.0, 1.0);
    if v <= 0.003_130_8 {
        (v * 12.92 * 255.0 + 0.5).trunc() as u32
    } else {
        ((1.055 * v.powf(1.0 / 2.4) - 0.055) * 255.0 + 0.5).trunc() as u32
    }
}

fn linear_table() -> &'static [f64; 256] {
    static TABLE: OnceLock<[f64; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0.0; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            *slot = srgb_to_linear(i as u8);
        }
        table
    })
}
