//! EXIF metadata extraction from original bytes.

use chrono::NaiveDateTime;
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::io::Cursor;

use crate::types::ExifData;

/// Extracts EXIF metadata from in-memory images.
pub struct MetadataExtractor;

impl MetadataExtractor {
    /// Extract EXIF data from an encoded image.
    ///
    /// Returns `None` if the image has no EXIF data or if extraction fails.
    /// Parser panics are caught and treated as missing EXIF. Partial data is
    /// returned when only some fields parse.
    pub fn extract_from_bytes(bytes: &[u8]) -> Option<ExifData> {
        match std::panic::catch_unwind(|| Self::extract_inner(bytes)) {
            Ok(data) => data,
            Err(_) => {
                tracing::warn!("EXIF parser panicked; continuing without EXIF");
                None
            }
        }
    }

    fn extract_inner(bytes: &[u8]) -> Option<ExifData> {
        let mut cursor = Cursor::new(bytes);
        let exif = match Reader::new().read_from_container(&mut cursor) {
            Ok(exif) => exif,
            Err(e) => {
                tracing::trace!("No EXIF: {e}");
                return None;
            }
        };

        let data = ExifData {
            captured_at: Self::get_datetime(&exif),
            camera_make: Self::get_string(&exif, Tag::Make),
            camera_model: Self::get_string(&exif, Tag::Model),
            lens_make: Self::get_string(&exif, Tag::LensMake),
            lens_model: Self::get_string(&exif, Tag::LensModel),
            focal_length: Self::get_f64(&exif, Tag::FocalLength),
            f_number: Self::get_f64(&exif, Tag::FNumber),
            exposure_time: Self::get_exposure_time(&exif),
            iso: Self::get_u32(&exif, Tag::PhotographicSensitivity),
            exposure_bias: Self::get_f64(&exif, Tag::ExposureBiasValue),
            gps_latitude: Self::get_gps_coord(&exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
            gps_longitude: Self::get_gps_coord(&exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
            gps_altitude: Self::get_gps_altitude(&exif),
            orientation: Self::get_u32(&exif, Tag::Orientation),
        };

        if data == ExifData::default() {
            None
        } else {
            Some(data)
        }
    }

    /// ASCII field with NULs and padding stripped; blank values are `None`.
    fn get_string(exif: &Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        Self::ascii(field)
    }

    fn ascii(field: &Field) -> Option<String> {
        match &field.value {
            Value::Ascii(parts) => {
                let raw = parts.first()?;
                let s = String::from_utf8_lossy(raw);
                let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
                (!s.is_empty()).then(|| s.to_string())
            }
            _ => None,
        }
    }

    fn get_u32(exif: &Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Short(v) => v.first().map(|&x| x as u32),
                Value::Long(v) => v.first().copied(),
                _ => None,
            })
    }

    /// First rational (signed or unsigned) as f64; zero denominators are dropped.
    fn get_f64(exif: &Exif, tag: Tag) -> Option<f64> {
        let value = match &exif.get_field(tag, In::PRIMARY)?.value {
            Value::Rational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
            Value::SRational(v) => v.first().filter(|r| r.denom != 0).map(|r| r.to_f64()),
            _ => None,
        }?;
        value.is_finite().then_some(value)
    }

    /// Capture time, preferring DateTimeOriginal over DateTime.
    fn get_datetime(exif: &Exif) -> Option<NaiveDateTime> {
        let field = exif
            .get_field(Tag::DateTimeOriginal, In::PRIMARY)
            .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))?;
        let raw = Self::ascii(field)?;
        NaiveDateTime::parse_from_str(&raw, "%Y:%m:%d %H:%M:%S").ok()
    }

    /// Shutter speed as a string (e.g. "1/1000" or "2.5").
    fn get_exposure_time(exif: &Exif) -> Option<String> {
        let field = exif.get_field(Tag::ExposureTime, In::PRIMARY)?;
        match &field.value {
            Value::Rational(v) => {
                let r = v.first().filter(|r| r.denom != 0 && r.num != 0)?;
                if r.num < r.denom {
                    let denom = (r.denom as f64 / r.num as f64).round();
                    Some(format!("1/{denom}"))
                } else {
                    let secs = r.to_f64();
                    if secs.fract() == 0.0 {
                        Some(format!("{secs}"))
                    } else {
                        Some(format!("{secs:.1}"))
                    }
                }
            }
            _ => None,
        }
    }

    /// GPS coordinate, converting from degrees/minutes/seconds to decimal.
    fn get_gps_coord(exif: &Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
        let coord = exif.get_field(coord_tag, In::PRIMARY)?;
        let reference = exif.get_field(ref_tag, In::PRIMARY)?;

        let degrees = Self::parse_gps_rationals(&coord.value)?;
        let ref_str = Self::ascii(reference).unwrap_or_default();

        // S and W hemispheres are negative
        let sign = if ref_str.starts_with('S') || ref_str.starts_with('W') {
            -1.0
        } else {
            1.0
        };

        Some(sign * degrees)
    }

    fn parse_gps_rationals(value: &Value) -> Option<f64> {
        match value {
            Value::Rational(rationals)
                if rationals.len() >= 3 && rationals.iter().take(3).all(|r| r.denom != 0) =>
            {
                let degrees = rationals[0].to_f64();
                let minutes = rationals[1].to_f64();
                let seconds = rationals[2].to_f64();
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        }
    }

    /// Altitude in metres; reference byte 1 means below sea level.
    fn get_gps_altitude(exif: &Exif) -> Option<f64> {
        let altitude = Self::get_f64(exif, Tag::GPSAltitude)?;
        let below = exif
            .get_field(Tag::GPSAltitudeRef, In::PRIMARY)
            .and_then(|f| match &f.value {
                Value::Byte(v) => v.first().copied(),
                _ => None,
            })
            == Some(1);
        Some(if below { -altitude } else { altitude })
    }
}
