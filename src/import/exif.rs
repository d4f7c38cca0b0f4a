use std::io::Cursor;

use exif::{Exif, In, Tag, Value};
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::metadata::Metadata;

pub(super) fn read(bytes: &[u8]) -> Result<Exif, exif::Error> {
    exif::Reader::new().read_from_container(&mut Cursor::new(bytes))
}

/// Coerces NaN and infinities to zero
pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// FNumber as a plain fraction
pub(crate) fn aperture(value: &Value) -> f64 {
    rational(value).map(finite_or_zero).unwrap_or(0.0)
}

/// ShutterSpeedValue is APEX encoded, exposure time is `2^-v` seconds
pub(crate) fn shutter_speed(value: &Value) -> f64 {
    rational(value)
        .map(|apex| finite_or_zero((-apex).exp2()))
        .unwrap_or(0.0)
}

fn rational(value: &Value) -> Option<f64> {
    match value {
        Value::Rational(values) => values.first().map(|r| r.to_f64()),
        Value::SRational(values) => values.first().map(|r| r.to_f64()),
        _ => None,
    }
}

fn ascii(exif: &Exif, tag: Tag) -> String {
    let Some(field) = exif.get_field(tag, In::PRIMARY) else {
        return String::new();
    };

    match &field.value {
        Value::Ascii(values) => values
            .first()
            .map(|raw| {
                String::from_utf8_lossy(raw)
                    .trim_matches('\u{0}')
                    .trim()
                    .to_string()
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
}

fn date_time(exif: &Exif, tag: Tag) -> Option<OffsetDateTime> {
    let field = exif.get_field(tag, In::PRIMARY)?;

    let Value::Ascii(values) = &field.value else {
        return None;
    };

    let parsed = exif::DateTime::from_ascii(values.first()?).ok()?;

    let date = Date::from_calendar_date(
        i32::from(parsed.year),
        Month::try_from(parsed.month).ok()?,
        parsed.day,
    )
    .ok()?;
    let time = Time::from_hms(parsed.hour, parsed.minute, parsed.second).ok()?;

    let offset = parsed
        .offset
        .and_then(|minutes| UtcOffset::from_whole_seconds(i32::from(minutes) * 60).ok())
        .unwrap_or(UtcOffset::UTC);

    Some(PrimitiveDateTime::new(date, time).assume_offset(offset))
}

/// Copies every recognized tag into `metadata`, leaving defaults for missing tags
pub(super) fn apply(exif: &Exif, metadata: &mut Metadata) {
    metadata.camera_make = ascii(exif, Tag::Make);
    metadata.camera_model = ascii(exif, Tag::Model);
    metadata.software = ascii(exif, Tag::Software);
    metadata.lens_make = ascii(exif, Tag::LensMake);
    metadata.lens_model = ascii(exif, Tag::LensModel);

    metadata.iso = uint(exif, Tag::PhotographicSensitivity).unwrap_or(0);

    metadata.aperture = exif
        .get_field(Tag::FNumber, In::PRIMARY)
        .map(|field| aperture(&field.value))
        .unwrap_or(0.0);

    metadata.shutter_speed = exif
        .get_field(Tag::ShutterSpeedValue, In::PRIMARY)
        .map(|field| shutter_speed(&field.value))
        .unwrap_or(0.0);

    metadata.captured_at = date_time(exif, Tag::DateTimeOriginal);

    if metadata.width == 0 || metadata.height == 0 {
        metadata.width = uint(exif, Tag::PixelXDimension).unwrap_or(0);
        metadata.height = uint(exif, Tag::PixelYDimension).unwrap_or(0);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use exif::{Rational, SRational, Value};

    use super::{aperture, finite_or_zero, shutter_speed};

    /// Little endian TIFF block with Make, FNumber, ISO and ShutterSpeedValue
    pub(crate) fn tiff_block(
        make: &str,
        f_number: (u32, u32),
        iso: u16,
        shutter: (i32, i32),
    ) -> Vec<u8> {
        let mut make = make.as_bytes().to_vec();
        make.push(0);

        let ifd0_offset = 8u32;
        let ifd0_len = 2 + 2 * 12 + 4;
        let make_offset = ifd0_offset + ifd0_len;
        let exif_offset = make_offset + make.len() as u32;
        let exif_len = 2 + 3 * 12 + 4;
        let f_number_offset = exif_offset + exif_len;
        let shutter_offset = f_number_offset + 8;

        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&ifd0_offset.to_le_bytes());

        let entry = |out: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]| {
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&kind.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&value);
        };

        // IFD0
        out.extend_from_slice(&2u16.to_le_bytes());
        entry(&mut out, 0x010f, 2, make.len() as u32, make_offset.to_le_bytes());
        entry(&mut out, 0x8769, 4, 1, exif_offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&make);

        // Exif IFD
        let [iso_lo, iso_hi] = iso.to_le_bytes();
        out.extend_from_slice(&3u16.to_le_bytes());
        entry(&mut out, 0x829d, 5, 1, f_number_offset.to_le_bytes());
        entry(&mut out, 0x8827, 3, 1, [iso_lo, iso_hi, 0, 0]);
        entry(&mut out, 0x9201, 10, 1, shutter_offset.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());

        out.extend_from_slice(&f_number.0.to_le_bytes());
        out.extend_from_slice(&f_number.1.to_le_bytes());
        out.extend_from_slice(&shutter.0.to_le_bytes());
        out.extend_from_slice(&shutter.1.to_le_bytes());

        out
    }

    /// Splices an APP1 Exif segment directly after the SOI marker of `jpeg`
    pub(crate) fn with_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);

        let len = (2 + 6 + tiff.len()) as u16;

        let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
        out.extend_from_slice(&[0xff, 0xd8, 0xff, 0xe1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend_from_slice(tiff);
        out.extend_from_slice(&jpeg[2..]);
        out
    }

    #[test]
    fn aperture_is_a_plain_fraction() {
        let value = Value::Rational(vec![Rational::from((28, 10))]);
        assert_eq!(aperture(&value), 2.8);
    }

    #[test]
    fn shutter_speed_is_apex_decoded() {
        let value = Value::SRational(vec![SRational::from((6, 1))]);
        assert_eq!(shutter_speed(&value), 0.015625);

        let value = Value::SRational(vec![SRational::from((-1, 1))]);
        assert_eq!(shutter_speed(&value), 2.0);
    }

    #[test]
    fn decoders_are_repeatable() {
        let f = Value::Rational(vec![Rational::from((28, 10))]);
        let s = Value::SRational(vec![SRational::from((7, 3))]);

        assert_eq!(aperture(&f).to_bits(), aperture(&f).to_bits());
        assert_eq!(shutter_speed(&s).to_bits(), shutter_speed(&s).to_bits());
    }

    #[test]
    fn non_finite_values_become_zero() {
        let zero_denominator = Value::Rational(vec![Rational::from((28, 0))]);
        assert_eq!(aperture(&zero_denominator), 0.0);

        let undefined = Value::SRational(vec![SRational::from((0, 0))]);
        assert_eq!(shutter_speed(&undefined), 0.0);

        let overflow = Value::SRational(vec![SRational::from((-5000, 1))]);
        assert_eq!(shutter_speed(&overflow), 0.0);

        assert_eq!(finite_or_zero(f64::NAN), 0.0);
        assert_eq!(finite_or_zero(1.5), 1.5);
    }

    #[test]
    fn unexpected_value_types_become_zero() {
        let value = Value::Ascii(vec![b"f/2.8".to_vec()]);
        assert_eq!(aperture(&value), 0.0);
        assert_eq!(shutter_speed(&value), 0.0);
    }
}
