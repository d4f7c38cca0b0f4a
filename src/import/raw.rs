use std::path::Path;

use image::{DynamicImage, RgbImage};
use rawloader::{RawImage, RawImageData};
use time::OffsetDateTime;

use crate::{formats::RawFormat, metadata::Metadata, tmp_file::ArcTmpDir};

use super::{exif, ImportError};

const GAMMA: f32 = 1.0 / 2.2;

/// Strategy for camera RAW containers.
///
/// rawloader only reads from paths, so every call stages the bytes in a temporary file that
/// is removed before returning.
#[derive(Clone, Debug)]
pub(crate) struct RawImporter {
    format: RawFormat,
    tmp_dir: ArcTmpDir,
}

impl RawImporter {
    pub(super) fn new(format: RawFormat, tmp_dir: ArcTmpDir) -> Self {
        RawImporter { format, tmp_dir }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(format = ?self.format))]
    fn decode(&self, bytes: &[u8]) -> Result<RawImage, ImportError> {
        let tmp_file = self.tmp_dir.tmp_file(Some(self.format.file_extension()));

        std::fs::write(&tmp_file, bytes)?;

        let path: &Path = &tmp_file;
        let res = match std::panic::catch_unwind(move || rawloader::decode_file(path)) {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(ImportError::Raw(format!("{e:?}"))),
            Err(_) => Err(ImportError::Raw(String::from("decoder panicked"))),
        };

        if let Err(e) = tmp_file.cleanup() {
            tracing::warn!("Failed to remove staged RAW file: {e}");
        }

        res
    }

    pub(super) fn image(&self, bytes: &[u8]) -> Result<DynamicImage, ImportError> {
        let raw = self.decode(bytes)?;

        develop(&raw).map(DynamicImage::ImageRgb8)
    }

    /// Dimensions and camera names come from the decoder, exposure tags from the container's
    /// EXIF block when it has one.
    pub(super) fn describe(&self, bytes: &[u8]) -> Result<Metadata, ImportError> {
        let raw = self.decode(bytes)?;

        let mut metadata = Metadata::empty(OffsetDateTime::now_utc());
        metadata.size = bytes.len() as u64;

        match exif::read(bytes) {
            Ok(exif) => exif::apply(&exif, &mut metadata),
            Err(e) => tracing::debug!("No usable EXIF in RAW container: {e}"),
        }

        let (width, height) = cropped_dimensions(&raw);
        metadata.width = width as u32;
        metadata.height = height as u32;

        if let Some(make) = non_empty(&raw.clean_make).or_else(|| non_empty(&raw.make)) {
            metadata.camera_make = make;
        }
        if let Some(model) = non_empty(&raw.clean_model).or_else(|| non_empty(&raw.model)) {
            metadata.camera_model = model;
        }

        Ok(metadata)
    }
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();

    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

fn cropped_dimensions(raw: &RawImage) -> (usize, usize) {
    let [top, right, bottom, left] = raw.crops;

    (
        raw.width.saturating_sub(left + right),
        raw.height.saturating_sub(top + bottom),
    )
}

fn develop(raw: &RawImage) -> Result<RgbImage, ImportError> {
    let samples = match &raw.data {
        RawImageData::Integer(data) => Samples::Integer(data),
        RawImageData::Float(data) => Samples::Float(data),
    };

    let (black, white) = match samples {
        Samples::Integer(_) => (
            raw.blacklevels.map(f32::from),
            raw.whitelevels.map(f32::from),
        ),
        Samples::Float(_) => ([0.0; 4], [1.0; 4]),
    };

    let sensor = Sensor {
        width: raw.width,
        height: raw.height,
        cpp: raw.cpp,
        crops: raw.crops,
        samples,
        black,
        white,
        wb: raw.wb_coeffs,
        color_at: |row: usize, col: usize| raw.cfa.color_at(row, col),
    };

    sensor.develop()
}

#[derive(Clone, Copy)]
pub(crate) enum Samples<'a> {
    Integer(&'a [u16]),
    Float(&'a [f32]),
}

impl Samples<'_> {
    fn get(&self, index: usize) -> Option<f32> {
        match self {
            Self::Integer(data) => data.get(index).copied().map(f32::from),
            Self::Float(data) => data.get(index).copied(),
        }
    }
}

/// Sensor readout with the levels needed to turn it into display RGB
pub(crate) struct Sensor<'a, F> {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) cpp: usize,
    /// top, right, bottom, left
    pub(crate) crops: [usize; 4],
    pub(crate) samples: Samples<'a>,
    pub(crate) black: [f32; 4],
    pub(crate) white: [f32; 4],
    pub(crate) wb: [f32; 4],
    pub(crate) color_at: F,
}

impl<F> Sensor<'_, F>
where
    F: Fn(usize, usize) -> usize,
{
    fn white_balance(&self) -> [f32; 4] {
        let green = self.wb[1];

        if !green.is_finite() || green <= 0.0 {
            return [1.0; 4];
        }

        let mut wb = [1.0; 4];
        for (i, coeff) in self.wb.iter().enumerate() {
            wb[i] = if coeff.is_finite() && *coeff > 0.0 {
                coeff / green
            } else {
                1.0
            };
        }
        wb
    }

    fn normalize(&self, value: f32, color: usize, wb: &[f32; 4]) -> f32 {
        let color = color.min(3);
        let range = (self.white[color] - self.black[color]).max(f32::EPSILON);
        let linear = ((value - self.black[color]) / range).clamp(0.0, 1.0);

        (linear * wb[color]).clamp(0.0, 1.0)
    }

    fn encode(value: f32) -> u8 {
        (value.powf(GAMMA) * 255.0).round() as u8
    }

    /// Develops the readout into an RGB image.
    ///
    /// Mosaiced sensors are reduced with a 2x2 super-pixel, producing half the cropped
    /// resolution. Sensors with three components per pixel keep their resolution.
    pub(crate) fn develop(&self) -> Result<RgbImage, ImportError> {
        let [top, right, bottom, left] = self.crops;
        let crop_width = self.width.saturating_sub(left + right);
        let crop_height = self.height.saturating_sub(top + bottom);

        let wb = self.white_balance();

        match self.cpp {
            1 => {
                let out_width = crop_width / 2;
                let out_height = crop_height / 2;

                if out_width == 0 || out_height == 0 {
                    return Err(ImportError::Develop);
                }

                let mut image = RgbImage::new(out_width as u32, out_height as u32);

                for (x, y, pixel) in image.enumerate_pixels_mut() {
                    let mut sums = [0.0f32; 3];
                    let mut counts = [0u32; 3];

                    for (dy, dx) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                        let row = top + 2 * y as usize + dy;
                        let col = left + 2 * x as usize + dx;

                        let Some(value) = self.samples.get(row * self.width + col) else {
                            continue;
                        };

                        let color = (self.color_at)(row, col);
                        let channel = if color == 3 { 1 } else { color.min(2) };

                        sums[channel] += self.normalize(value, color, &wb);
                        counts[channel] += 1;
                    }

                    let green = if counts[1] > 0 {
                        sums[1] / counts[1] as f32
                    } else {
                        0.0
                    };
                    let channel = |i: usize| {
                        if counts[i] > 0 {
                            sums[i] / counts[i] as f32
                        } else {
                            green
                        }
                    };

                    pixel.0 = [
                        Self::encode(channel(0)),
                        Self::encode(green),
                        Self::encode(channel(2)),
                    ];
                }

                Ok(image)
            }
            3 => {
                if crop_width == 0 || crop_height == 0 {
                    return Err(ImportError::Develop);
                }

                let mut image = RgbImage::new(crop_width as u32, crop_height as u32);

                for (x, y, pixel) in image.enumerate_pixels_mut() {
                    let row = top + y as usize;
                    let col = left + x as usize;
                    let base = (row * self.width + col) * 3;

                    for (channel, out) in pixel.0.iter_mut().enumerate() {
                        let value = self.samples.get(base + channel).unwrap_or(0.0);
                        *out = Self::encode(self.normalize(value, channel, &wb));
                    }
                }

                Ok(image)
            }
            _ => Err(ImportError::Develop),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Samples, Sensor};

    // RGGB
    fn bayer(row: usize, col: usize) -> usize {
        match (row % 2, col % 2) {
            (0, 0) => 0,
            (1, 1) => 2,
            _ => 1,
        }
    }

    fn mosaic(width: usize, height: usize, r: u16, g: u16, b: u16) -> Vec<u16> {
        let mut data = Vec::with_capacity(width * height);

        for row in 0..height {
            for col in 0..width {
                data.push(match bayer(row, col) {
                    0 => r,
                    2 => b,
                    _ => g,
                });
            }
        }

        data
    }

    #[test]
    fn super_pixel_halves_resolution() {
        let data = mosaic(6, 4, 1000, 500, 250);

        let sensor = Sensor {
            width: 6,
            height: 4,
            cpp: 1,
            crops: [0; 4],
            samples: Samples::Integer(&data),
            black: [0.0; 4],
            white: [1000.0; 4],
            wb: [1.0, 1.0, 1.0, f32::NAN],
            color_at: bayer,
        };

        let image = sensor.develop().expect("Developed");
        assert_eq!(image.dimensions(), (3, 2));

        for pixel in image.pixels() {
            let [r, g, b] = pixel.0;
            assert_eq!(r, 255);
            assert!(r > g && g > b, "{:?}", pixel.0);
        }
    }

    #[test]
    fn black_level_clips_to_zero() {
        let data = mosaic(2, 2, 100, 100, 100);

        let sensor = Sensor {
            width: 2,
            height: 2,
            cpp: 1,
            crops: [0; 4],
            samples: Samples::Integer(&data),
            black: [128.0; 4],
            white: [4095.0; 4],
            wb: [2.0, 1.0, 1.5, 1.0],
            color_at: bayer,
        };

        let image = sensor.develop().expect("Developed");
        assert_eq!(image.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn white_balance_scales_channels() {
        let data = mosaic(2, 2, 250, 250, 250);

        let sensor = Sensor {
            width: 2,
            height: 2,
            cpp: 1,
            crops: [0; 4],
            samples: Samples::Integer(&data),
            black: [0.0; 4],
            white: [1000.0; 4],
            wb: [4.0, 1.0, 1.0, 1.0],
            color_at: bayer,
        };

        let [r, g, b] = sensor.develop().expect("Developed").get_pixel(0, 0).0;
        assert_eq!(r, 255);
        assert_eq!(g, b);
        assert!(g < r);
    }

    #[test]
    fn crops_are_respected() {
        let data = mosaic(8, 6, 1000, 1000, 1000);

        let sensor = Sensor {
            width: 8,
            height: 6,
            cpp: 1,
            crops: [2, 2, 0, 2],
            samples: Samples::Integer(&data),
            black: [0.0; 4],
            white: [1000.0; 4],
            wb: [1.0; 4],
            color_at: bayer,
        };

        assert_eq!(sensor.develop().expect("Developed").dimensions(), (2, 2));
    }

    #[test]
    fn linear_rgb_keeps_resolution() {
        let data: Vec<f32> = [1.0, 0.0, 0.0].repeat(3 * 2);

        let sensor = Sensor {
            width: 3,
            height: 2,
            cpp: 3,
            crops: [0; 4],
            samples: Samples::Float(&data),
            black: [0.0; 4],
            white: [1.0; 4],
            wb: [1.0; 4],
            color_at: bayer,
        };

        let image = sensor.develop().expect("Developed");
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(2, 1).0, [255, 0, 0]);
    }

    #[test]
    fn too_small_sensor_is_rejected() {
        let data = [0u16; 1];

        let sensor = Sensor {
            width: 1,
            height: 1,
            cpp: 1,
            crops: [0; 4],
            samples: Samples::Integer(&data),
            black: [0.0; 4],
            white: [1.0; 4],
            wb: [1.0; 4],
            color_at: bayer,
        };

        assert!(sensor.develop().is_err());
    }
}
