use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage};

use crate::config;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ThumbnailError {
    #[error("Image has no pixels")]
    Empty,

    #[error("Failed to encode thumbnail")]
    Encode(#[from] image::ImageError),
}

/// Bounding box every thumbnail is fitted into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Bounds {
    pub(crate) max_width: u32,
    pub(crate) max_height: u32,
    pub(crate) quality: u8,
    pub(crate) allow_upscale: bool,
}

impl From<&config::Thumbnail> for Bounds {
    fn from(config: &config::Thumbnail) -> Self {
        Bounds {
            max_width: config.max_width,
            max_height: config.max_height,
            quality: config.quality,
            allow_upscale: config.allow_upscale,
        }
    }
}

pub(crate) struct Thumbnail {
    pub(crate) bytes: Vec<u8>,
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl std::fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnail")
            .field("bytes", &self.bytes.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Dimensions of `width` x `height` scaled by `min(max_width / width, max_height / height)`,
/// rounded down and never smaller than one pixel.
///
/// Computed in integers so the limiting side lands exactly on its bound.
pub(crate) fn scaled_dimensions(width: u32, height: u32, bounds: Bounds) -> Option<(u32, u32)> {
    if width == 0 || height == 0 || bounds.max_width == 0 || bounds.max_height == 0 {
        return None;
    }

    if !bounds.allow_upscale && width <= bounds.max_width && height <= bounds.max_height {
        return Some((width, height));
    }

    let (w, h) = (u64::from(width), u64::from(height));
    let (max_w, max_h) = (u64::from(bounds.max_width), u64::from(bounds.max_height));

    let (new_w, new_h) = if w * max_h >= h * max_w {
        (max_w, h * max_w / w)
    } else {
        (w * max_h / h, max_h)
    };

    Some((new_w.max(1) as u32, new_h.max(1) as u32))
}

/// Nearest-neighbor resample of `image` into its bounded size, encoded as JPEG
#[tracing::instrument(level = "debug", skip(image), fields(width = image.width(), height = image.height()))]
pub(crate) fn thumbnail(image: &DynamicImage, bounds: Bounds) -> Result<Thumbnail, ThumbnailError> {
    let (width, height) =
        scaled_dimensions(image.width(), image.height(), bounds).ok_or(ThumbnailError::Empty)?;

    let resized = image.resize_exact(width, height, FilterType::Nearest);
    let rgb = resized.to_rgb8();

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, bounds.quality).encode_image(&rgb)?;

    Ok(Thumbnail {
        bytes,
        width,
        height,
    })
}
