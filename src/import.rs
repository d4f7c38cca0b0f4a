mod compressed;
mod exif;
mod raw;

use image::DynamicImage;

use crate::{
    error_code::ErrorCode,
    formats::FormatFamily,
    metadata::Metadata,
    thumbnail::{Bounds, Thumbnail, ThumbnailError},
    tmp_file::ArcTmpDir,
};

pub(crate) use compressed::CompressedImporter;
pub(crate) use raw::RawImporter;

#[cfg(test)]
pub(crate) use self::exif::tests::{tiff_block, with_exif};

#[derive(Debug, thiserror::Error)]
pub(crate) enum ImportError {
    #[error("Failed to decode image")]
    Decode(#[source] image::ImageError),

    #[error("Failed to decode RAW image: {0}")]
    Raw(String),

    #[error("Sensor layout cannot be developed")]
    Develop,

    #[error("No metadata could be read from image")]
    Describe(#[source] image::ImageError),

    #[error("Failed to generate thumbnail")]
    Thumbnail(#[from] ThumbnailError),

    #[error("Failed to stage RAW file")]
    Io(#[from] std::io::Error),
}

impl ImportError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Decode(_) | Self::Raw(_) | Self::Develop => ErrorCode::DECODE_IMAGE,
            Self::Describe(_) => ErrorCode::DESCRIBE_IMAGE,
            Self::Thumbnail(_) => ErrorCode::GENERATE_THUMBNAIL,
            Self::Io(_) => ErrorCode::IO_ERROR,
        }
    }

    /// Whether the uploaded bytes themselves are at fault
    pub(crate) const fn is_client_error(&self) -> bool {
        !matches!(self, Self::Io(_))
    }
}

/// Decoder configuration, built once at startup and shared by every upload
#[derive(Clone, Debug)]
pub(crate) struct Importers {
    tmp_dir: ArcTmpDir,
    bounds: Bounds,
}

impl Importers {
    pub(crate) fn new(tmp_dir: ArcTmpDir, bounds: Bounds) -> Self {
        Importers { tmp_dir, bounds }
    }

    pub(crate) fn for_format(&self, family: FormatFamily) -> Importer {
        let strategy = match family {
            FormatFamily::Raw(format) => {
                Strategy::Raw(RawImporter::new(format, self.tmp_dir.clone()))
            }
            FormatFamily::Compressed(format) => {
                Strategy::Compressed(CompressedImporter::new(format))
            }
        };

        Importer {
            strategy,
            bounds: self.bounds,
        }
    }
}

#[derive(Clone, Debug)]
enum Strategy {
    Raw(RawImporter),
    Compressed(CompressedImporter),
}

/// Format-specific decoding resolved once from a [`FormatFamily`]
#[derive(Clone, Debug)]
pub(crate) struct Importer {
    strategy: Strategy,
    bounds: Bounds,
}

impl Importer {
    pub(crate) fn image(&self, bytes: &[u8]) -> Result<DynamicImage, ImportError> {
        match &self.strategy {
            Strategy::Raw(raw) => raw.image(bytes),
            Strategy::Compressed(compressed) => compressed.image(bytes),
        }
    }

    pub(crate) fn describe(&self, bytes: &[u8]) -> Result<Metadata, ImportError> {
        match &self.strategy {
            Strategy::Raw(raw) => raw.describe(bytes),
            Strategy::Compressed(compressed) => compressed.describe(bytes),
        }
    }

    pub(crate) fn thumbnail(&self, bytes: &[u8]) -> Result<Thumbnail, ImportError> {
        let image = self.image(bytes)?;

        Ok(crate::thumbnail::thumbnail(&image, self.bounds)?)
    }
}
