use std::io::Cursor;

use image::{DynamicImage, ImageReader};
use time::OffsetDateTime;

use crate::{formats::CompressedFormat, metadata::Metadata};

use super::{exif, ImportError};

/// Strategy for formats the `image` crate decodes natively
#[derive(Clone, Copy, Debug)]
pub(crate) struct CompressedImporter {
    format: CompressedFormat,
}

impl CompressedImporter {
    pub(super) const fn new(format: CompressedFormat) -> Self {
        CompressedImporter { format }
    }

    fn reader<'a>(&self, bytes: &'a [u8]) -> Result<ImageReader<Cursor<&'a [u8]>>, image::ImageError> {
        let mut reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;

        if reader.format().is_none() {
            reader.set_format(self.format.image_format());
        }

        Ok(reader)
    }

    pub(super) fn image(&self, bytes: &[u8]) -> Result<DynamicImage, ImportError> {
        self.reader(bytes)
            .and_then(|reader| reader.decode())
            .map_err(ImportError::Decode)
    }

    /// EXIF first, header dimensions as the fallback.
    ///
    /// Fails only when neither the EXIF block nor the image header can be read. The header
    /// fallback reports nothing but the dimensions.
    pub(super) fn describe(&self, bytes: &[u8]) -> Result<Metadata, ImportError> {
        let mut metadata = Metadata::empty(OffsetDateTime::now_utc());

        let dimensions = self.reader(bytes).and_then(|reader| reader.into_dimensions());

        match (exif::read(bytes), dimensions) {
            (Ok(exif), dimensions) => {
                metadata.size = bytes.len() as u64;

                if let Ok((width, height)) = dimensions {
                    metadata.width = width;
                    metadata.height = height;
                }

                exif::apply(&exif, &mut metadata);
            }
            (Err(e), Ok((width, height))) => {
                tracing::debug!("No usable EXIF, falling back to header: {e}");

                metadata.width = width;
                metadata.height = height;
            }
            (Err(_), Err(e)) => return Err(ImportError::Describe(e)),
        }

        Ok(metadata)
    }
}
