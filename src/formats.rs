mod compressed;
mod mimes;
mod raw;

pub(crate) use compressed::CompressedFormat;
pub(crate) use raw::RawFormat;

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Unsupported format {0:?}")]
pub(crate) struct UnsupportedFormat(pub(crate) String);

/// Decoding strategy for an uploaded file
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum FormatFamily {
    Raw(RawFormat),
    Compressed(CompressedFormat),
}

impl FormatFamily {
    pub(crate) fn media_type(self) -> mime::Mime {
        match self {
            Self::Raw(format) => format.media_type(),
            Self::Compressed(format) => format.media_type(),
        }
    }

    pub(crate) const fn is_raw(self) -> bool {
        matches!(self, Self::Raw(_))
    }
}

/// Lowercases and trims an extension token, dropping any leading dot
pub(crate) fn normalize_format(extension: &str) -> String {
    extension.trim().trim_start_matches('.').trim().to_lowercase()
}

/// The raw extension token of a filename, empty when there is none
pub(crate) fn extension_of(filename: &str) -> &str {
    match filename.trim().rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => extension,
        _ => "",
    }
}

pub(crate) fn classify(extension: &str) -> Result<FormatFamily, UnsupportedFormat> {
    let normalized = normalize_format(extension);

    if let Some(format) = RawFormat::from_extension(&normalized) {
        return Ok(FormatFamily::Raw(format));
    }

    if let Some(format) = CompressedFormat::from_extension(&normalized) {
        return Ok(FormatFamily::Compressed(format));
    }

    Err(UnsupportedFormat(normalized))
}

#[cfg(test)]
mod tests {
    use super::{
        classify, extension_of, normalize_format, CompressedFormat, FormatFamily, RawFormat,
        UnsupportedFormat,
    };

    const RAW: &[&str] = &[
        "3fr", "ari", "arw", "cr2", "crw", "dcr", "dcs", "dng", "erf", "iiq", "kdc", "mef", "mos",
        "mrw", "nef", "nrw", "orf", "pef", "raf", "rw2", "rwl", "sr2", "srf", "srw",
    ];

    const COMPRESSED: &[&str] = &[
        "jpg", "jpeg", "jpe", "png", "gif", "webp", "tif", "tiff", "bmp",
    ];

    #[test]
    fn every_raw_extension_is_raw() {
        for ext in RAW {
            let family = classify(ext).expect("Classified");
            assert!(family.is_raw(), "{ext} should be raw");
        }
    }

    #[test]
    fn every_compressed_extension_is_compressed() {
        for ext in COMPRESSED {
            let family = classify(ext).expect("Classified");
            assert!(
                matches!(family, FormatFamily::Compressed(_)),
                "{ext} should be compressed"
            );
        }
    }

    #[test]
    fn families_do_not_overlap() {
        for ext in RAW {
            assert!(CompressedFormat::from_extension(ext).is_none(), "{ext}");
        }
        for ext in COMPRESSED {
            assert!(RawFormat::from_extension(ext).is_none(), "{ext}");
        }
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        for ext in ["xyz", "", "mp4", "heic", "jpg2", "raw"] {
            assert_eq!(
                classify(ext),
                Err(UnsupportedFormat(String::from(ext))),
                "{ext:?}"
            );
        }
    }

    #[test]
    fn classification_ignores_case_and_whitespace() {
        assert_eq!(
            classify("  .NEF "),
            Ok(FormatFamily::Raw(RawFormat::Nef))
        );
        assert_eq!(
            classify("JPEG"),
            Ok(FormatFamily::Compressed(CompressedFormat::Jpeg))
        );
        assert_eq!(classify("Jpg"), classify("jpg"));
    }

    #[test]
    fn normalize() {
        assert_eq!(normalize_format(" CR2\n"), "cr2");
        assert_eq!(normalize_format(".Png"), "png");
        assert_eq!(normalize_format("   "), "");
    }

    #[test]
    fn extensions() {
        assert_eq!(extension_of("DSC_0001.NEF"), "NEF");
        assert_eq!(extension_of("archive.tar.gz"), "gz");
        assert_eq!(extension_of("README"), "");
        assert_eq!(extension_of(".hidden"), "");
    }
}
