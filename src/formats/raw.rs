/// Camera RAW containers understood by rawloader
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum RawFormat {
    ThreeFr,
    Ari,
    Arw,
    Cr2,
    Crw,
    Dcr,
    Dcs,
    Dng,
    Erf,
    Iiq,
    Kdc,
    Mef,
    Mos,
    Mrw,
    Nef,
    Nrw,
    Orf,
    Pef,
    Raf,
    Rw2,
    Rwl,
    Sr2,
    Srf,
    Srw,
}

impl RawFormat {
    pub(crate) fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension {
            "3fr" => Self::ThreeFr,
            "ari" => Self::Ari,
            "arw" => Self::Arw,
            "cr2" => Self::Cr2,
            "crw" => Self::Crw,
            "dcr" => Self::Dcr,
            "dcs" => Self::Dcs,
            "dng" => Self::Dng,
            "erf" => Self::Erf,
            "iiq" => Self::Iiq,
            "kdc" => Self::Kdc,
            "mef" => Self::Mef,
            "mos" => Self::Mos,
            "mrw" => Self::Mrw,
            "nef" => Self::Nef,
            "nrw" => Self::Nrw,
            "orf" => Self::Orf,
            "pef" => Self::Pef,
            "raf" => Self::Raf,
            "rw2" => Self::Rw2,
            "rwl" => Self::Rwl,
            "sr2" => Self::Sr2,
            "srf" => Self::Srf,
            "srw" => Self::Srw,
            _ => return None,
        };

        Some(format)
    }

    pub(crate) const fn file_extension(self) -> &'static str {
        match self {
            Self::ThreeFr => ".3fr",
            Self::Ari => ".ari",
            Self::Arw => ".arw",
            Self::Cr2 => ".cr2",
            Self::Crw => ".crw",
            Self::Dcr => ".dcr",
            Self::Dcs => ".dcs",
            Self::Dng => ".dng",
            Self::Erf => ".erf",
            Self::Iiq => ".iiq",
            Self::Kdc => ".kdc",
            Self::Mef => ".mef",
            Self::Mos => ".mos",
            Self::Mrw => ".mrw",
            Self::Nef => ".nef",
            Self::Nrw => ".nrw",
            Self::Orf => ".orf",
            Self::Pef => ".pef",
            Self::Raf => ".raf",
            Self::Rw2 => ".rw2",
            Self::Rwl => ".rwl",
            Self::Sr2 => ".sr2",
            Self::Srf => ".srf",
            Self::Srw => ".srw",
        }
    }

    pub(crate) fn media_type(self) -> mime::Mime {
        match self {
            Self::Arw | Self::Sr2 | Self::Srf => super::mimes::image_x_sony_arw(),
            Self::Cr2 => super::mimes::image_x_canon_cr2(),
            Self::Crw => super::mimes::image_x_canon_crw(),
            Self::Dng => super::mimes::image_x_adobe_dng(),
            Self::Nef | Self::Nrw => super::mimes::image_x_nikon_nef(),
            Self::Orf => super::mimes::image_x_olympus_orf(),
            Self::Pef => super::mimes::image_x_pentax_pef(),
            Self::Raf => super::mimes::image_x_fuji_raf(),
            Self::Rw2 | Self::Rwl => super::mimes::image_x_panasonic_rw2(),
            _ => mime::APPLICATION_OCTET_STREAM,
        }
    }
}
