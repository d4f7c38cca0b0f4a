pub(super) fn image_webp() -> mime::Mime {
    "image/webp".parse().unwrap()
}

pub(super) fn image_tiff() -> mime::Mime {
    "image/tiff".parse().unwrap()
}

pub(super) fn image_x_adobe_dng() -> mime::Mime {
    "image/x-adobe-dng".parse().unwrap()
}

pub(super) fn image_x_canon_cr2() -> mime::Mime {
    "image/x-canon-cr2".parse().unwrap()
}

pub(super) fn image_x_canon_crw() -> mime::Mime {
    "image/x-canon-crw".parse().unwrap()
}

pub(super) fn image_x_fuji_raf() -> mime::Mime {
    "image/x-fuji-raf".parse().unwrap()
}

pub(super) fn image_x_nikon_nef() -> mime::Mime {
    "image/x-nikon-nef".parse().unwrap()
}

pub(super) fn image_x_olympus_orf() -> mime::Mime {
    "image/x-olympus-orf".parse().unwrap()
}

pub(super) fn image_x_panasonic_rw2() -> mime::Mime {
    "image/x-panasonic-rw2".parse().unwrap()
}

pub(super) fn image_x_pentax_pef() -> mime::Mime {
    "image/x-pentax-pef".parse().unwrap()
}

pub(super) fn image_x_sony_arw() -> mime::Mime {
    "image/x-sony-arw".parse().unwrap()
}
