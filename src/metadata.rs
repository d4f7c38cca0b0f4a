use time::OffsetDateTime;

/// Camera and technical attributes of one image.
///
/// Numeric fields are zero and strings are empty when the source tag is missing.
#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Metadata {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) size: u64,

    pub(crate) camera_make: String,
    pub(crate) camera_model: String,
    pub(crate) software: String,
    pub(crate) lens_make: String,
    pub(crate) lens_model: String,

    pub(crate) iso: u32,

    /// f-number
    pub(crate) aperture: f64,

    /// Exposure time in seconds
    pub(crate) shutter_speed: f64,

    #[serde(with = "time::serde::rfc3339::option", default)]
    pub(crate) captured_at: Option<OffsetDateTime>,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,
}

impl Metadata {
    pub(crate) fn empty(now: OffsetDateTime) -> Self {
        Metadata {
            width: 0,
            height: 0,
            size: 0,
            camera_make: String::new(),
            camera_model: String::new(),
            software: String::new(),
            lens_make: String::new(),
            lens_model: String::new(),
            iso: 0,
            aperture: 0.0,
            shutter_speed: 0.0,
            captured_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
