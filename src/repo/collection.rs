use time::OffsetDateTime;

use super::{CollectionId, PhotoId, UserId};

/// Photos created together by one upload request
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Collection {
    pub(crate) id: CollectionId,
    pub(crate) owner: UserId,
    pub(crate) name: String,
    pub(crate) photo_ids: Vec<PhotoId>,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,
}
