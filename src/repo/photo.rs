use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::metadata::Metadata;

use super::{PhotoId, UserId};

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Descriptor {
    pub(crate) filename: String,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) uploaded_at: OffsetDateTime,

    /// Normalized file extension, see [`crate::formats::normalize_format`]
    pub(crate) format: String,

    pub(crate) tags: BTreeSet<String>,

    pub(crate) favorite: bool,

    pub(crate) metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, serde::Deserialize, serde::Serialize)]
pub(crate) struct Photo {
    pub(crate) id: PhotoId,
    pub(crate) owner: UserId,
    pub(crate) descriptor: Descriptor,

    /// Combined length of the original and thumbnail bytes, fixed at creation
    pub(crate) used_space: u64,

    /// Hex encoded sha256 of the original bytes
    pub(crate) content_hash: String,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) created_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339")]
    pub(crate) updated_at: OffsetDateTime,

    #[serde(with = "time::serde::rfc3339::option", default)]
    pub(crate) deleted_at: Option<OffsetDateTime>,
}

impl Photo {
    pub(crate) const fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Clone, Debug, Default, serde::Deserialize)]
pub(crate) struct PhotoUpdate {
    pub(crate) tags: Option<BTreeSet<String>>,
    pub(crate) favorite: Option<bool>,
}

impl PhotoUpdate {
    pub(crate) fn apply(&self, photo: &mut Photo, now: OffsetDateTime) {
        if let Some(tags) = &self.tags {
            photo.descriptor.tags = tags
                .iter()
                .map(|tag| tag.trim().to_string())
                .filter(|tag| !tag.is_empty())
                .collect();
        }

        if let Some(favorite) = self.favorite {
            photo.descriptor.favorite = favorite;
        }

        photo.updated_at = now;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub(crate) struct Stats {
    pub(crate) photo_count: u64,
    pub(crate) favorite_count: u64,
    pub(crate) used_space: u64,
}

impl Stats {
    pub(crate) fn add(&mut self, photo: &Photo) {
        if photo.is_deleted() {
            return;
        }

        self.photo_count += 1;
        self.used_space += photo.used_space;

        if photo.descriptor.favorite {
            self.favorite_count += 1;
        }
    }

    pub(crate) fn remove(&mut self, photo: &Photo) {
        if photo.is_deleted() {
            return;
        }

        self.photo_count = self.photo_count.saturating_sub(1);
        self.used_space = self.used_space.saturating_sub(photo.used_space);

        if photo.descriptor.favorite {
            self.favorite_count = self.favorite_count.saturating_sub(1);
        }
    }
}
