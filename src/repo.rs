use std::{fmt::Debug, sync::Arc};

use uuid::Uuid;

use crate::{config, error_code::ErrorCode};

mod collection;
mod photo;
pub(crate) mod sled;
mod user;

pub(crate) use collection::Collection;
pub(crate) use photo::{Descriptor, Photo, PhotoUpdate, Stats};
pub(crate) use user::{Role, User};

pub(crate) type ArcRepo = Arc<dyn FullRepo>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum RepoError {
    #[error("Error in sled")]
    SledError(#[from] self::sled::SledError),

    #[error("Record already exists")]
    AlreadyExists,
}

impl RepoError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::SledError(e) => e.error_code(),
            Self::AlreadyExists => ErrorCode::CONFLICTED_RECORD,
        }
    }
}

macro_rules! id_type {
    ($name:ident) => {
        #[derive(
            Clone,
            Copy,
            Debug,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Deserialize,
            serde::Serialize,
        )]
        #[serde(transparent)]
        pub(crate) struct $name {
            id: Uuid,
        }

        impl $name {
            pub(crate) fn generate() -> Self {
                Self { id: Uuid::now_v7() }
            }

            pub(crate) fn as_bytes(&self) -> &[u8; 16] {
                self.id.as_bytes()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self { id }
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self { id: s.parse()? })
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.id, f)
            }
        }
    };
}

id_type!(PhotoId);
id_type!(UserId);
id_type!(CollectionId);

#[async_trait::async_trait(?Send)]
pub(crate) trait FullRepo: PhotoRepo + UserRepo + CollectionRepo + Send + Sync + Debug {
    async fn health_check(&self) -> Result<(), RepoError>;
}

/// Descriptor persistence for uploaded photos.
///
/// Photo rows cache their used space so aggregate usage never touches the binary store.
#[async_trait::async_trait(?Send)]
pub(crate) trait PhotoRepo {
    async fn create_photo(&self, photo: &Photo) -> Result<PhotoId, RepoError>;

    async fn photo(&self, id: PhotoId) -> Result<Option<Photo>, RepoError>;

    async fn update_photo(
        &self,
        id: PhotoId,
        update: PhotoUpdate,
    ) -> Result<Option<Photo>, RepoError>;

    /// Marks the photo as deleted, returning the photo as it was before deletion
    async fn soft_delete_photo(&self, id: PhotoId) -> Result<Option<Photo>, RepoError>;

    /// Removes every trace of the photo row. Used when an upload is rolled back.
    async fn remove_photo(&self, id: PhotoId) -> Result<(), RepoError>;

    async fn user_stats(&self, user: UserId) -> Result<Stats, RepoError>;

    async fn stats(&self) -> Result<Stats, RepoError>;
}

#[async_trait::async_trait(?Send)]
pub(crate) trait UserRepo {
    async fn upsert_user(&self, user: &User) -> Result<(), RepoError>;

    async fn user(&self, id: UserId) -> Result<Option<User>, RepoError>;
}

#[async_trait::async_trait(?Send)]
pub(crate) trait CollectionRepo {
    async fn create_collection(&self, collection: &Collection) -> Result<(), RepoError>;

    async fn collection(&self, id: CollectionId) -> Result<Option<Collection>, RepoError>;

    async fn collections(&self, owner: UserId) -> Result<Vec<Collection>, RepoError>;
}

#[tracing::instrument]
pub(crate) fn open(config: &config::Repo) -> color_eyre::Result<ArcRepo> {
    match config {
        config::Repo::Sled(config::Sled {
            path,
            cache_capacity,
        }) => {
            let repo = self::sled::SledRepo::build(path.clone(), *cache_capacity)?;

            Ok(Arc::new(repo))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::PhotoId;

    #[test]
    fn id_string_round_trip() {
        let id = PhotoId::generate();
        let parsed: PhotoId = id.to_string().parse().expect("Parsed id");

        assert_eq!(id, parsed);
    }
}
