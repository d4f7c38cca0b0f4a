use actix_web::web::Bytes;
use std::fmt::Debug;

use crate::{error_code::ErrorCode, repo::PhotoId};

pub(crate) mod file_store;
pub(crate) mod object_store;

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("Error in file store")]
    FileStore(#[source] crate::store::file_store::FileError),

    #[error("Error in object store")]
    ObjectStore(#[source] crate::store::object_store::ObjectError),

    #[error("Requested file is not found")]
    FileNotFound(#[source] std::io::Error),

    #[error("Requested object is not found")]
    ObjectNotFound(#[source] crate::store::object_store::ObjectError),
}

impl StoreError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::FileStore(e) => e.error_code(),
            Self::ObjectStore(e) => e.error_code(),
            Self::FileNotFound(_) | Self::ObjectNotFound(_) => ErrorCode::NOT_FOUND,
        }
    }

    pub(crate) const fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_)) || matches!(self, Self::ObjectNotFound(_))
    }
}

impl From<crate::store::file_store::FileError> for StoreError {
    fn from(value: crate::store::file_store::FileError) -> Self {
        match value {
            crate::store::file_store::FileError::Io(e)
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::FileNotFound(e)
            }
            e => Self::FileStore(e),
        }
    }
}

impl From<crate::store::object_store::ObjectError> for StoreError {
    fn from(value: crate::store::object_store::ObjectError) -> Self {
        if value.is_not_found() {
            Self::ObjectNotFound(value)
        } else {
            Self::ObjectStore(value)
        }
    }
}

/// Binary content of a photo: the uploaded bytes and the generated thumbnail, both keyed by
/// the photo's id
#[async_trait::async_trait(?Send)]
pub(crate) trait Store: Clone + Debug {
    async fn health_check(&self) -> Result<(), StoreError>;

    /// Writes both binaries, leaving neither behind if either write fails
    async fn store(&self, id: PhotoId, image: Bytes, thumbnail: Bytes) -> Result<(), StoreError>;

    async fn load_image(&self, id: PhotoId) -> Result<Bytes, StoreError>;

    async fn load_thumbnail(&self, id: PhotoId) -> Result<Bytes, StoreError>;

    /// Removes both binaries. Missing binaries are not an error.
    async fn delete(&self, id: PhotoId) -> Result<(), StoreError>;
}
