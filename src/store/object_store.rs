use std::sync::Arc;

use actix_web::web::Bytes;
use object_store::{aws::AmazonS3Builder, path::Path, ObjectStore as _, PutPayload};
use url::Url;

use crate::{
    error_code::ErrorCode,
    future::WithMetrics,
    init_metrics::{
        OBJECT_STORAGE_DELETE_OBJECT_REQUEST, OBJECT_STORAGE_GET_OBJECT_REQUEST,
        OBJECT_STORAGE_HEAD_BUCKET_REQUEST, OBJECT_STORAGE_PUT_OBJECT_REQUEST,
    },
    repo::PhotoId,
    store::Store,
};

use super::StoreError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum ObjectError {
    #[error("Invalid object storage configuration")]
    Build(#[source] object_store::Error),

    #[error("Error making object storage request")]
    Request(#[from] object_store::Error),
}

impl ObjectError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Build(_) => ErrorCode::OBJECT_STORE_CONFIG,
            Self::Request(_) => ErrorCode::OBJECT_IO_ERROR,
        }
    }

    pub(super) const fn is_not_found(&self) -> bool {
        matches!(self, Self::Request(object_store::Error::NotFound { .. }))
    }
}

pub(crate) struct ObjectStorage<'a> {
    pub(crate) endpoint: &'a Url,
    pub(crate) use_path_style: bool,
    pub(crate) region: &'a str,
    pub(crate) access_key: &'a str,
    pub(crate) secret_key: &'a str,
    pub(crate) session_token: Option<&'a str>,
}

impl ObjectStorage<'_> {
    fn bucket(&self, name: &str) -> Result<Arc<dyn object_store::ObjectStore>, ObjectError> {
        let mut builder = AmazonS3Builder::new()
            .with_endpoint(self.endpoint.as_str().trim_end_matches('/'))
            .with_allow_http(self.endpoint.scheme() == "http")
            .with_virtual_hosted_style_request(!self.use_path_style)
            .with_region(self.region)
            .with_bucket_name(name)
            .with_access_key_id(self.access_key)
            .with_secret_access_key(self.secret_key);

        if let Some(token) = self.session_token {
            builder = builder.with_token(token);
        }

        let bucket = builder.build().map_err(ObjectError::Build)?;

        Ok(Arc::new(bucket))
    }
}

/// Photos and thumbnails in two buckets of an S3-compatible service
#[derive(Clone)]
pub(crate) struct ObjectStore {
    images: Arc<dyn object_store::ObjectStore>,
    thumbnails: Arc<dyn object_store::ObjectStore>,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("images", &self.images.to_string())
            .field("thumbnails", &self.thumbnails.to_string())
            .finish()
    }
}

#[async_trait::async_trait(?Send)]
impl Store for ObjectStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        for bucket in [&self.images, &self.thumbnails] {
            bucket
                .list_with_delimiter(None)
                .with_metrics(OBJECT_STORAGE_HEAD_BUCKET_REQUEST)
                .await
                .map_err(ObjectError::from)?;
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, image, thumbnail), fields(image = image.len(), thumbnail = thumbnail.len()))]
    async fn store(&self, id: PhotoId, image: Bytes, thumbnail: Bytes) -> Result<(), StoreError> {
        let path = object_path(id);

        self.images
            .put(&path, PutPayload::from(image))
            .with_metrics(OBJECT_STORAGE_PUT_OBJECT_REQUEST)
            .await
            .map_err(ObjectError::from)?;

        if let Err(e) = self
            .thumbnails
            .put(&path, PutPayload::from(thumbnail))
            .with_metrics(OBJECT_STORAGE_PUT_OBJECT_REQUEST)
            .await
        {
            if let Err(e) = self.images.delete(&path).await {
                tracing::warn!("Failed to remove orphaned image {path}: {e}");
            }
            return Err(ObjectError::from(e).into());
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load_image(&self, id: PhotoId) -> Result<Bytes, StoreError> {
        Ok(get(&self.images, &object_path(id)).await?)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load_thumbnail(&self, id: PhotoId) -> Result<Bytes, StoreError> {
        Ok(get(&self.thumbnails, &object_path(id)).await?)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: PhotoId) -> Result<(), StoreError> {
        let path = object_path(id);

        let image = delete(&self.images, &path).await;
        let thumbnail = delete(&self.thumbnails, &path).await;

        image?;
        thumbnail?;

        Ok(())
    }
}

impl ObjectStore {
    #[tracing::instrument(skip(storage), fields(endpoint = %storage.endpoint))]
    pub(crate) fn build(
        storage: ObjectStorage<'_>,
        image_bucket: &str,
        thumbnail_bucket: &str,
    ) -> Result<Self, StoreError> {
        Ok(ObjectStore {
            images: storage.bucket(image_bucket)?,
            thumbnails: storage.bucket(thumbnail_bucket)?,
        })
    }

    #[cfg(test)]
    pub(crate) fn in_memory() -> Self {
        ObjectStore {
            images: Arc::new(object_store::memory::InMemory::new()),
            thumbnails: Arc::new(object_store::memory::InMemory::new()),
        }
    }
}

fn object_path(id: PhotoId) -> Path {
    Path::from(id.to_string())
}

async fn get(bucket: &Arc<dyn object_store::ObjectStore>, path: &Path) -> Result<Bytes, ObjectError> {
    let bytes = async { bucket.get(path).await?.bytes().await }
        .with_metrics(OBJECT_STORAGE_GET_OBJECT_REQUEST)
        .await?;

    Ok(bytes)
}

async fn delete(bucket: &Arc<dyn object_store::ObjectStore>, path: &Path) -> Result<(), ObjectError> {
    match bucket
        .delete(path)
        .with_metrics(OBJECT_STORAGE_DELETE_OBJECT_REQUEST)
        .await
    {
        Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::web::Bytes;

    use crate::{repo::PhotoId, store::Store};

    use super::{ObjectStorage, ObjectStore};

    #[tokio::test]
    async fn store_load_delete() {
        let store = ObjectStore::in_memory();
        let id = PhotoId::generate();

        store
            .store(id, Bytes::from_static(b"raw"), Bytes::from_static(b"thumb"))
            .await
            .expect("Stored");

        assert_eq!(store.load_image(id).await.expect("Image"), "raw");
        assert_eq!(store.load_thumbnail(id).await.expect("Thumbnail"), "thumb");

        store.delete(id).await.expect("Deleted");

        let err = store.load_image(id).await.expect_err("Deleted");
        assert!(err.is_not_found());

        store.delete(id).await.expect("Deleting twice is fine");
    }

    #[tokio::test]
    async fn in_memory_is_healthy() {
        assert!(ObjectStore::in_memory().health_check().await.is_ok());
    }

    #[test]
    fn builds_from_configuration() {
        let endpoint = "http://localhost:9000".parse().expect("Valid url");

        let store = ObjectStore::build(
            ObjectStorage {
                endpoint: &endpoint,
                use_path_style: true,
                region: "minio",
                access_key: "access",
                secret_key: "secret",
                session_token: None,
            },
            "images",
            "thumbnails",
        );

        assert!(store.is_ok());
    }
}
