use crate::{error_code::ErrorCode, repo::PhotoId, store::Store};
use actix_web::web::Bytes;
use std::path::{Path, PathBuf};

use super::StoreError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum FileError {
    #[error("Failed to read or write file")]
    Io(#[from] std::io::Error),

    #[error("Tried to save over existing file")]
    FileExists,
}

impl FileError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Io(_) => ErrorCode::FILE_IO_ERROR,
            Self::FileExists => ErrorCode::FILE_EXISTS,
        }
    }
}

/// Photos and thumbnails under two separate roots, sharded by the tail of the photo id
#[derive(Clone, Debug)]
pub(crate) struct FileStore {
    image_root: PathBuf,
    thumbnail_root: PathBuf,
}

#[async_trait::async_trait(?Send)]
impl Store for FileStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        tokio::fs::metadata(&self.image_root)
            .await
            .map_err(FileError::from)?;
        tokio::fs::metadata(&self.thumbnail_root)
            .await
            .map_err(FileError::from)?;

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, image, thumbnail), fields(image = image.len(), thumbnail = thumbnail.len()))]
    async fn store(&self, id: PhotoId, image: Bytes, thumbnail: Bytes) -> Result<(), StoreError> {
        let image_path = self.image_path(id);
        let thumbnail_path = self.thumbnail_path(id);

        self.safe_save_bytes(&image_path, image).await?;

        if let Err(e) = self.safe_save_bytes(&thumbnail_path, thumbnail).await {
            if let Err(e) = self.safe_remove_file(&image_path, &self.image_root).await {
                tracing::warn!("Failed to remove orphaned image {image_path:?}: {e}");
            }
            return Err(e.into());
        }

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load_image(&self, id: PhotoId) -> Result<Bytes, StoreError> {
        let bytes = tokio::fs::read(self.image_path(id))
            .await
            .map_err(FileError::from)?;

        Ok(Bytes::from(bytes))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn load_thumbnail(&self, id: PhotoId) -> Result<Bytes, StoreError> {
        let bytes = tokio::fs::read(self.thumbnail_path(id))
            .await
            .map_err(FileError::from)?;

        Ok(Bytes::from(bytes))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete(&self, id: PhotoId) -> Result<(), StoreError> {
        let image = self
            .safe_remove_file(&self.image_path(id), &self.image_root)
            .await;
        let thumbnail = self
            .safe_remove_file(&self.thumbnail_path(id), &self.thumbnail_root)
            .await;

        image?;
        thumbnail?;

        Ok(())
    }
}

impl FileStore {
    #[tracing::instrument]
    pub(crate) async fn build(
        image_root: PathBuf,
        thumbnail_root: PathBuf,
    ) -> color_eyre::Result<Self> {
        tokio::fs::create_dir_all(&image_root).await?;
        tokio::fs::create_dir_all(&thumbnail_root).await?;

        Ok(FileStore {
            image_root,
            thumbnail_root,
        })
    }

    fn image_path(&self, id: PhotoId) -> PathBuf {
        sharded(&self.image_root, id)
    }

    fn thumbnail_path(&self, id: PhotoId) -> PathBuf {
        sharded(&self.thumbnail_root, id)
    }

    async fn safe_remove_file(&self, path: &Path, root: &Path) -> Result<(), FileError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }

        try_remove_parents(path, root).await;
        Ok(())
    }

    async fn safe_save_bytes(&self, path: &Path, bytes: Bytes) -> Result<(), FileError> {
        safe_create_parent(path).await?;

        // Only write the file if it doesn't already exist
        if let Err(e) = tokio::fs::metadata(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e.into());
            }
        } else {
            return Err(FileError::FileExists);
        }

        if let Err(e) = tokio::fs::write(path, &bytes).await {
            // remove file if writing failed before completion
            let _ = tokio::fs::remove_file(path).await;
            return Err(e.into());
        }

        Ok(())
    }
}

fn sharded(root: &Path, id: PhotoId) -> PathBuf {
    let name = id.to_string();
    let shard = &name[name.len() - 2..];

    root.join(shard).join(name)
}

async fn try_remove_parents(mut path: &Path, root: &Path) {
    while let Some(parent) = path.parent() {
        if parent == root {
            return;
        }

        if tokio::fs::remove_dir(parent).await.is_err() {
            return;
        }

        path = parent;
    }
}

pub(crate) async fn safe_create_parent<P: AsRef<Path>>(path: P) -> Result<(), FileError> {
    if let Some(path) = path.as_ref().parent() {
        tokio::fs::create_dir_all(path).await?;
    }

    Ok(())
}

#[cfg(test)]
pub(crate) fn count_files(root: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(root) else {
        return 0;
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| {
            let path = entry.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}
