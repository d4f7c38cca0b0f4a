use std::{collections::BTreeSet, time::Duration};

use actix_web::web::Bytes;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use crate::{
    error::Error,
    formats::{classify, extension_of, normalize_format},
    future::{WithMetrics, WithTimeout},
    import::ImportError,
    repo::{ArcRepo, Descriptor, Photo, PhotoId, PhotoRepo, User},
    state::State,
    store::Store,
};

/// Where a single file is in its trip from upload to storage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Stage {
    Received,
    Decoding,
    MetadataExtracted,
    ThumbnailGenerated,
    QuotaChecked,
    Persisted,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Decoding => "decoding",
            Self::MetadataExtracted => "metadata-extracted",
            Self::ThumbnailGenerated => "thumbnail-generated",
            Self::QuotaChecked => "quota-checked",
            Self::Persisted => "persisted",
        };

        f.write_str(s)
    }
}

fn advance(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "Advancing");
    *stage = next;
}

/// A persisted photo that has not yet been committed to its batch.
///
/// Sessions that are dropped while still armed remove their photo in the background.
pub(crate) struct Session<S>
where
    S: Store + 'static,
{
    repo: ArcRepo,
    store: S,
    photo: Option<Photo>,
}

impl<S> std::fmt::Debug for Session<S>
where
    S: Store + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("photo", &self.photo.as_ref().map(|photo| photo.id))
            .finish()
    }
}

impl<S> Session<S>
where
    S: Store + 'static,
{
    pub(crate) fn id(&self) -> Option<PhotoId> {
        self.photo.as_ref().map(|photo| photo.id)
    }

    /// Keeps the photo, returning its row
    pub(crate) fn commit(mut self) -> Option<Photo> {
        self.photo.take()
    }

    /// Removes the photo's binaries and its row
    #[tracing::instrument(name = "Rollback", skip(self), fields(photo_id = ?self.id()))]
    pub(crate) async fn rollback(mut self) -> Result<(), Error> {
        if let Some(photo) = self.photo.take() {
            remove(&self.repo, &self.store, photo.id).await?;
            metrics::counter!(crate::init_metrics::INGEST_ROLLBACK).increment(1);
        }

        Ok(())
    }
}

async fn remove<S: Store>(repo: &ArcRepo, store: &S, id: PhotoId) -> Result<(), Error> {
    store.delete(id).await?;
    repo.remove_photo(id).await?;

    Ok(())
}

impl<S> Drop for Session<S>
where
    S: Store + 'static,
{
    fn drop(&mut self) {
        if let Some(photo) = self.photo.take() {
            let repo = self.repo.clone();
            let store = self.store.clone();

            let cleanup_span =
                tracing::info_span!(parent: None, "Session cleanup", photo_id = %photo.id);
            cleanup_span.follows_from(tracing::Span::current());

            tracing::trace_span!(parent: None, "Spawn task").in_scope(|| {
                actix_web::rt::spawn(tracing::Instrument::instrument(
                    async move {
                        if let Err(e) = remove(&repo, &store, photo.id).await {
                            tracing::warn!("Failed to clean up abandoned photo: {e}");
                        }
                    },
                    cleanup_span,
                ))
            });
        }
    }
}

/// Decodes, describes, thumbnails, quota-checks and persists one uploaded file.
///
/// No step is retried. A failure at any stage is terminal for the file.
#[tracing::instrument(name = "Ingest", skip(state, user, bytes), fields(user_id = %user.id, size = bytes.len()))]
pub(crate) async fn create_photo<S>(
    state: &State<S>,
    user: &User,
    filename: &str,
    bytes: Bytes,
) -> Result<Session<S>, Error>
where
    S: Store + 'static,
{
    let mut stage = Stage::Received;

    let res = do_create_photo(state, user, filename, bytes, &mut stage).await;

    match &res {
        Ok(session) => {
            tracing::info!("Stored {filename:?} as {:?}", session.id());
            metrics::counter!(crate::init_metrics::INGEST_END, "completed" => "true").increment(1);
        }
        Err(e) => {
            tracing::warn!(%stage, "Failed to ingest {filename:?}: {e}");
            metrics::counter!(crate::init_metrics::INGEST_END, "completed" => "false", "stage" => stage.to_string()).increment(1);
        }
    }

    res
}

async fn do_create_photo<S>(
    state: &State<S>,
    user: &User,
    filename: &str,
    bytes: Bytes,
    stage: &mut Stage,
) -> Result<Session<S>, Error>
where
    S: Store + 'static,
{
    let format = normalize_format(extension_of(filename));
    let family = classify(&format)?;

    advance(stage, Stage::Decoding);

    let importer = state.importers.for_format(family);

    let metadata = {
        let importer = importer.clone();
        let bytes = bytes.clone();

        process(state, crate::init_metrics::INGEST_DESCRIBE, "describe", move || {
            importer.describe(&bytes)
        })
        .await?
    };

    advance(stage, Stage::MetadataExtracted);

    let thumbnail = {
        let bytes = bytes.clone();

        process(state, crate::init_metrics::INGEST_THUMBNAIL, "thumbnail", move || {
            importer.thumbnail(&bytes)
        })
        .await
    };

    let thumbnail = match thumbnail {
        Ok(thumbnail) => thumbnail,
        Err(e) => {
            let _ = crate::diagnostics::capture(
                state.config.media.diagnostics_path.as_deref(),
                &format,
                bytes,
            );
            return Err(e);
        }
    };

    tracing::debug!(
        width = thumbnail.width,
        height = thumbnail.height,
        "Generated thumbnail"
    );

    advance(stage, Stage::ThumbnailGenerated);

    let hash_input = bytes.clone();
    let content_hash = crate::sync::spawn_blocking("hash", move || {
        hex::encode(Sha256::digest(&hash_input))
    })
    .await?;

    let thumbnail = Bytes::from(thumbnail.bytes);
    let used_space = (bytes.len() + thumbnail.len()) as u64;

    // ceilings are checked against the original's size, the row records both binaries
    let permit = state.quota.reserve(user, bytes.len() as u64).await?;

    advance(stage, Stage::QuotaChecked);

    let id = PhotoId::generate();
    let now = OffsetDateTime::now_utc();

    let photo = Photo {
        id,
        owner: user.id,
        descriptor: Descriptor {
            filename: filename.to_string(),
            uploaded_at: now,
            format,
            tags: BTreeSet::new(),
            favorite: false,
            metadata,
        },
        used_space,
        content_hash,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    persist(state, &photo, bytes, thumbnail)
        .with_metrics(crate::init_metrics::INGEST_PERSIST)
        .await?;

    drop(permit);

    advance(stage, Stage::Persisted);

    Ok(Session {
        repo: state.repo.clone(),
        store: state.store.clone(),
        photo: Some(photo),
    })
}

async fn persist<S: Store>(
    state: &State<S>,
    photo: &Photo,
    image: Bytes,
    thumbnail: Bytes,
) -> Result<(), Error> {
    state.store.store(photo.id, image, thumbnail).await?;

    if let Err(e) = state.repo.create_photo(photo).await {
        if let Err(cleanup) = state.store.delete(photo.id).await {
            tracing::warn!("Failed to remove binaries of unsaved photo: {cleanup}");
        }

        return Err(e.into());
    }

    Ok(())
}

/// Runs one decode step on the blocking pool, bounded by the process semaphore and timeout
async fn process<S, F, T>(
    state: &State<S>,
    metric: &'static str,
    name: &'static str,
    function: F,
) -> Result<T, Error>
where
    F: FnOnce() -> Result<T, ImportError> + Send + 'static,
    T: Send + 'static,
{
    let permit = state.process_semaphore.acquire().await?;

    let timeout = Duration::from_secs(state.config.media.process_timeout);

    let res = crate::sync::spawn_blocking(name, function)
        .with_metrics(metric)
        .with_timeout(timeout)
        .await??;

    drop(permit);

    Ok(res?)
}
