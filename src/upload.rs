use actix_web::web::Bytes;
use futures_util::StreamExt;
use time::{Date, OffsetDateTime};

use crate::{
    error::{Error, UploadError},
    error_code::ErrorCode,
    future::WithMetrics,
    ingest::Session,
    quota::QuotaError,
    repo::{Collection, CollectionId, CollectionRepo, User},
    state::State,
    store::Store,
};

/// The single outcome reported for a failed batch. Which file failed is only logged.
#[derive(Debug, thiserror::Error)]
pub(crate) enum BatchError {
    #[error("Upload contains a file of an unsupported format")]
    UnsupportedFormat,

    #[error("Upload contains a corrupt file")]
    CorruptFile,

    #[error("Upload exceeds your storage quota of {quota} bytes")]
    UserQuota { quota: i64 },

    #[error("Upload exceeds the available storage")]
    GlobalQuota,

    #[error("Failed to store upload")]
    Storage,
}

impl BatchError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedFormat => ErrorCode::UNSUPPORTED_FORMAT,
            Self::CorruptFile => ErrorCode::CORRUPT_FILE,
            Self::UserQuota { .. } => ErrorCode::USER_QUOTA_EXCEEDED,
            Self::GlobalQuota => ErrorCode::GLOBAL_QUOTA_EXCEEDED,
            Self::Storage => ErrorCode::STORAGE_ERROR,
        }
    }

    fn from_error(error: &Error) -> Self {
        match error.kind() {
            Some(UploadError::Format(_)) => Self::UnsupportedFormat,
            Some(UploadError::Quota(QuotaError::User { quota })) => Self::UserQuota {
                quota: *quota,
            },
            Some(UploadError::Quota(QuotaError::Global)) => Self::GlobalQuota,
            Some(UploadError::Import(e)) if e.is_client_error() => Self::CorruptFile,
            Some(UploadError::ProcessTimeout) => Self::CorruptFile,
            _ => Self::Storage,
        }
    }
}

/// Name of the collection created by an upload on `date`, `YYYY-MM-DD`
pub(crate) fn collection_name(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

/// Ingests every file of one request and groups them into a new collection.
///
/// At most `media.upload_concurrency` files are processed at once. If any file fails, every
/// photo of the batch is removed again and one generic [`BatchError`] is returned.
#[tracing::instrument(name = "Upload batch", skip(state, user, files), fields(user_id = %user.id, files = files.len()))]
pub(crate) async fn upload_batch<S>(
    state: &State<S>,
    user: &User,
    files: Vec<(String, Bytes)>,
) -> Result<Collection, Error>
where
    S: Store + 'static,
{
    if files.is_empty() {
        return Err(UploadError::NoFiles.into());
    }

    let res = do_upload_batch(state, user, files)
        .with_metrics(crate::init_metrics::UPLOAD_DURATION)
        .await;

    let completed = if res.is_ok() { "true" } else { "false" };
    metrics::counter!(crate::init_metrics::UPLOAD_END, "completed" => completed).increment(1);

    res
}

async fn do_upload_batch<S>(
    state: &State<S>,
    user: &User,
    files: Vec<(String, Bytes)>,
) -> Result<Collection, Error>
where
    S: Store + 'static,
{
    let concurrency = state.config.media.upload_concurrency.max(1);

    let mut results = futures_util::stream::iter(files.into_iter().enumerate())
        .map(|(index, (filename, bytes))| async move {
            let res = crate::ingest::create_photo(state, user, &filename, bytes).await;
            (index, filename, res)
        })
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>()
        .await;

    results.sort_by_key(|(index, _, _)| *index);

    let mut sessions = Vec::with_capacity(results.len());
    let mut failure = None;

    for (index, filename, res) in results {
        match res {
            Ok(session) => sessions.push(session),
            Err(e) => {
                tracing::warn!(index, "Rejecting batch, {filename:?} failed: {}", format!("{e}\n{e:?}"));

                if failure.is_none() {
                    failure = Some(BatchError::from_error(&e));
                }
            }
        }
    }

    if let Some(error) = failure {
        rollback(sessions).await;
        return Err(error.into());
    }

    let now = OffsetDateTime::now_utc();

    let collection = Collection {
        id: CollectionId::generate(),
        owner: user.id,
        name: collection_name(now.date()),
        photo_ids: sessions.iter().filter_map(Session::id).collect(),
        created_at: now,
    };

    if let Err(e) = state.repo.create_collection(&collection).await {
        tracing::warn!("Failed to create collection: {}", format!("{e}\n{e:?}"));
        rollback(sessions).await;
        return Err(BatchError::Storage.into());
    }

    for session in sessions {
        session.commit();
    }

    tracing::info!(
        collection_id = %collection.id,
        "Created collection {} with {} photos",
        collection.name,
        collection.photo_ids.len()
    );

    Ok(collection)
}

async fn rollback<S>(sessions: Vec<Session<S>>)
where
    S: Store + 'static,
{
    for session in sessions {
        if let Err(e) = session.rollback().await {
            tracing::warn!("Failed to roll back photo: {}", format!("{e}\n{e:?}"));
        }
    }
}

#[cfg(test)]
mod tests;
