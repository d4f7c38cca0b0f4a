use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use sled::{
    transaction::{ConflictableTransactionError, TransactionError, TransactionalTree},
    Db, Transactional, Tree,
};

use crate::error_code::ErrorCode;

use super::{
    Collection, CollectionId, CollectionRepo, FullRepo, Photo, PhotoId, PhotoRepo, PhotoUpdate,
    RepoError, Stats, User, UserId, UserRepo,
};

macro_rules! b {
    ($self:ident.$ident:ident, $expr:expr) => {{
        let $ident = $self.$ident.clone();

        crate::sync::spawn_blocking("sled-io", move || $expr)
            .await
            .map_err(SledError::from)
            .map_err(RepoError::from)?
            .map_err(SledError::from)
            .map_err(RepoError::from)?
    }};
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum SledError {
    #[error("Error in database")]
    Sled(#[from] sled::Error),

    #[error("Invalid record json")]
    Json(#[from] serde_json::Error),

    #[error("Invalid usage record")]
    Usage,

    #[error("Operation panicked")]
    Panic,
}

impl SledError {
    pub(super) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::Sled(_) | Self::Panic => ErrorCode::SLED_ERROR,
            Self::Json(_) | Self::Usage => ErrorCode::EXTRACT_RECORD,
        }
    }
}

impl From<tokio::task::JoinError> for SledError {
    fn from(_: tokio::task::JoinError) -> Self {
        Self::Panic
    }
}

impl From<TransactionError<SledError>> for SledError {
    fn from(value: TransactionError<SledError>) -> Self {
        match value {
            TransactionError::Abort(e) => e,
            TransactionError::Storage(e) => Self::Sled(e),
        }
    }
}

type TxResult<T> = Result<T, ConflictableTransactionError<SledError>>;

fn abort<E>(error: E) -> ConflictableTransactionError<SledError>
where
    SledError: From<E>,
{
    ConflictableTransactionError::Abort(SledError::from(error))
}

// - photos: photo id -> photo json
// - usage: owner id -> stats, "global" -> stats
// - users: user id -> user json
// - collections: collection id -> collection json
// - user_collections: owner id ++ collection id -> collection id
#[derive(Clone)]
pub(crate) struct SledRepo {
    healthz_count: Arc<AtomicU64>,
    healthz: Tree,
    photos: Tree,
    usage: Tree,
    users: Tree,
    collections: Tree,
    user_collections: Tree,
    _db: Db,
}

fn owned_key(owner: UserId, id: &[u8; 16]) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(owner.as_bytes());
    key.extend_from_slice(id);
    key
}

const GLOBAL_USAGE: &[u8] = b"global";

fn encode_stats(stats: &Stats) -> [u8; 24] {
    let mut bytes = [0u8; 24];
    bytes[..8].copy_from_slice(&stats.photo_count.to_be_bytes());
    bytes[8..16].copy_from_slice(&stats.favorite_count.to_be_bytes());
    bytes[16..].copy_from_slice(&stats.used_space.to_be_bytes());
    bytes
}

fn decode_stats(bytes: &[u8]) -> Result<Stats, SledError> {
    if bytes.len() != 24 {
        return Err(SledError::Usage);
    }

    let field = |range: std::ops::Range<usize>| -> Result<u64, SledError> {
        let array = <[u8; 8]>::try_from(&bytes[range]).map_err(|_| SledError::Usage)?;

        Ok(u64::from_be_bytes(array))
    };

    Ok(Stats {
        photo_count: field(0..8)?,
        favorite_count: field(8..16)?,
        used_space: field(16..24)?,
    })
}

fn read_usage(usage: &Tree, key: &[u8]) -> Result<Stats, SledError> {
    match usage.get(key)? {
        Some(bytes) => decode_stats(&bytes),
        None => Ok(Stats::default()),
    }
}

/// Applies `adjust` to the owner's counters and the global counters
fn adjust_usage<F>(usage: &TransactionalTree, owner: UserId, adjust: F) -> TxResult<()>
where
    F: Fn(&mut Stats),
{
    for key in [&owner.as_bytes()[..], GLOBAL_USAGE] {
        let mut stats = match usage.get(key)? {
            Some(bytes) => decode_stats(&bytes).map_err(abort)?,
            None => Stats::default(),
        };

        adjust(&mut stats);

        usage.insert(key, &encode_stats(&stats)[..])?;
    }

    Ok(())
}

impl SledRepo {
    #[tracing::instrument]
    pub(crate) fn build(mut path: PathBuf, cache_capacity: u64) -> color_eyre::Result<Self> {
        path.push("v0.1");

        let db = ::sled::Config::new()
            .cache_capacity(cache_capacity)
            .path(path)
            .open()?;

        Ok(Self::new(db)?)
    }

    pub(crate) fn new(db: Db) -> Result<Self, SledError> {
        Ok(SledRepo {
            healthz_count: Arc::new(AtomicU64::new(0)),
            healthz: db.open_tree("rawvault-healthz-tree")?,
            photos: db.open_tree("rawvault-photos-tree")?,
            usage: db.open_tree("rawvault-usage-tree")?,
            users: db.open_tree("rawvault-users-tree")?,
            collections: db.open_tree("rawvault-collections-tree")?,
            user_collections: db.open_tree("rawvault-user-collections-tree")?,
            _db: db,
        })
    }

    async fn modify_photo<F>(&self, id: PhotoId, modify: F) -> Result<Option<Photo>, RepoError>
    where
        F: Fn(&mut Photo) + Send + 'static,
    {
        let usage = self.usage.clone();
        let photo = b!(self.photos, {
            (&photos, &usage)
                .transaction(|(photos, usage)| -> TxResult<Option<Photo>> {
                    let Some(bytes) = photos.get(id.as_bytes())? else {
                        return Ok(None);
                    };

                    let before: Photo = serde_json::from_slice(&bytes).map_err(abort)?;

                    if before.is_deleted() {
                        return Ok(None);
                    }

                    let mut photo = before.clone();
                    modify(&mut photo);

                    let vec = serde_json::to_vec(&photo).map_err(abort)?;
                    photos.insert(&id.as_bytes()[..], vec)?;

                    adjust_usage(usage, photo.owner, |stats| {
                        stats.remove(&before);
                        stats.add(&photo);
                    })?;

                    Ok(Some(photo))
                })
                .map_err(SledError::from)
        });

        Ok(photo)
    }
}

impl std::fmt::Debug for SledRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledRepo").finish()
    }
}

#[async_trait::async_trait(?Send)]
impl FullRepo for SledRepo {
    async fn health_check(&self) -> Result<(), RepoError> {
        let next = self.healthz_count.fetch_add(1, Ordering::Relaxed);
        b!(self.healthz, {
            healthz.insert("healthz", &next.to_be_bytes()[..])
        });
        self.healthz.flush_async().await.map_err(SledError::from)?;
        b!(self.healthz, healthz.get("healthz"));
        Ok(())
    }
}

#[async_trait::async_trait(?Send)]
impl PhotoRepo for SledRepo {
    #[tracing::instrument(level = "debug", skip_all, fields(photo_id = %photo.id, owner = %photo.owner))]
    async fn create_photo(&self, photo: &Photo) -> Result<PhotoId, RepoError> {
        let id = photo.id;
        let value = serde_json::to_vec(photo).map_err(SledError::from)?;
        let photo = photo.clone();

        let usage = self.usage.clone();
        let created = b!(self.photos, {
            (&photos, &usage)
                .transaction(|(photos, usage)| -> TxResult<bool> {
                    if photos.get(id.as_bytes())?.is_some() {
                        return Ok(false);
                    }

                    photos.insert(&id.as_bytes()[..], value.as_slice())?;
                    adjust_usage(usage, photo.owner, |stats| stats.add(&photo))?;

                    Ok(true)
                })
                .map_err(SledError::from)
        });

        if created {
            Ok(id)
        } else {
            Err(RepoError::AlreadyExists)
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn photo(&self, id: PhotoId) -> Result<Option<Photo>, RepoError> {
        let opt = b!(self.photos, photos.get(id.as_bytes()));

        opt.map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(level = "debug", skip(self, update))]
    async fn update_photo(
        &self,
        id: PhotoId,
        update: PhotoUpdate,
    ) -> Result<Option<Photo>, RepoError> {
        self.modify_photo(id, move |photo| {
            update.apply(photo, time::OffsetDateTime::now_utc())
        })
        .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn soft_delete_photo(&self, id: PhotoId) -> Result<Option<Photo>, RepoError> {
        let usage = self.usage.clone();
        let photo = b!(self.photos, {
            (&photos, &usage)
                .transaction(|(photos, usage)| -> TxResult<Option<Photo>> {
                    let Some(bytes) = photos.get(id.as_bytes())? else {
                        return Ok(None);
                    };

                    let mut photo: Photo = serde_json::from_slice(&bytes).map_err(abort)?;

                    if photo.is_deleted() {
                        return Ok(None);
                    }

                    let before = photo.clone();
                    let now = time::OffsetDateTime::now_utc();
                    photo.deleted_at = Some(now);
                    photo.updated_at = now;

                    let vec = serde_json::to_vec(&photo).map_err(abort)?;
                    photos.insert(&id.as_bytes()[..], vec)?;

                    adjust_usage(usage, before.owner, |stats| stats.remove(&before))?;

                    Ok(Some(before))
                })
                .map_err(SledError::from)
        });

        Ok(photo)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn remove_photo(&self, id: PhotoId) -> Result<(), RepoError> {
        let usage = self.usage.clone();
        b!(self.photos, {
            (&photos, &usage)
                .transaction(|(photos, usage)| -> TxResult<()> {
                    if let Some(bytes) = photos.remove(&id.as_bytes()[..])? {
                        let photo: Photo = serde_json::from_slice(&bytes).map_err(abort)?;
                        adjust_usage(usage, photo.owner, |stats| stats.remove(&photo))?;
                    }

                    Ok(())
                })
                .map_err(SledError::from)
        });

        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn user_stats(&self, user: UserId) -> Result<Stats, RepoError> {
        let stats = b!(self.usage, read_usage(&usage, user.as_bytes()));

        Ok(stats)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn stats(&self) -> Result<Stats, RepoError> {
        let stats = b!(self.usage, read_usage(&usage, GLOBAL_USAGE));

        Ok(stats)
    }
}

#[async_trait::async_trait(?Send)]
impl UserRepo for SledRepo {
    #[tracing::instrument(level = "debug", skip_all, fields(user_id = %user.id))]
    async fn upsert_user(&self, user: &User) -> Result<(), RepoError> {
        let id = user.id;
        let value = serde_json::to_vec(user).map_err(SledError::from)?;

        b!(self.users, users.insert(id.as_bytes(), value));

        Ok(())
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn user(&self, id: UserId) -> Result<Option<User>, RepoError> {
        let opt = b!(self.users, users.get(id.as_bytes()));

        opt.map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }
}

#[async_trait::async_trait(?Send)]
impl CollectionRepo for SledRepo {
    #[tracing::instrument(level = "debug", skip_all, fields(collection_id = %collection.id))]
    async fn create_collection(&self, collection: &Collection) -> Result<(), RepoError> {
        let id = collection.id;
        let key = owned_key(collection.owner, id.as_bytes());
        let value = serde_json::to_vec(collection).map_err(SledError::from)?;

        let user_collections = self.user_collections.clone();
        let created = b!(self.collections, {
            (&collections, &user_collections)
                .transaction(|(collections, user_collections)| -> TxResult<bool> {
                    if collections.get(id.as_bytes())?.is_some() {
                        return Ok(false);
                    }

                    collections.insert(&id.as_bytes()[..], value.as_slice())?;
                    user_collections.insert(key.as_slice(), &id.as_bytes()[..])?;

                    Ok(true)
                })
                .map_err(SledError::from)
        });

        if created {
            Ok(())
        } else {
            Err(RepoError::AlreadyExists)
        }
    }

    #[tracing::instrument(level = "trace", skip(self))]
    async fn collection(&self, id: CollectionId) -> Result<Option<Collection>, RepoError> {
        let opt = b!(self.collections, collections.get(id.as_bytes()));

        opt.map(|bytes| serde_json::from_slice(&bytes))
            .transpose()
            .map_err(SledError::from)
            .map_err(RepoError::from)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn collections(&self, owner: UserId) -> Result<Vec<Collection>, RepoError> {
        let collections = self.collections.clone();
        let vec = b!(self.user_collections, {
            let mut vec = Vec::new();

            for res in user_collections.scan_prefix(owner.as_bytes()) {
                let (_, id) = res?;

                if let Some(bytes) = collections.get(id)? {
                    vec.push(serde_json::from_slice::<Collection>(&bytes)?);
                }
            }

            Ok::<_, SledError>(vec)
        });

        Ok(vec)
    }
}

#[cfg(test)]
mod tests;
