use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    error_code::ErrorCode,
    repo::{ArcRepo, PhotoRepo, RepoError, User, UserId},
};

#[derive(Debug, thiserror::Error)]
pub(crate) enum QuotaError {
    #[error("Upload exceeds your storage quota of {quota} bytes")]
    User { quota: i64 },

    #[error("Upload exceeds the available storage")]
    Global,

    #[error("Failed to read storage usage")]
    Repo(#[from] RepoError),
}

impl QuotaError {
    pub(crate) const fn error_code(&self) -> ErrorCode {
        match self {
            Self::User { .. } => ErrorCode::USER_QUOTA_EXCEEDED,
            Self::Global => ErrorCode::GLOBAL_QUOTA_EXCEEDED,
            Self::Repo(e) => e.error_code(),
        }
    }
}

/// Whether `used + incoming` overshoots `quota`. Zero or negative quotas are unlimited.
pub(crate) fn exceeds(quota: i64, used: u64, incoming: u64) -> bool {
    match u64::try_from(quota) {
        Ok(quota) if quota > 0 => used.saturating_add(incoming) > quota,
        _ => false,
    }
}

type UserLocks = Arc<DashMap<UserId, Arc<Mutex<()>>>>;

/// Held from the quota check until the checked photo is persisted
#[must_use]
pub(crate) struct QuotaPermit {
    user: UserId,
    users: UserLocks,
    user_guard: Option<OwnedMutexGuard<()>>,
    _global: Option<OwnedMutexGuard<()>>,
}

impl std::fmt::Debug for QuotaPermit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaPermit")
            .field("user", &self.user)
            .field("global", &self._global.is_some())
            .finish()
    }
}

impl Drop for QuotaPermit {
    fn drop(&mut self) {
        drop(self.user_guard.take());

        // nobody else holds or waits on this user's lock
        self.users
            .remove_if(&self.user, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// Per-user and global storage ceilings over the cached usage in the repo.
///
/// Checks for one user are serialized with a per-user lock, and all checks are serialized
/// when a global ceiling is configured, so concurrent uploads cannot jointly overshoot.
pub(crate) struct QuotaEnforcer {
    repo: ArcRepo,
    global_quota: i64,
    users: UserLocks,
    global: Arc<Mutex<()>>,
}

impl std::fmt::Debug for QuotaEnforcer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotaEnforcer")
            .field("global_quota", &self.global_quota)
            .field("tracked_users", &self.users.len())
            .finish()
    }
}

impl QuotaEnforcer {
    pub(crate) fn new(repo: ArcRepo, global_quota: i64) -> Self {
        QuotaEnforcer {
            repo,
            global_quota,
            users: Arc::new(DashMap::new()),
            global: Arc::new(Mutex::new(())),
        }
    }

    #[tracing::instrument(level = "debug", skip(self, user), fields(user_id = %user.id))]
    pub(crate) async fn exceeds_user_quota(
        &self,
        user: &User,
        incoming: u64,
    ) -> Result<bool, RepoError> {
        if user.role.quota <= 0 {
            return Ok(false);
        }

        let stats = self.repo.user_stats(user.id).await?;

        Ok(exceeds(user.role.quota, stats.used_space, incoming))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub(crate) async fn exceeds_global_quota(&self, incoming: u64) -> Result<bool, RepoError> {
        if self.global_quota <= 0 {
            return Ok(false);
        }

        let stats = self.repo.stats().await?;

        Ok(exceeds(self.global_quota, stats.used_space, incoming))
    }

    fn user_lock(&self, user: UserId) -> Arc<Mutex<()>> {
        self.users.entry(user).or_default().clone()
    }

    /// Checks the user's ceiling, then the global ceiling, returning a permit that keeps
    /// other checks waiting until it is dropped
    #[tracing::instrument(level = "debug", skip(self, user), fields(user_id = %user.id))]
    pub(crate) async fn reserve(&self, user: &User, incoming: u64) -> Result<QuotaPermit, QuotaError> {
        let user_guard = self.user_lock(user.id).lock_owned().await;

        let global_guard = if self.global_quota > 0 {
            Some(self.global.clone().lock_owned().await)
        } else {
            None
        };

        let permit = QuotaPermit {
            user: user.id,
            users: Arc::clone(&self.users),
            user_guard: Some(user_guard),
            _global: global_guard,
        };

        if self.exceeds_user_quota(user, incoming).await? {
            metrics::counter!(crate::init_metrics::QUOTA_REJECTED, "scope" => "user").increment(1);
            return Err(QuotaError::User {
                quota: user.role.quota,
            });
        }

        if self.exceeds_global_quota(incoming).await? {
            metrics::counter!(crate::init_metrics::QUOTA_REJECTED, "scope" => "global")
                .increment(1);
            return Err(QuotaError::Global);
        }

        Ok(permit)
    }
}
