use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::{
    config::Configuration,
    import::Importers,
    quota::QuotaEnforcer,
    repo::ArcRepo,
    thumbnail::Bounds,
    tmp_file::TmpDir,
};

#[derive(Clone)]
pub(crate) struct State<S> {
    pub(super) config: Configuration,
    pub(super) repo: ArcRepo,
    pub(super) store: S,
    pub(super) importers: Importers,
    pub(super) quota: Arc<QuotaEnforcer>,
    pub(super) process_semaphore: Arc<Semaphore>,
}

impl<S> State<S> {
    pub(super) async fn build(
        config: Configuration,
        repo: ArcRepo,
        store: S,
    ) -> color_eyre::Result<Self> {
        let tmp_dir = TmpDir::init(&config.server.temporary_directory).await?;

        let importers = Importers::new(tmp_dir, Bounds::from(&config.media.thumbnail));
        let quota = Arc::new(QuotaEnforcer::new(repo.clone(), config.quota.global));

        let permits = std::thread::available_parallelism()
            .map(usize::from)
            .unwrap_or(1)
            .saturating_mul(2);

        tracing::debug!("Decoding at most {permits} files at once");

        Ok(State {
            config,
            repo,
            store,
            importers,
            quota,
            process_semaphore: crate::sync::semaphore(permits),
        })
    }
}
