//! Wires repositories, the relay pipeline and the link resolver into `AppState`.

use crate::state::{AppState, KvState, LinkState, RelayState};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use vidrelay_core::Config;
use vidrelay_db::{HistoryLedger, JobManager, KeyValueStore};
use vidrelay_services::{
    ByteIntervalPolicy, DownloadLinkResolver, LedgerSink, PublicDomain, SourceFetcher,
    UploadLauncher, UploadPipeline,
};
use vidrelay_storage::ConfiguredStorage;

pub fn initialize_services(
    config: &Config,
    store: Arc<dyn KeyValueStore>,
    storage: ConfiguredStorage,
) -> Result<Arc<AppState>> {
    let jobs = JobManager::new(store.clone());
    let history = HistoryLedger::with_limit(store.clone(), config.history_limit());
    let public_domain = config.public_domain().and_then(PublicDomain::new);

    let fetcher = SourceFetcher::new(Duration::from_secs(config.source_connect_timeout_secs()))
        .context("Failed to create source fetcher")?;
    let pipeline = UploadPipeline::new(
        fetcher,
        storage.storage.clone(),
        jobs.clone(),
        Arc::new(ByteIntervalPolicy::new(config.progress_interval_bytes())),
        public_domain.clone(),
    );
    let sink = LedgerSink::new(jobs.clone(), history.clone());
    let launcher = UploadLauncher::new(jobs.clone(), Arc::new(pipeline), Arc::new(sink));

    let ttl = Duration::from_secs(config.download_link_ttl_hours() * 3600);
    let resolver = DownloadLinkResolver::new(storage.storage.clone(), public_domain.clone(), ttl);

    tracing::info!(
        kv_backend = store.backend_name(),
        progress_interval_bytes = config.progress_interval_bytes(),
        download_link_ttl_hours = config.download_link_ttl_hours(),
        public_domain = public_domain.as_ref().map(|d| d.as_str()).unwrap_or("none"),
        "Services initialized"
    );

    Ok(Arc::new(AppState {
        kv: KvState {
            store,
            jobs,
            history,
        },
        relay: RelayState { launcher },
        links: LinkState {
            resolver,
            storage: storage.storage,
            link_signer: storage.link_signer,
        },
    }))
}
