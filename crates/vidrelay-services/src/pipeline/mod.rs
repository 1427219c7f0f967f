//! Upload pipeline
//!
//! Fetches a source URL, streams the body through the counting stage into
//! object storage and reports where the object ended up. The pipeline owns its
//! job's record while it runs; the completion sink writes the terminal state.

pub mod counting;
pub mod launcher;
pub mod progress;
pub mod sink;
pub mod source;

use std::sync::Arc;
use std::time::Instant;

use uuid::Uuid;
use vidrelay_core::constants::VIDEO_CONTENT_TYPE;
use vidrelay_db::JobManager;
use vidrelay_storage::ObjectStorage;

use crate::error::PipelineError;
use crate::public_domain::PublicDomain;
use counting::{counting_stream, shared_state, StageFailure};
pub use launcher::{StartedUpload, UploadLauncher};
pub use progress::{ByteIntervalPolicy, ProgressPolicy, ProgressTracker};
pub use sink::{CompletionSink, LedgerSink};
pub use source::{SourceBody, SourceFetcher};

/// One relay to run. `filename` is already derived and doubles as the object key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub job_id: Uuid,
    pub source_url: String,
    pub filename: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub filename: String,
    /// Public-domain URL when configured, otherwise the storage's native URL
    pub url: String,
    pub loaded: u64,
    /// Declared size, or `loaded` when the source did not declare one
    pub total: u64,
}

pub struct UploadPipeline {
    fetcher: SourceFetcher,
    storage: Arc<dyn ObjectStorage>,
    jobs: JobManager,
    policy: Arc<dyn ProgressPolicy>,
    public_domain: Option<PublicDomain>,
}

impl UploadPipeline {
    pub fn new(
        fetcher: SourceFetcher,
        storage: Arc<dyn ObjectStorage>,
        jobs: JobManager,
        policy: Arc<dyn ProgressPolicy>,
        public_domain: Option<PublicDomain>,
    ) -> Self {
        Self {
            fetcher,
            storage,
            jobs,
            policy,
            public_domain,
        }
    }

    pub fn jobs(&self) -> &JobManager {
        &self.jobs
    }

    #[tracing::instrument(
        skip(self, request),
        fields(job_id = %request.job_id, filename = %request.filename)
    )]
    pub async fn run(&self, request: &UploadRequest) -> Result<CompletedUpload, PipelineError> {
        let start = Instant::now();
        tracing::info!(source_url = %request.source_url, "Relay started");

        let source = self.fetcher.fetch(&request.source_url).await?;
        let total = source.declared_total;
        tracing::info!(total = total, "Source responded");

        let state = shared_state(ProgressTracker::new(
            self.jobs.clone(),
            request.job_id,
            total,
            self.policy.clone(),
        ));
        let body = counting_stream(source.stream, state.clone());
        let size_hint = (total > 0).then_some(total);

        let stored = match self
            .storage
            .put_stream(&request.filename, VIDEO_CONTENT_TYPE, size_hint, body)
            .await
        {
            Ok(stored) => stored,
            Err(storage_error) => {
                // A failure raised by the counting stage outranks the storage error it caused.
                let failure = state.lock().await.failure.take();
                return Err(match failure {
                    Some(StageFailure::Source(message)) => PipelineError::SourceFetch(message),
                    Some(StageFailure::Progress(e)) => PipelineError::Progress(e),
                    None => PipelineError::StoreWrite(storage_error),
                });
            }
        };

        let loaded = state.lock().await.tracker.loaded();
        let url = match &self.public_domain {
            Some(domain) => domain.object_url(&stored.key),
            None => stored.url,
        };

        tracing::info!(
            loaded = loaded,
            total = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Relay completed"
        );

        Ok(CompletedUpload {
            filename: request.filename.clone(),
            url,
            loaded,
            total: if total > 0 { total } else { loaded },
        })
    }
}
