//! Starts relays in the background.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;
use vidrelay_core::AppError;
use vidrelay_db::JobManager;

use super::sink::CompletionSink;
use super::{UploadPipeline, UploadRequest};

/// A relay that has been accepted. The handle resolves once the terminal
/// state is recorded; callers that only hand out the id may drop it.
pub struct StartedUpload {
    pub job_id: Uuid,
    pub handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct UploadLauncher {
    jobs: JobManager,
    pipeline: Arc<UploadPipeline>,
    sink: Arc<dyn CompletionSink>,
}

impl UploadLauncher {
    pub fn new(jobs: JobManager, pipeline: Arc<UploadPipeline>, sink: Arc<dyn CompletionSink>) -> Self {
        Self {
            jobs,
            pipeline,
            sink,
        }
    }

    /// Create the job record, then run the pipeline on its own task.
    ///
    /// The record exists before this returns, so a poll with the returned id
    /// never reports `unknown`.
    pub async fn start(&self, source_url: String, filename: String) -> Result<StartedUpload, AppError> {
        let job_id = Uuid::new_v4();
        self.jobs.create(job_id).await?;

        let request = UploadRequest {
            job_id,
            source_url,
            filename,
        };
        let pipeline = self.pipeline.clone();
        let sink = self.sink.clone();
        let span = tracing::info_span!("relay", job_id = %job_id);

        let handle = tokio::spawn(
            async move {
                let outcome = pipeline.run(&request).await;
                sink.record(request.job_id, outcome).await;
            }
            .instrument(span),
        );

        tracing::info!(job_id = %job_id, "Relay scheduled");
        Ok(StartedUpload { job_id, handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{ByteIntervalPolicy, LedgerSink, SourceFetcher};
    use std::time::Duration;
    use vidrelay_core::models::JobStatus;
    use vidrelay_db::{HistoryLedger, MemoryKv};
    use vidrelay_storage::{LinkSigner, LocalStorage};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MIB: usize = 1024 * 1024;

    async fn launcher(dir: &tempfile::TempDir, interval: u64) -> (JobManager, HistoryLedger, UploadLauncher) {
        let store = Arc::new(MemoryKv::new());
        let jobs = JobManager::new(store.clone());
        let ledger = HistoryLedger::new(store);
        let storage = LocalStorage::new(
            dir.path(),
            "http://localhost:8000/files".to_string(),
            LinkSigner::new("0123456789abcdef0123456789abcdef").unwrap(),
        )
        .await
        .unwrap();
        let pipeline = UploadPipeline::new(
            SourceFetcher::new(Duration::from_secs(5)).unwrap(),
            Arc::new(storage),
            jobs.clone(),
            Arc::new(ByteIntervalPolicy::new(interval)),
            None,
        );
        let sink = LedgerSink::new(jobs.clone(), ledger.clone());
        let launcher = UploadLauncher::new(jobs.clone(), Arc::new(pipeline), Arc::new(sink));
        (jobs, ledger, launcher)
    }

    #[tokio::test]
    async fn test_record_exists_before_start_returns() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(vec![0u8; 16])
                    .set_delay(Duration::from_millis(200)),
            )
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (jobs, _ledger, launcher) = launcher(&dir, 1024).await;

        let started = launcher
            .start(format!("{}/a.mp4", server.uri()), "a.mp4".to_string())
            .await
            .unwrap();

        let job = jobs.get(started.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!((job.loaded, job.total), (0, 0));

        started.handle.await.unwrap();
        let job = jobs.get(started.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_completed_relay_appends_one_history_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![9u8; 10 * MIB]))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (jobs, ledger, launcher) = launcher(&dir, 2 * MIB as u64).await;

        let started = launcher
            .start(format!("{}/big.mp4", server.uri()), "big.mp4".to_string())
            .await
            .unwrap();
        started.handle.await.unwrap();

        let job = jobs.get(started.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.loaded, (10 * MIB) as u64);
        assert_eq!(job.total, (10 * MIB) as u64);

        let history = ledger.list().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "big.mp4");
        assert_eq!(Some(history[0].url.as_str()), job.url.as_deref());
    }

    #[tokio::test]
    async fn test_failed_source_records_failure_without_history() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let dir = tempfile::tempdir().unwrap();
        let (jobs, ledger, launcher) = launcher(&dir, 1024).await;

        let started = launcher
            .start(format!("{}/gone.mp4", server.uri()), "gone.mp4".to_string())
            .await
            .unwrap();
        started.handle.await.unwrap();

        let job = jobs.get(started.job_id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.unwrap().contains("404"));
        assert!(ledger.list().await.unwrap().is_empty());
        assert!(!dir.path().join("gone.mp4").exists());
    }
}
