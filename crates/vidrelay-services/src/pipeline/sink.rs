//! Terminal job state and history recording.

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;
use vidrelay_core::models::{HistoryEntry, Job};
use vidrelay_db::{HistoryLedger, JobManager};

use super::CompletedUpload;
use crate::error::PipelineError;

/// Receives the outcome of a finished pipeline run.
#[async_trait]
pub trait CompletionSink: Send + Sync {
    async fn record(&self, job_id: Uuid, outcome: Result<CompletedUpload, PipelineError>);
}

/// Writes the terminal job record and, for completed uploads, a history entry.
#[derive(Clone)]
pub struct LedgerSink {
    jobs: JobManager,
    ledger: HistoryLedger,
}

impl LedgerSink {
    pub fn new(jobs: JobManager, ledger: HistoryLedger) -> Self {
        Self { jobs, ledger }
    }

    async fn record_completed(&self, job_id: Uuid, upload: CompletedUpload) {
        let job = Job::completed(upload.loaded, upload.total, upload.url.clone());
        if let Err(e) = self.jobs.update(job_id, job).await {
            // Without a completed record the upload is not reported, so neither is its history.
            tracing::error!(job_id = %job_id, error = %e, "Failed to record completed job");
            return;
        }

        let entry = HistoryEntry {
            filename: upload.filename,
            url: upload.url,
            ts: Utc::now().timestamp_millis(),
        };
        if let Err(e) = self.ledger.append(&entry).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to append history entry");
        }
    }

    async fn record_failed(&self, job_id: Uuid, error: PipelineError) {
        let (loaded, total) = match self.jobs.get(job_id).await {
            Ok(Some(job)) => (job.loaded, job.total),
            _ => (0, 0),
        };

        if let Err(e) = self
            .jobs
            .update(job_id, Job::failed(loaded, total, error.to_string()))
            .await
        {
            tracing::error!(job_id = %job_id, error = %e, "Failed to record failed job");
        }
    }
}

#[async_trait]
impl CompletionSink for LedgerSink {
    async fn record(&self, job_id: Uuid, outcome: Result<CompletedUpload, PipelineError>) {
        match outcome {
            Ok(upload) => self.record_completed(job_id, upload).await,
            Err(error) => {
                tracing::error!(job_id = %job_id, error = %error, "Relay failed");
                self.record_failed(job_id, error).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vidrelay_core::models::JobStatus;
    use vidrelay_db::MemoryKv;

    fn sink() -> (JobManager, HistoryLedger, LedgerSink) {
        let store = Arc::new(MemoryKv::new());
        let jobs = JobManager::new(store.clone());
        let ledger = HistoryLedger::new(store);
        let sink = LedgerSink::new(jobs.clone(), ledger.clone());
        (jobs, ledger, sink)
    }

    #[tokio::test]
    async fn test_completed_writes_job_and_history() {
        let (jobs, ledger, sink) = sink();
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();

        sink.record(
            id,
            Ok(CompletedUpload {
                filename: "clip.mp4".to_string(),
                url: "https://cdn.example.com/clip.mp4".to_string(),
                loaded: 42,
                total: 42,
            }),
        )
        .await;

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.url.as_deref(), Some("https://cdn.example.com/clip.mp4"));

        let history = ledger.list().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].filename, "clip.mp4");
        assert_eq!(history[0].url, "https://cdn.example.com/clip.mp4");
    }

    #[tokio::test]
    async fn test_failed_keeps_progress_and_skips_history() {
        let (jobs, ledger, sink) = sink();
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();
        jobs.update(id, Job::processing(100, 500)).await.unwrap();

        sink.record(
            id,
            Err(PipelineError::SourceFetch("HTTP 404 Not Found".to_string())),
        )
        .await;

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!((job.loaded, job.total), (100, 500));
        assert_eq!(
            job.error.as_deref(),
            Some("source fetch failed: HTTP 404 Not Found")
        );
        assert!(ledger.list().await.unwrap().is_empty());
    }
}
