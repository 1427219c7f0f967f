use std::sync::Arc;

use uuid::Uuid;
use vidrelay_core::constants::JOBS_PREFIX;
use vidrelay_core::models::Job;
use vidrelay_core::AppError;

use crate::kv::{get_json, set_json, Key, KeyValueStore};

/// Repository for job records (`jobs/<uuid>`)
///
/// Updates overwrite the whole record; a job is only ever written by the
/// pipeline that owns it, so there is no compare-and-swap.
#[derive(Clone)]
pub struct JobManager {
    store: Arc<dyn KeyValueStore>,
}

impl JobManager {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn key(job_id: Uuid) -> Result<Key, AppError> {
        Ok(Key::new([JOBS_PREFIX])?.child(job_id.to_string())?)
    }

    /// Create the initial `processing` record with nothing loaded yet
    #[tracing::instrument(skip(self))]
    pub async fn create(&self, job_id: Uuid) -> Result<(), AppError> {
        self.update(job_id, Job::processing(0, 0)).await
    }

    /// Get a job, `None` when no record exists
    pub async fn get(&self, job_id: Uuid) -> Result<Option<Job>, AppError> {
        let key = Self::key(job_id)?;
        Ok(get_json(self.store.as_ref(), &key).await?)
    }

    /// Overwrite the job record
    pub async fn update(&self, job_id: Uuid, job: Job) -> Result<(), AppError> {
        let key = Self::key(job_id)?;
        set_json(self.store.as_ref(), &key, &job).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryKv;
    use vidrelay_core::models::JobStatus;

    fn manager() -> JobManager {
        JobManager::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn test_create_starts_processing_at_zero() {
        let jobs = manager();
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.loaded, 0);
        assert_eq!(job.total, 0);
        assert!(job.url.is_none());
        assert!(job.error.is_none());
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        assert!(manager().get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_overwrites_record() {
        let jobs = manager();
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();
        jobs.update(id, Job::processing(10, 100)).await.unwrap();
        jobs.update(
            id,
            Job::completed(100, 100, "https://cdn.example.com/a.mp4".to_string()),
        )
        .await
        .unwrap();

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.loaded, 100);
        assert_eq!(job.url.as_deref(), Some("https://cdn.example.com/a.mp4"));
    }

    #[tokio::test]
    async fn test_jobs_are_isolated_by_id() {
        let jobs = manager();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        jobs.create(a).await.unwrap();
        jobs.create(b).await.unwrap();
        jobs.update(a, Job::failed(0, 0, "boom".to_string()))
            .await
            .unwrap();

        assert_eq!(
            jobs.get(b).await.unwrap().unwrap().status,
            JobStatus::Processing
        );
    }
}
