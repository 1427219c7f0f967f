//! Progress publication
//!
//! The tracker receives the cumulative byte count after every relayed chunk and
//! asks its policy whether the job record should be updated.

use std::sync::Arc;

use uuid::Uuid;
use vidrelay_core::models::Job;
use vidrelay_core::AppError;
use vidrelay_db::JobManager;

/// Decides when a progress update is written to the job store.
pub trait ProgressPolicy: Send + Sync {
    /// `last_published` is the `loaded` value of the previous update (0 before the first).
    fn should_publish(&self, last_published: u64, loaded: u64, total: u64) -> bool;
}

/// Publishes each time `loaded` crosses a multiple of `interval`, and once the
/// declared total is reached.
#[derive(Debug, Clone, Copy)]
pub struct ByteIntervalPolicy {
    interval: u64,
}

impl ByteIntervalPolicy {
    pub fn new(interval: u64) -> Self {
        Self {
            interval: interval.max(1),
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }
}

impl Default for ByteIntervalPolicy {
    fn default() -> Self {
        Self::new(vidrelay_core::constants::DEFAULT_PROGRESS_INTERVAL_BYTES)
    }
}

impl ProgressPolicy for ByteIntervalPolicy {
    fn should_publish(&self, last_published: u64, loaded: u64, total: u64) -> bool {
        if loaded <= last_published {
            return false;
        }
        loaded / self.interval > last_published / self.interval || (total > 0 && loaded == total)
    }
}

/// Tracks relayed bytes for one job and publishes `processing` updates.
pub struct ProgressTracker {
    jobs: JobManager,
    job_id: Uuid,
    total: u64,
    policy: Arc<dyn ProgressPolicy>,
    loaded: u64,
    last_published: u64,
    publications: u32,
}

impl ProgressTracker {
    pub fn new(jobs: JobManager, job_id: Uuid, total: u64, policy: Arc<dyn ProgressPolicy>) -> Self {
        Self {
            jobs,
            job_id,
            total,
            policy,
            loaded: 0,
            last_published: 0,
            publications: 0,
        }
    }

    pub fn loaded(&self) -> u64 {
        self.loaded
    }

    /// Number of updates written so far
    pub fn publications(&self) -> u32 {
        self.publications
    }

    /// Account for one relayed chunk, publishing if the policy asks for it.
    pub async fn record(&mut self, chunk_len: u64) -> Result<(), AppError> {
        self.loaded += chunk_len;
        if self
            .policy
            .should_publish(self.last_published, self.loaded, self.total)
        {
            self.publish().await?;
        }
        Ok(())
    }

    /// Publish the final count if it has not been published yet.
    pub async fn finish(&mut self) -> Result<(), AppError> {
        if self.loaded != self.last_published {
            self.publish().await?;
        }
        Ok(())
    }

    async fn publish(&mut self) -> Result<(), AppError> {
        self.jobs
            .update(self.job_id, Job::processing(self.loaded, self.total))
            .await?;
        self.last_published = self.loaded;
        self.publications += 1;
        tracing::debug!(
            job_id = %self.job_id,
            loaded = self.loaded,
            total = self.total,
            "Progress published"
        );
        Ok(())
    }
}
