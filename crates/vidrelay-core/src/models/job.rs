use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "unknown" => Ok(JobStatus::Unknown),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// A single tracked upload attempt.
///
/// `url` is only set once the job completed and `error` only once it failed.
/// Use the constructors rather than building the struct by hand so that
/// invariant holds for every record written to the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct Job {
    pub status: JobStatus,
    /// Bytes relayed so far
    #[serde(default)]
    pub loaded: u64,
    /// Declared source size in bytes, 0 when the source did not say
    #[serde(default)]
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    /// In-flight record. `loaded` is clamped to `total` when the total is known.
    pub fn processing(loaded: u64, total: u64) -> Self {
        let loaded = if total > 0 { loaded.min(total) } else { loaded };
        Self {
            status: JobStatus::Processing,
            loaded,
            total,
            url: None,
            error: None,
        }
    }

    pub fn completed(loaded: u64, total: u64, url: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            loaded,
            total,
            url: Some(url.into()),
            error: None,
        }
    }

    pub fn failed(loaded: u64, total: u64, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "upload failed".to_string();
        }
        Self {
            status: JobStatus::Failed,
            loaded,
            total,
            url: None,
            error: Some(error),
        }
    }

    /// What a poll for an id with no record reports.
    pub fn unknown() -> Self {
        Self {
            status: JobStatus::Unknown,
            loaded: 0,
            total: 0,
            url: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadRequest {
    /// Source URL to fetch the video from
    pub url: Option<String>,
    /// Overrides the filename derived from the source URL
    #[serde(default)]
    pub custom_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartUploadResponse {
    pub job_id: Uuid,
}
