//! Pipeline error type
//!
//! A pipeline never retries; its error is recorded on the job as display text.

use vidrelay_core::AppError;
use vidrelay_storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Malformed URL, unsupported scheme, network failure, non-2xx status, or a body that broke off
    #[error("source fetch failed: {0}")]
    SourceFetch(String),

    #[error("store write failed: {0}")]
    StoreWrite(#[source] StorageError),

    /// The job store rejected a progress update
    #[error("progress update failed: {0}")]
    Progress(#[source] AppError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_fetch_message_carries_status() {
        let err = PipelineError::SourceFetch("HTTP 404 Not Found".to_string());
        assert_eq!(err.to_string(), "source fetch failed: HTTP 404 Not Found");
    }

    #[test]
    fn test_store_write_keeps_source() {
        use std::error::Error;
        let err = PipelineError::StoreWrite(StorageError::UploadFailed("reset".to_string()));
        assert!(err.to_string().contains("Upload failed: reset"));
        assert!(err.source().is_some());
    }
}
