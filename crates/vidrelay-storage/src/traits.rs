//! Object storage abstraction
//!
//! The relay only ever streams objects in, hands out signed retrieval links, and
//! (for the local backend) streams objects back out. Every backend implements
//! [`ObjectStorage`] so the pipeline and link resolver never see backend details.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;
use vidrelay_core::AppError;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Presigning failed: {0}")]
    PresignFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            StorageError::InvalidKey(msg) => AppError::InvalidInput(msg),
            StorageError::PresignFailed(msg) => AppError::LinkResolution(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Streamed object body, in both directions.
pub type ObjectStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Response headers a signed link forces on the eventual download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseOverrides {
    pub content_disposition: Option<String>,
    pub content_type: Option<String>,
}

impl ResponseOverrides {
    /// `attachment; filename="<name>"` with `application/octet-stream`, so browsers
    /// save the object instead of rendering it.
    pub fn attachment(filename: &str) -> Self {
        let safe: String = filename.chars().filter(|c| *c != '"' && *c != '\\').collect();
        Self {
            content_disposition: Some(format!("attachment; filename=\"{}\"", safe)),
            content_type: Some(vidrelay_core::constants::DOWNLOAD_CONTENT_TYPE.to_string()),
        }
    }
}

/// Result of a completed write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    /// Native object URL on the backend's own endpoint
    pub url: String,
    pub size: u64,
}

/// Storage abstraction trait
///
/// **Key format:** keys are flat object names (`clip.mp4`) or `/`-separated
/// paths. They must not be empty, start with `/`, or contain a `..` segment.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stream `body` into the object at `key`.
    ///
    /// The body is consumed chunk by chunk and never buffered whole. An error
    /// yielded by the body aborts the write and is returned unchanged.
    /// `size_hint` is the declared length, when the producer knows it.
    async fn put_stream(
        &self,
        key: &str,
        content_type: &str,
        size_hint: Option<u64>,
        body: ObjectStream,
    ) -> StorageResult<StoredObject>;

    /// Time-limited GET link for `key` carrying the given response overrides
    async fn presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
        overrides: &ResponseOverrides,
    ) -> StorageResult<String>;

    /// Native (unsigned) URL of the object
    fn object_url(&self, key: &str) -> String;

    /// Download an object as a stream
    async fn download_stream(&self, key: &str) -> StorageResult<ObjectStream>;

    /// Check if an object exists
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Verify the backend is reachable and writable
    async fn check_connection(&self) -> StorageResult<()>;
}
