use crate::keys::{encode_key_path, validate_key};
use crate::link_token::LinkSigner;
use crate::traits::{
    ObjectStorage, ObjectStream, ResponseOverrides, StorageError, StorageResult, StoredObject,
};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Query parameter carrying the signed token on local download links
pub const TOKEN_PARAM: &str = "token";
/// Query parameters mirroring the S3 response override names
pub const DISPOSITION_PARAM: &str = "response-content-disposition";
pub const CONTENT_TYPE_PARAM: &str = "response-content-type";

/// Local filesystem storage implementation
///
/// Download links point at `base_url`, which the API serves from the
/// `/files` route after verifying the link token.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
    signer: LinkSigner,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage (e.g., "/var/lib/vidrelay/objects")
    /// * `base_url` - Base URL the files route is reachable at (e.g., "http://localhost:8000/files")
    /// * `signer` - Signs download links
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        signer: LinkSigner,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            base_url,
            signer,
        })
    }

    /// Convert storage key to filesystem path with security validation
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;

        let path = self.base_path.join(storage_key);

        if let Ok(canonical) = path.canonicalize() {
            let base_canonical = self.base_path.canonicalize().map_err(|e| {
                StorageError::ConfigError(format!("Failed to canonicalize base path: {}", e))
            })?;
            if canonical.strip_prefix(&base_canonical).is_err() {
                return Err(StorageError::InvalidKey(
                    "Storage key resolves outside storage directory".to_string(),
                ));
            }
        }

        Ok(path)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Per-write temp file beside the target; concurrent writes to one key never share it.
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{}.partial", Uuid::new_v4()));
        PathBuf::from(name)
    }

    async fn write_body(
        &self,
        partial: &Path,
        mut body: ObjectStream,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(partial).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                partial.display(),
                e
            ))
        })?;

        let mut written: u64 = 0;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await.map_err(|e| {
                StorageError::UploadFailed(format!(
                    "Failed to write file {}: {}",
                    partial.display(),
                    e
                ))
            })?;
            written += chunk.len() as u64;
        }

        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                partial.display(),
                e
            ))
        })?;

        Ok(written)
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put_stream(
        &self,
        key: &str,
        _content_type: &str,
        size_hint: Option<u64>,
        body: ObjectStream,
    ) -> StorageResult<StoredObject> {
        let path = self.key_to_path(key)?;
        self.ensure_parent_dir(&path).await?;

        let start = std::time::Instant::now();
        // Written beside the target and renamed on success, so readers never see a partial object.
        let partial = Self::partial_path(&path);

        let size = match self.write_body(&partial, body).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            error = %cleanup,
                            path = %partial.display(),
                            "Failed to remove partial upload"
                        );
                    }
                }
                tracing::error!(
                    error = %e,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local stream upload failed"
                );
                return Err(e);
            }
        };

        // Last rename wins when two writes target the same key.
        if let Err(e) = fs::rename(&partial, &path).await {
            if let Err(cleanup) = fs::remove_file(&partial).await {
                tracing::warn!(
                    error = %cleanup,
                    path = %partial.display(),
                    "Failed to remove partial upload"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            declared_bytes = ?size_hint,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local stream upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            url: self.object_url(key),
            size,
        })
    }

    async fn presigned_download_url(
        &self,
        key: &str,
        expires_in: Duration,
        overrides: &ResponseOverrides,
    ) -> StorageResult<String> {
        validate_key(key)?;
        let (token, _) = self
            .signer
            .create(key, overrides, expires_in)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let mut url = format!("{}?{}={}", self.object_url(key), TOKEN_PARAM, token);
        if let Some(disposition) = &overrides.content_disposition {
            url.push_str(&format!(
                "&{}={}",
                DISPOSITION_PARAM,
                utf8_percent_encode(disposition, NON_ALPHANUMERIC)
            ));
        }
        if let Some(content_type) = &overrides.content_type {
            url.push_str(&format!(
                "&{}={}",
                CONTENT_TYPE_PARAM,
                utf8_percent_encode(content_type, NON_ALPHANUMERIC)
            ));
        }

        Ok(url)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            encode_key_path(key)
        )
    }

    async fn download_stream(&self, key: &str) -> StorageResult<ObjectStream> {
        let path = self.key_to_path(key)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            StorageError::DownloadFailed(format!("Failed to open file {}: {}", path.display(), e))
        })?;

        let key = key.to_string();
        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        let path = self.key_to_path(key)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    async fn check_connection(&self) -> StorageResult<()> {
        let metadata = fs::metadata(&self.base_path).await?;
        if !metadata.is_dir() {
            return Err(StorageError::ConfigError(format!(
                "{} is not a directory",
                self.base_path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    const BASE_URL: &str = "http://localhost:8000/files";

    fn signer() -> LinkSigner {
        LinkSigner::new("0123456789abcdef0123456789abcdef").unwrap()
    }

    fn body(chunks: Vec<&'static [u8]>) -> ObjectStream {
        Box::pin(futures::stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c))),
        ))
    }

    async fn collect(mut stream: ObjectStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_put_stream_and_download() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();

        let stored = storage
            .put_stream("clip.mp4", "video/mp4", Some(9), body(vec![b"test", b" data"]))
            .await
            .unwrap();

        assert_eq!(stored.size, 9);
        assert_eq!(stored.url, "http://localhost:8000/files/clip.mp4");
        assert!(storage.exists("clip.mp4").await.unwrap());

        let downloaded = collect(storage.download_stream("clip.mp4").await.unwrap()).await;
        assert_eq!(downloaded, b"test data");
    }

    #[tokio::test]
    async fn test_failed_body_leaves_no_object() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();

        let failing: ObjectStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(StorageError::UploadFailed("source went away".to_string())),
        ]));

        let result = storage
            .put_stream("broken.mp4", "video/mp4", None, failing)
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(msg)) if msg.contains("source went away")));
        assert!(!storage.exists("broken.mp4").await.unwrap());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn repeated(byte: u8, chunks: usize) -> ObjectStream {
        Box::pin(futures::stream::iter((0..chunks).map(move |_| {
            Ok::<_, StorageError>(Bytes::from(vec![byte; 4096]))
        })))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_writes_to_same_key_do_not_interleave() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();

        let (first, second) = tokio::join!(
            storage.put_stream("video.mp4", "video/mp4", None, repeated(b'a', 64)),
            storage.put_stream("video.mp4", "video/mp4", None, repeated(b'b', 64)),
        );
        assert_eq!(first.unwrap().size, 64 * 4096);
        assert_eq!(second.unwrap().size, 64 * 4096);

        let stored = collect(storage.download_stream("video.mp4").await.unwrap()).await;
        assert_eq!(stored.len(), 64 * 4096);
        assert!(stored.iter().all(|b| *b == stored[0]));

        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("video.mp4")]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();

        let result = storage.download_stream("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage.exists("/etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put_stream("../escape.mp4", "video/mp4", None, body(vec![b"x"]))
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_download_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();

        let result = storage.download_stream("missing.mp4").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_presigned_url_carries_verifiable_token() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();
        let overrides = ResponseOverrides::attachment("my clip.mp4");

        let url = storage
            .presigned_download_url("my clip.mp4", Duration::from_secs(3600), &overrides)
            .await
            .unwrap();

        assert!(url.starts_with("http://localhost:8000/files/my%20clip.mp4?token="));
        assert!(url.contains("&response-content-disposition=attachment%3B%20filename%3D%22my%20clip%2Emp4%22"));
        assert!(url.contains("&response-content-type=application%2Foctet%2Dstream"));

        let token = url
            .split("token=")
            .nth(1)
            .and_then(|rest| rest.split('&').next())
            .unwrap();
        assert!(signer().verify(token, "my clip.mp4", &overrides).is_ok());
    }

    #[tokio::test]
    async fn test_check_connection() {
        let dir = tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), BASE_URL.to_string(), signer())
            .await
            .unwrap();
        assert!(storage.check_connection().await.is_ok());
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }
}
