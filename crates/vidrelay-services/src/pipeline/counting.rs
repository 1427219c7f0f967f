//! Counting stage between the source body and the object store.
//!
//! Every chunk is forwarded unchanged after the tracker has accounted for it,
//! so progress updates are written in byte order from the relaying task.

use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use vidrelay_core::AppError;
use vidrelay_storage::{ObjectStream, StorageError};

use super::progress::ProgressTracker;

/// Why the counting stage cut the stream short.
#[derive(Debug)]
pub enum StageFailure {
    /// The source body failed mid-transfer
    Source(String),
    /// The job store rejected a progress update
    Progress(AppError),
}

/// Tracker state shared between the counting stage and the pipeline.
pub struct CountingState {
    pub tracker: ProgressTracker,
    pub failure: Option<StageFailure>,
}

pub type SharedCountingState = Arc<Mutex<CountingState>>;

pub fn shared_state(tracker: ProgressTracker) -> SharedCountingState {
    Arc::new(Mutex::new(CountingState {
        tracker,
        failure: None,
    }))
}

/// Wrap a source body so each chunk is counted before it reaches storage.
///
/// A source error or failed progress update is stored in the shared state and
/// surfaces to storage as a single error item, after which the stream ends.
/// The tracker's final update is published when the source is exhausted.
pub fn counting_stream<S, E>(source: S, state: SharedCountingState) -> ObjectStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let source = Box::pin(source);

    let stream = futures::stream::unfold(
        (source, state, false),
        |(mut source, state, done)| async move {
            if done {
                return None;
            }

            match source.next().await {
                Some(Ok(chunk)) => {
                    let mut guard = state.lock().await;
                    match guard.tracker.record(chunk.len() as u64).await {
                        Ok(()) => {
                            drop(guard);
                            Some((Ok(chunk), (source, state, false)))
                        }
                        Err(e) => {
                            let item = Err(StorageError::UploadFailed(format!(
                                "progress update failed: {}",
                                e
                            )));
                            guard.failure = Some(StageFailure::Progress(e));
                            drop(guard);
                            Some((item, (source, state, true)))
                        }
                    }
                }
                Some(Err(e)) => {
                    let message = e.to_string();
                    let item = Err(StorageError::UploadFailed(format!(
                        "source stream failed: {}",
                        message
                    )));
                    state.lock().await.failure = Some(StageFailure::Source(message));
                    Some((item, (source, state, true)))
                }
                None => {
                    let mut guard = state.lock().await;
                    match guard.tracker.finish().await {
                        Ok(()) => None,
                        Err(e) => {
                            let item = Err(StorageError::UploadFailed(format!(
                                "progress update failed: {}",
                                e
                            )));
                            guard.failure = Some(StageFailure::Progress(e));
                            drop(guard);
                            Some((item, (source, state, true)))
                        }
                    }
                }
            }
        },
    );

    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::ByteIntervalPolicy;
    use async_trait::async_trait;
    use serde_json::Value;
    use uuid::Uuid;
    use vidrelay_db::{JobManager, Key, KeyValueStore, KvEntry, KvError, KvResult, ListOptions, MemoryKv};

    /// Store that accepts the initial record and rejects every later write.
    struct FailingAfterCreate {
        inner: MemoryKv,
        writes: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl KeyValueStore for FailingAfterCreate {
        async fn get(&self, key: &Key) -> KvResult<Option<Value>> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &Key, value: Value) -> KvResult<()> {
            if self
                .writes
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
                > 0
            {
                return Err(KvError::Backend("connection reset".to_string()));
            }
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &Key) -> KvResult<()> {
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<KvEntry>> {
            self.inner.list(prefix, options).await
        }

        fn backend_name(&self) -> &'static str {
            "failing"
        }
    }

    async fn drain(mut stream: ObjectStream) -> (Vec<u8>, Option<StorageError>) {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            match item {
                Ok(chunk) => out.extend_from_slice(&chunk),
                Err(e) => return (out, Some(e)),
            }
        }
        (out, None)
    }

    #[tokio::test]
    async fn test_chunks_pass_through_unchanged() {
        let jobs = JobManager::new(Arc::new(MemoryKv::new()));
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();
        let state = shared_state(ProgressTracker::new(
            jobs.clone(),
            id,
            6,
            Arc::new(ByteIntervalPolicy::new(4)),
        ));

        let source = futures::stream::iter(vec![
            Ok::<_, String>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ]);
        let (bytes, error) = drain(counting_stream(source, state.clone())).await;

        assert_eq!(bytes, b"abcdef");
        assert!(error.is_none());
        assert_eq!(state.lock().await.tracker.loaded(), 6);
        assert_eq!(jobs.get(id).await.unwrap().unwrap().loaded, 6);
    }

    #[tokio::test]
    async fn test_source_error_is_recorded_and_ends_stream() {
        let jobs = JobManager::new(Arc::new(MemoryKv::new()));
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();
        let state = shared_state(ProgressTracker::new(
            jobs,
            id,
            0,
            Arc::new(ByteIntervalPolicy::default()),
        ));

        let source = futures::stream::iter(vec![
            Ok(Bytes::from_static(b"abc")),
            Err("connection reset by peer".to_string()),
            Ok(Bytes::from_static(b"never")),
        ]);
        let (bytes, error) = drain(counting_stream(source, state.clone())).await;

        assert_eq!(bytes, b"abc");
        assert!(error.is_some());
        assert!(matches!(
            state.lock().await.failure,
            Some(StageFailure::Source(ref msg)) if msg.contains("connection reset")
        ));
    }

    #[tokio::test]
    async fn test_progress_failure_is_fatal() {
        let store = Arc::new(FailingAfterCreate {
            inner: MemoryKv::new(),
            writes: std::sync::atomic::AtomicUsize::new(0),
        });
        let jobs = JobManager::new(store);
        let id = Uuid::new_v4();
        jobs.create(id).await.unwrap();
        let state = shared_state(ProgressTracker::new(
            jobs,
            id,
            0,
            Arc::new(ByteIntervalPolicy::new(1)),
        ));

        let source = futures::stream::iter(vec![
            Ok::<_, String>(Bytes::from_static(b"abc")),
            Ok(Bytes::from_static(b"def")),
        ]);
        let (bytes, error) = drain(counting_stream(source, state.clone())).await;

        assert!(bytes.is_empty());
        assert!(error.is_some());
        assert!(matches!(
            state.lock().await.failure,
            Some(StageFailure::Progress(AppError::Kv(_)))
        ));
    }
}
