//! Key-value store capability
//!
//! Job records and history entries live behind this trait. Keys are composite
//! and render to `seg/seg/...` strings whose lexicographic order matches the
//! order of their segments, so prefix listings come back sorted.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use vidrelay_core::AppError;

/// Width integer segments are zero-padded to (fits any non-negative i64).
const INT_SEGMENT_WIDTH: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for KvError {
    fn from(err: sqlx::Error) -> Self {
        KvError::Backend(err.to_string())
    }
}

impl From<KvError> for AppError {
    fn from(err: KvError) -> Self {
        AppError::Kv(err.to_string())
    }
}

pub type KvResult<T> = Result<T, KvError>;

/// One segment of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySegment {
    Str(String),
    Int(i64),
}

impl From<&str> for KeySegment {
    fn from(value: &str) -> Self {
        KeySegment::Str(value.to_string())
    }
}

impl From<String> for KeySegment {
    fn from(value: String) -> Self {
        KeySegment::Str(value)
    }
}

impl From<i64> for KeySegment {
    fn from(value: i64) -> Self {
        KeySegment::Int(value)
    }
}

impl KeySegment {
    fn validate(&self) -> KvResult<()> {
        match self {
            KeySegment::Str(s) if s.is_empty() => {
                Err(KvError::InvalidKey("empty key segment".to_string()))
            }
            KeySegment::Str(s) if s.contains('/') => Err(KvError::InvalidKey(format!(
                "key segment '{}' contains '/'",
                s
            ))),
            KeySegment::Int(n) if *n < 0 => Err(KvError::InvalidKey(format!(
                "integer key segment {} is negative",
                n
            ))),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for KeySegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySegment::Str(s) => write!(f, "{}", s),
            KeySegment::Int(n) => write!(f, "{:0width$}", n, width = INT_SEGMENT_WIDTH),
        }
    }
}

/// Composite key made of ordered, validated segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    segments: Vec<KeySegment>,
}

impl Key {
    /// Build a key from its segments. At least one segment is required.
    pub fn new<I, S>(segments: I) -> KvResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<KeySegment>,
    {
        let segments: Vec<KeySegment> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(KvError::InvalidKey("key has no segments".to_string()));
        }
        for segment in &segments {
            segment.validate()?;
        }
        Ok(Self { segments })
    }

    /// Extend the key with one more segment.
    pub fn child(&self, segment: impl Into<KeySegment>) -> KvResult<Self> {
        let segment = segment.into();
        segment.validate()?;
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[KeySegment] {
        &self.segments
    }

    /// Rendered form used by every backend.
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Rendered prefix matching keys strictly under this one.
    pub fn list_prefix(&self) -> String {
        format!("{}/", self.render())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Options for prefix listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Maximum number of entries; unbounded when `None`
    pub limit: Option<usize>,
    /// Descending key order when set
    pub reverse: bool,
}

impl ListOptions {
    pub fn newest_first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            reverse: true,
        }
    }
}

/// A listed entry: rendered key and its stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct KvEntry {
    pub key: String,
    pub value: Value,
}

impl KvEntry {
    pub fn decode<T: DeserializeOwned>(&self) -> KvResult<T> {
        Ok(serde_json::from_value(self.value.clone())?)
    }
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &Key) -> KvResult<Option<Value>>;

    async fn set(&self, key: &Key, value: Value) -> KvResult<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &Key) -> KvResult<()>;

    /// Entries strictly under `prefix`, ordered by rendered key.
    async fn list(&self, prefix: &Key, options: ListOptions) -> KvResult<Vec<KvEntry>>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable.
    async fn check_connection(&self) -> KvResult<()> {
        Ok(())
    }
}

/// Typed read on top of [`KeyValueStore::get`].
pub async fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &Key,
) -> KvResult<Option<T>> {
    match store.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Typed write on top of [`KeyValueStore::set`].
pub async fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &Key,
    value: &T,
) -> KvResult<()> {
    store.set(key, serde_json::to_value(value)?).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pads_integers() {
        let key = Key::new(["history"]).unwrap().child(42i64).unwrap();
        assert_eq!(key.render(), "history/00000000000000000042");
    }

    #[test]
    fn test_padded_order_matches_numeric_order() {
        let small = Key::new(["h"]).unwrap().child(9i64).unwrap().render();
        let large = Key::new(["h"]).unwrap().child(10i64).unwrap().render();
        assert!(small < large);
    }

    #[test]
    fn test_rejects_invalid_segments() {
        assert!(matches!(
            Key::new(Vec::<KeySegment>::new()),
            Err(KvError::InvalidKey(_))
        ));
        assert!(Key::new([""]).is_err());
        assert!(Key::new(["a/b"]).is_err());
        assert!(Key::new(["jobs"]).unwrap().child(-1i64).is_err());
    }

    #[test]
    fn test_list_prefix_has_trailing_separator() {
        let key = Key::new(["jobs"]).unwrap();
        assert_eq!(key.list_prefix(), "jobs/");
    }

    #[test]
    fn test_kv_error_maps_to_app_error() {
        let err: AppError = KvError::Backend("down".to_string()).into();
        assert!(matches!(err, AppError::Kv(msg) if msg.contains("down")));
    }
}
