//! Storage key validation and URL encoding shared by all backends.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::traits::{StorageError, StorageResult};

/// Characters escaped inside one URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

/// Reject keys that are empty, absolute, or escape their root.
pub fn validate_key(key: &str) -> StorageResult<()> {
    if key.trim().is_empty() {
        return Err(StorageError::InvalidKey("Storage key is empty".to_string()));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Storage key '{}' contains invalid characters",
            key
        )));
    }
    if key.split('/').any(|segment| segment == ".." || segment.is_empty()) {
        return Err(StorageError::InvalidKey(format!(
            "Storage key '{}' contains an empty or parent segment",
            key
        )));
    }
    Ok(())
}

/// Percent-encode each path segment of `key`, keeping the `/` separators.
pub fn encode_key_path(key: &str) -> String {
    key.split('/')
        .map(|segment| utf8_percent_encode(segment, PATH_SEGMENT).to_string())
        .collect::<Vec<_>>()
        .join("/")
}

/// Last path segment of a key, used as the download filename.
pub fn key_filename(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
