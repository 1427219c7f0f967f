//! Vidrelay Storage Library
//!
//! Object storage abstraction and its S3-compatible and local filesystem
//! implementations, plus the signed tokens that protect local download links.
//!
//! # Storage key format
//!
//! Relayed objects are stored under their derived filename (`clip.mp4`). Keys must
//! not be empty, start with `/`, or contain a `..` segment; validation lives in
//! the `keys` module so all backends agree.

pub mod factory;
pub mod keys;
pub mod link_token;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::{create_storage, ConfiguredStorage};
pub use link_token::{LinkSigner, LinkTokenError};
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
#[cfg(feature = "storage-s3")]
pub use s3::{S3Settings, S3Storage};
pub use traits::{
    ObjectStorage, ObjectStream, ResponseOverrides, StorageError, StorageResult, StoredObject,
};
pub use vidrelay_core::StorageBackend;
