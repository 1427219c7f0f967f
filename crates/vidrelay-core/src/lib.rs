//! Vidrelay Core Library
//!
//! Domain models, error types, configuration and filename rules shared by every
//! vidrelay crate.

pub mod config;
pub mod constants;
pub mod error;
pub mod filename;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, RelayConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use filename::derive_filename;
pub use storage_types::StorageBackend;
