//! Vidrelay persistence
//!
//! The key-value capability with its in-memory and PostgreSQL backends, and the
//! job and history repositories built on top of it.

pub mod history;
pub mod jobs;
pub mod kv;
pub mod memory;
pub mod postgres;

pub use history::HistoryLedger;
pub use jobs::JobManager;
pub use kv::{Key, KeySegment, KeyValueStore, KvEntry, KvError, KvResult, ListOptions};
pub use memory::MemoryKv;
pub use postgres::PostgresKv;
