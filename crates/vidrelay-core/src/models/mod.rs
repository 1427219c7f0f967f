//! Data models for the application
//!
//! Job records and history entries are what the key-value store persists; the
//! request/response types are the JSON bodies of the HTTP surface.

mod download;
mod history;
mod job;

pub use download::*;
pub use history::*;
pub use job::*;
