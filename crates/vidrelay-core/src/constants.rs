//! Shared constants
//!
//! Key-value prefixes and the content types the relay writes and serves.

/// Key-value prefix for job records (`jobs/<uuid>`)
pub const JOBS_PREFIX: &str = "jobs";

/// Key-value prefix for history entries (`history/<ts>`)
pub const HISTORY_PREFIX: &str = "history";

/// Content type stored on every relayed object
pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

/// Content type forced on download links so browsers save instead of play
pub const DOWNLOAD_CONTENT_TYPE: &str = "application/octet-stream";

/// Default number of history entries returned by a listing
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default progress publication interval (2 MiB)
pub const DEFAULT_PROGRESS_INTERVAL_BYTES: u64 = 2 * 1024 * 1024;
