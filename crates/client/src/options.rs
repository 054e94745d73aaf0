//! Upload options and caller-facing callbacks.

use std::sync::Arc;
use upchunk_core::DEFAULT_CHUNK_SIZE;

/// Severity passed to the log callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// Log line callback.
pub type LogCallback = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Progress callback: `(name, current, total, fraction)` where `fraction`
/// is `current / total` rounded to two decimal places.
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64, f64) + Send + Sync>;

/// Options for an upload run.
#[derive(Clone)]
pub struct UploadOptions {
    /// Server endpoint, e.g. `http://127.0.0.1:8080/upload`.
    pub endpoint: String,
    /// Chunk size in bytes.
    pub chunk_size: u64,
    /// Number of chunks transferred concurrently.
    pub num_simultaneous_uploads: usize,
    /// Attempts per chunk before the upload fails.
    pub max_chunk_attempts: u32,
    /// Log line callback.
    pub log: Option<LogCallback>,
    /// Progress of the whole-file digest pass, per 10 MiB block.
    pub file_digest_progress: Option<ProgressCallback>,
    /// Progress of the per-chunk digest pass, per chunk.
    pub chunk_digest_progress: Option<ProgressCallback>,
    /// Progress of the chunk transfer, per completed chunk.
    pub upload_progress: Option<ProgressCallback>,
}

impl UploadOptions {
    /// Options with defaults, uploading to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            num_simultaneous_uploads: 2,
            max_chunk_attempts: 5,
            log: None,
            file_digest_progress: None,
            chunk_digest_progress: None,
            upload_progress: None,
        }
    }
}

/// Round a fraction to two decimal places for progress reporting.
pub fn round_to2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
