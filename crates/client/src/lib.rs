//! Resumable chunked upload client.
//!
//! Splits files into chunks, digests them, and transfers them through a
//! bounded worker pool with dedup probes, bounded retries and cancellation.
//! The server commits an upload only once every chunk is present and the
//! reassembled bytes hash to the declared file digest.

pub mod api;
pub mod digest;
pub mod error;
pub mod options;
pub mod pool;
pub mod transport;
pub mod uploader;

pub use api::{ApiClient, ChunkTransfer};
pub use error::{ClientError, ClientResult};
pub use options::{LogCallback, LogLevel, ProgressCallback, UploadOptions, round_to2};
pub use pool::{ChunkJob, run_pool};
pub use uploader::{Upchunker, UploadReport};
