//! Core domain types and shared logic for the upchunk upload protocol.
//!
//! This crate defines the canonical data model used across all other crates:
//! - Content hashes and digest newtypes
//! - The deterministic chunk plan
//! - Upload identity tuples and session lifecycle
//! - Wire protocol DTOs
//! - Configuration types

pub mod chunk;
pub mod config;
pub mod error;
pub mod hash;
pub mod upload;

pub use chunk::{plan_chunks, ChunkSpec};
pub use error::{Error, Result};
pub use hash::{ChunkDigest, ContentHash, ContentHasher, FileDigest};
pub use upload::{FileIdentity, StartResponse, UploadId, UploadSession};

/// Default chunk size: 1 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Maximum chunk size accepted by the server: 2 MiB
pub const MAX_CHUNK_SIZE: u64 = 2 * 1024 * 1024;

/// Maximum file size accepted by the server: 2 GiB
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Maximum number of chunks per upload: 2048
pub const MAX_NUM_CHUNKS: u64 = 2048;

/// Block size for streamed whole-file digesting: 10 MiB.
///
/// Independent of the chunk size; bounds memory while hashing large files.
pub const DIGEST_BLOCK_SIZE: u64 = 10 * 1024 * 1024;
