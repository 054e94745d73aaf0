//! Client error types.

use thiserror::Error;

/// Client operation errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("transport failure after {attempts} attempts: {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected server response ({status}): {message}")]
    UnexpectedStatus { status: u16, message: String },

    #[error("chunk {chunk_num} rejected after {attempts} attempts")]
    ChunkRejected { chunk_num: u32, attempts: u32 },

    #[error("file is {size} bytes, exceeding the {max} byte limit")]
    FileTooLarge { size: u64, max: u64 },

    #[error("file needs {num_chunks} chunks, exceeding the {max} chunk limit")]
    TooManyChunks { num_chunks: u64, max: u64 },

    #[error("upload cancelled")]
    Cancelled,

    #[error(transparent)]
    Core(#[from] upchunk_core::Error),
}

impl ClientError {
    /// Whether this is a transport-level failure that aborts the upload.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }
}

/// Result type for client operations.
pub type ClientResult<T> = std::result::Result<T, ClientError>;
