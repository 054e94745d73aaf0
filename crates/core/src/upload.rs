//! Upload session types and lifecycle.

use crate::hash::FileDigest;
use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse from a string. Accepts canonical hyphenated UUID v4 only.
    pub fn parse(s: &str) -> crate::Result<Self> {
        let uuid = Uuid::try_parse(s)
            .map_err(|e| crate::Error::UploadSession(format!("invalid upload ID: {e}")))?;
        if uuid.get_version_num() != 4 || s != uuid.as_hyphenated().to_string() {
            return Err(crate::Error::UploadSession(format!(
                "invalid upload ID: {s}"
            )));
        }
        Ok(Self(uuid))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity tuple of one logical upload.
///
/// Two uploads with an identical tuple are the same logical upload and share
/// a session (deduplication at file granularity).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileIdentity {
    /// File name as presented by the client.
    pub file_name: String,
    /// Total file size in bytes.
    pub file_size: u64,
    /// Number of chunks in the plan.
    pub num_chunks: u32,
    /// Whole-file SHA-256 digest.
    pub file_digest: FileDigest,
}

/// An upload session binding chunk uploads to one logical file transfer.
///
/// Created once per distinct identity tuple, never mutated, deleted when the
/// upload is committed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: UploadId,
    /// The identity tuple this session was created for.
    pub identity: FileIdentity,
    /// When the session was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl UploadSession {
    /// Create a new session for an identity tuple.
    pub fn new(identity: FileIdentity) -> Self {
        Self {
            id: UploadId::new(),
            identity,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Response body of a successful `start` call.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StartResponse {
    /// The session id to use for chunk and finish calls.
    #[serde(rename = "uploadId")]
    pub upload_id: UploadId,
}
