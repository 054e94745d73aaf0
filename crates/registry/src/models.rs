//! Database models for the upload session registry.

use crate::error::{RegistryError, RegistryResult};
use sqlx::FromRow;
use time::OffsetDateTime;
use upchunk_core::{FileDigest, FileIdentity, UploadId, UploadSession};
use uuid::Uuid;

/// Upload session record.
///
/// The identity columns (`file_name`, `file_size`, `file_num_chunks`,
/// `file_digest`) are covered by a unique index so concurrent starts for the
/// same file converge on a single session.
#[derive(Debug, Clone, FromRow)]
pub struct UploadRow {
    pub upload_id: Uuid,
    pub file_name: String,
    pub file_size: i64,
    pub file_num_chunks: i64,
    pub file_digest: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl UploadRow {
    /// Build a row from a domain session.
    pub fn from_session(session: &UploadSession) -> Self {
        Self {
            upload_id: *session.id.as_uuid(),
            file_name: session.identity.file_name.clone(),
            file_size: session.identity.file_size as i64,
            file_num_chunks: session.identity.num_chunks as i64,
            file_digest: session.identity.file_digest.to_hex(),
            created_at: session.created_at,
            updated_at: session.created_at,
        }
    }

    /// Convert a stored row back into a domain session.
    pub fn into_session(self) -> RegistryResult<UploadSession> {
        let id = UploadId::parse(&self.upload_id.as_hyphenated().to_string())
            .map_err(|e| RegistryError::InvalidRecord(e.to_string()))?;
        let file_digest = FileDigest::from_hex(&self.file_digest)
            .map_err(|e| RegistryError::InvalidRecord(e.to_string()))?;
        Ok(UploadSession {
            id,
            identity: FileIdentity {
                file_name: self.file_name,
                file_size: self.file_size as u64,
                num_chunks: self.file_num_chunks as u32,
                file_digest,
            },
            created_at: self.created_at,
        })
    }
}
