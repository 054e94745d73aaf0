//! Content-addressed chunk store with completion verification.
//!
//! Chunk identity is the composite key (upload id, chunk number, chunk
//! digest); the key resolution lives here so the backing [`ObjectStore`] is
//! swappable. Re-uploading identical bytes overwrites in place, which makes
//! puts naturally idempotent.

use crate::error::{StorageError, StorageResult};
use crate::traits::ObjectStore;
use bytes::Bytes;
use std::sync::Arc;
use tracing::instrument;
use upchunk_core::{ChunkDigest, ContentHash, UploadId, UploadSession};

/// Content-addressed persistence of chunk bytes for upload sessions.
#[derive(Clone)]
pub struct ChunkStore {
    store: Arc<dyn ObjectStore>,
}

impl ChunkStore {
    /// Create a chunk store over an object store backend.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Access the underlying object store.
    pub fn object_store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Key prefix holding all chunk objects of a session.
    pub fn session_prefix(upload_id: UploadId) -> String {
        format!("uploads/{upload_id}")
    }

    /// Object key for one chunk of a session.
    pub fn chunk_key(upload_id: UploadId, chunk_num: u32, digest: &ChunkDigest) -> String {
        format!("uploads/{upload_id}/chunk.{chunk_num}.{}", digest.to_hex())
    }

    /// Object key of the reassembled artifact for a committed session.
    pub fn artifact_key(upload_id: UploadId) -> String {
        format!("files/{upload_id}")
    }

    /// Check whether a chunk is already stored with the declared size.
    #[instrument(skip(self, digest), fields(upload_id = %upload_id, chunk_num))]
    pub async fn check_chunk(
        &self,
        upload_id: UploadId,
        chunk_num: u32,
        chunk_size: u64,
        digest: &ChunkDigest,
    ) -> StorageResult<bool> {
        let key = Self::chunk_key(upload_id, chunk_num, digest);
        match self.store.head(&key).await {
            Ok(meta) => Ok(meta.size == chunk_size),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Persist chunk bytes at their content-addressed key.
    ///
    /// Rejects with [`StorageError::DigestMismatch`] when the bytes do not
    /// hash to the declared digest; nothing is persisted in that case.
    #[instrument(skip(self, digest, data), fields(upload_id = %upload_id, chunk_num, size = data.len()))]
    pub async fn put_chunk(
        &self,
        upload_id: UploadId,
        chunk_num: u32,
        digest: &ChunkDigest,
        data: Bytes,
    ) -> StorageResult<()> {
        let actual = ChunkDigest::compute(&data);
        if &actual != digest {
            return Err(StorageError::DigestMismatch {
                expected: digest.to_hex(),
                actual: actual.to_hex(),
            });
        }

        let key = Self::chunk_key(upload_id, chunk_num, digest);
        self.store.put(&key, data).await
    }

    /// Verify completeness and, if consistent, commit the final artifact.
    ///
    /// Commits iff the stored chunk count equals the session's chunk count,
    /// the stored sizes sum to the session's file size, and hashing the chunk
    /// bytes in ascending chunk-number order reproduces the session's file
    /// digest. On success the chunks are concatenated into the artifact and
    /// the whole session prefix (chunk objects and their directory) is
    /// deleted; on any mismatch this returns false with no side effects.
    ///
    /// Not synchronized against concurrent `put_chunk` calls for the same
    /// session; callers must only invoke this once all chunk uploads have
    /// completed, or be prepared for a spurious not-committed result. A bad
    /// commit is impossible either way: the digest check gates it.
    #[instrument(skip(self, session), fields(upload_id = %session.id))]
    pub async fn try_finish(&self, session: &UploadSession) -> StorageResult<bool> {
        let upload_id = session.id;
        let identity = &session.identity;

        let mut stored = self.stored_chunks(upload_id).await?;
        stored.sort_by_key(|c| c.num);

        if stored.len() as u64 != identity.num_chunks as u64 {
            tracing::debug!(
                stored = stored.len(),
                expected = identity.num_chunks,
                "chunk count mismatch, not committing"
            );
            return Ok(false);
        }

        let mut total_size = 0u64;
        for chunk in &stored {
            total_size += self.store.head(&chunk.key).await?.size;
        }
        if total_size != identity.file_size {
            tracing::debug!(
                total_size,
                expected = identity.file_size,
                "size sum mismatch, not committing"
            );
            return Ok(false);
        }

        // Single pass over the chunk bytes: hash and concatenate together,
        // then decide. The streaming upload stays invisible until finished.
        let mut hasher = ContentHash::hasher();
        let mut artifact = self
            .store
            .put_stream(&Self::artifact_key(upload_id))
            .await?;
        for chunk in &stored {
            let data = self.store.get(&chunk.key).await?;
            hasher.update(&data);
            if let Err(e) = artifact.write(data).await {
                let _ = artifact.abort().await;
                return Err(e);
            }
        }

        let digest = hasher.finalize();
        if &digest != identity.file_digest.content_hash() {
            tracing::warn!(
                actual = %digest,
                expected = %identity.file_digest,
                "assembled digest mismatch, not committing"
            );
            artifact.abort().await?;
            return Ok(false);
        }

        artifact.finish().await?;

        // The chunk objects and their session directory are no longer needed.
        self.store
            .delete_prefix(&Self::session_prefix(upload_id))
            .await?;

        tracing::info!(artifact = %Self::artifact_key(upload_id), "upload committed");
        Ok(true)
    }

    /// List the chunk objects currently stored for a session.
    async fn stored_chunks(&self, upload_id: UploadId) -> StorageResult<Vec<StoredChunk>> {
        let prefix = Self::session_prefix(upload_id);
        let keys = self.store.list(&prefix).await?;

        let mut chunks = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(num) = parse_chunk_num(&key) {
                chunks.push(StoredChunk { num, key });
            }
            // Keys that don't match the chunk naming (e.g. in-flight temp
            // files) are ignored.
        }
        Ok(chunks)
    }
}

struct StoredChunk {
    num: u32,
    key: String,
}

/// Extract the chunk number from a key of the form
/// `uploads/{id}/chunk.{num}.{64-hex-digest}`.
fn parse_chunk_num(key: &str) -> Option<u32> {
    let name = key.rsplit('/').next()?;
    let mut parts = name.split('.');
    if parts.next()? != "chunk" {
        return None;
    }
    let num = parts.next()?.parse().ok()?;
    let digest = parts.next()?;
    if parts.next().is_some() || !upchunk_core::hash::is_hex_digest(digest) {
        return None;
    }
    Some(num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chunk_num() {
        let hex = "a".repeat(64);
        assert_eq!(parse_chunk_num(&format!("uploads/x/chunk.7.{hex}")), Some(7));
        assert_eq!(parse_chunk_num(&format!("uploads/x/chunk.007.{hex}")), Some(7));
        assert_eq!(parse_chunk_num("uploads/x/chunk.7.nothex"), None);
        assert_eq!(parse_chunk_num(&format!("uploads/x/other.7.{hex}")), None);
        assert_eq!(
            parse_chunk_num(&format!("uploads/x/chunk.7.{hex}.tmp.abc")),
            None
        );
    }

    #[test]
    fn test_key_layout() {
        let id = UploadId::new();
        let digest = ChunkDigest::compute(b"x");
        let key = ChunkStore::chunk_key(id, 3, &digest);
        assert!(key.starts_with(&format!("uploads/{id}/chunk.3.")));
        assert!(key.ends_with(&digest.to_hex()));
        assert_eq!(ChunkStore::artifact_key(id), format!("files/{id}"));
    }
}
