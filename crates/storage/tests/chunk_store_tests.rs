// Chunk store behavior: content-addressed puts, check semantics, and the
// completeness verification that gates the final commit.

use bytes::Bytes;
use std::sync::Arc;
use tempfile::TempDir;
use upchunk_core::{ChunkDigest, FileDigest, FileIdentity, UploadSession};
use upchunk_storage::{ChunkStore, FilesystemBackend, ObjectStore, StorageError};

async fn test_store() -> (TempDir, ChunkStore, Arc<dyn ObjectStore>) {
    let dir = TempDir::new().unwrap();
    let backend: Arc<dyn ObjectStore> =
        Arc::new(FilesystemBackend::new(dir.path()).await.unwrap());
    (dir, ChunkStore::new(Arc::clone(&backend)), backend)
}

fn session_for(chunks: &[&[u8]]) -> UploadSession {
    let mut all = Vec::new();
    for c in chunks {
        all.extend_from_slice(c);
    }
    UploadSession::new(FileIdentity {
        file_name: "data.bin".to_string(),
        file_size: all.len() as u64,
        num_chunks: chunks.len() as u32,
        file_digest: FileDigest::compute(&all),
    })
}

async fn put_all(store: &ChunkStore, session: &UploadSession, chunks: &[&[u8]]) {
    for (i, c) in chunks.iter().enumerate() {
        let digest = ChunkDigest::compute(c);
        store
            .put_chunk(session.id, (i + 1) as u32, &digest, Bytes::copy_from_slice(c))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_check_chunk_absent_then_present() {
    let (_dir, store, _) = test_store().await;
    let session = session_for(&[b"hello"]);
    let digest = ChunkDigest::compute(b"hello");

    assert!(!store.check_chunk(session.id, 1, 5, &digest).await.unwrap());

    store
        .put_chunk(session.id, 1, &digest, Bytes::from_static(b"hello"))
        .await
        .unwrap();

    assert!(store.check_chunk(session.id, 1, 5, &digest).await.unwrap());
    // Same digest but a different declared size is not a hit.
    assert!(!store.check_chunk(session.id, 1, 4, &digest).await.unwrap());
}

#[tokio::test]
async fn test_put_chunk_rejects_digest_mismatch() {
    let (_dir, store, backend) = test_store().await;
    let session = session_for(&[b"hello"]);
    let wrong = ChunkDigest::compute(b"other");

    let err = store
        .put_chunk(session.id, 1, &wrong, Bytes::from_static(b"hello"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DigestMismatch { .. }));

    // Nothing was persisted.
    let keys = backend
        .list(&ChunkStore::session_prefix(session.id))
        .await
        .unwrap();
    assert!(keys.is_empty());
}

#[tokio::test]
async fn test_put_chunk_is_idempotent() {
    let (_dir, store, _) = test_store().await;
    let session = session_for(&[b"hello"]);
    let digest = ChunkDigest::compute(b"hello");

    for _ in 0..2 {
        store
            .put_chunk(session.id, 1, &digest, Bytes::from_static(b"hello"))
            .await
            .unwrap();
    }
    assert!(store.check_chunk(session.id, 1, 5, &digest).await.unwrap());
}

#[tokio::test]
async fn test_try_finish_commits_and_cleans_up() {
    let (dir, store, backend) = test_store().await;
    let chunks: &[&[u8]] = &[b"hello ", b"chunked ", b"world"];
    let session = session_for(chunks);
    put_all(&store, &session, chunks).await;

    assert!(store.try_finish(&session).await.unwrap());

    let artifact = backend
        .get(&ChunkStore::artifact_key(session.id))
        .await
        .unwrap();
    assert_eq!(&artifact[..], b"hello chunked world");

    // Chunk objects are gone after commit.
    let keys = backend
        .list(&ChunkStore::session_prefix(session.id))
        .await
        .unwrap();
    assert!(keys.is_empty());

    // The session directory itself is pruned too, not just its contents.
    let session_dir = dir.path().join("uploads").join(session.id.to_string());
    assert!(
        !session_dir.exists(),
        "session directory left behind after commit"
    );
}

#[tokio::test]
async fn test_try_finish_missing_chunk_does_not_commit() {
    let (_dir, store, backend) = test_store().await;
    let chunks: &[&[u8]] = &[b"aaaa", b"bbbb", b"cccc"];
    let session = session_for(chunks);

    // Upload all but the middle chunk.
    for (i, c) in chunks.iter().enumerate() {
        if i == 1 {
            continue;
        }
        let digest = ChunkDigest::compute(c);
        store
            .put_chunk(session.id, (i + 1) as u32, &digest, Bytes::copy_from_slice(c))
            .await
            .unwrap();
    }

    assert!(!store.try_finish(&session).await.unwrap());

    // No artifact, stored chunks untouched.
    let artifact = backend.get(&ChunkStore::artifact_key(session.id)).await;
    assert!(matches!(artifact, Err(StorageError::NotFound(_))));
    let keys = backend
        .list(&ChunkStore::session_prefix(session.id))
        .await
        .unwrap();
    assert_eq!(keys.len(), 2);
}

#[tokio::test]
async fn test_try_finish_size_mismatch_does_not_commit() {
    let (_dir, store, backend) = test_store().await;
    let chunks: &[&[u8]] = &[b"aaaa", b"bbbb"];
    let mut session = session_for(chunks);
    // Declare one more byte than is actually stored.
    session.identity.file_size += 1;
    put_all(&store, &session, chunks).await;

    assert!(!store.try_finish(&session).await.unwrap());
    let artifact = backend.get(&ChunkStore::artifact_key(session.id)).await;
    assert!(matches!(artifact, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_try_finish_digest_mismatch_has_no_side_effects() {
    let (_dir, store, backend) = test_store().await;
    let chunks: &[&[u8]] = &[b"aaaa", b"bbbb"];
    let mut session = session_for(chunks);
    // Right count and size, wrong content digest.
    session.identity.file_digest = FileDigest::compute(b"something else!!");
    session.identity.file_size = 8;
    put_all(&store, &session, chunks).await;

    assert!(!store.try_finish(&session).await.unwrap());

    // Chunks stay put and the artifact never appeared, so a corrected
    // retry can still succeed.
    let keys = backend
        .list(&ChunkStore::session_prefix(session.id))
        .await
        .unwrap();
    assert_eq!(keys.len(), 2);
    let artifact = backend.get(&ChunkStore::artifact_key(session.id)).await;
    assert!(matches!(artifact, Err(StorageError::NotFound(_))));
}

#[tokio::test]
async fn test_try_finish_single_chunk_file() {
    let (_dir, store, backend) = test_store().await;
    let chunks: &[&[u8]] = &[b"just one chunk"];
    let session = session_for(chunks);
    put_all(&store, &session, chunks).await;

    assert!(store.try_finish(&session).await.unwrap());
    let artifact = backend
        .get(&ChunkStore::artifact_key(session.id))
        .await
        .unwrap();
    assert_eq!(&artifact[..], b"just one chunk");
}
