// SQLite registry: identity-keyed lookup, create/get/delete lifecycle.

use tempfile::TempDir;
use upchunk_core::{FileDigest, FileIdentity, UploadId, UploadSession};
use upchunk_registry::{SqliteRegistry, UploadRegistry};

async fn test_registry() -> (TempDir, SqliteRegistry) {
    let dir = TempDir::new().unwrap();
    let registry = SqliteRegistry::new(dir.path().join("registry.db"))
        .await
        .unwrap();
    (dir, registry)
}

fn identity(name: &str, content: &[u8]) -> FileIdentity {
    FileIdentity {
        file_name: name.to_string(),
        file_size: content.len() as u64,
        num_chunks: 1,
        file_digest: FileDigest::compute(content),
    }
}

#[tokio::test]
async fn test_create_and_get() {
    let (_dir, registry) = test_registry().await;
    let session = UploadSession::new(identity("a.bin", b"content"));

    registry.create(&session).await.unwrap();

    let fetched = registry.get(session.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, session.id);
    assert_eq!(fetched.identity, session.identity);
}

#[tokio::test]
async fn test_get_unknown_is_none() {
    let (_dir, registry) = test_registry().await;
    assert!(registry.get(UploadId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_by_identity_returns_existing_session() {
    let (_dir, registry) = test_registry().await;
    let ident = identity("a.bin", b"content");
    let session = UploadSession::new(ident.clone());
    registry.create(&session).await.unwrap();

    let found = registry.find_by_identity(&ident).await.unwrap().unwrap();
    assert_eq!(found.id, session.id);

    // A different file name is a different identity.
    let other = identity("b.bin", b"content");
    assert!(registry.find_by_identity(&other).await.unwrap().is_none());

    // Same name but different content is a different identity too.
    let other = identity("a.bin", b"other content!!");
    assert!(registry.find_by_identity(&other).await.unwrap().is_none());
}

#[tokio::test]
async fn test_duplicate_identity_rejected_by_unique_index() {
    let (_dir, registry) = test_registry().await;
    let ident = identity("a.bin", b"content");

    registry.create(&UploadSession::new(ident.clone())).await.unwrap();
    let err = registry.create(&UploadSession::new(ident)).await;
    assert!(err.is_err());
}

#[tokio::test]
async fn test_delete_removes_session_and_is_idempotent() {
    let (_dir, registry) = test_registry().await;
    let session = UploadSession::new(identity("a.bin", b"content"));
    registry.create(&session).await.unwrap();

    registry.delete(session.id).await.unwrap();
    assert!(registry.get(session.id).await.unwrap().is_none());

    // Deleting again is fine.
    registry.delete(session.id).await.unwrap();
}

#[tokio::test]
async fn test_identity_freed_after_delete() {
    let (_dir, registry) = test_registry().await;
    let ident = identity("a.bin", b"content");
    let session = UploadSession::new(ident.clone());
    registry.create(&session).await.unwrap();
    registry.delete(session.id).await.unwrap();

    // Once the committed session is gone the identity can start fresh.
    let second = UploadSession::new(ident.clone());
    registry.create(&second).await.unwrap();
    let found = registry.find_by_identity(&ident).await.unwrap().unwrap();
    assert_eq!(found.id, second.id);
}
