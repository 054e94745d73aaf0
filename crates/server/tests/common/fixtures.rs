//! Shared fixtures for API tests.

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

/// Compute the lowercase hex SHA-256 digest of some bytes.
#[allow(dead_code)]
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deterministic test file content of a given size.
#[allow(dead_code)]
pub fn test_file_data(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

/// Build a multipart/form-data body carrying chunk bytes in a `file` field.
#[allow(dead_code)]
pub fn multipart_chunk_body(data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "upchunk-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        b"Content-Disposition: form-data; name=\"file\"; filename=\"blob\"\r\n",
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// Send a request and return status plus body bytes.
#[allow(dead_code)]
pub async fn send(router: &axum::Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

/// GET a chunk-presence probe.
#[allow(dead_code)]
pub async fn check_chunk(
    router: &axum::Router,
    upload_id: &str,
    chunk_num: u32,
    chunk_size: usize,
    chunk_digest: &str,
) -> StatusCode {
    let uri = format!(
        "/upload?uploadId={upload_id}&chunkNum={chunk_num}&chunkSize={chunk_size}&chunkDigest={chunk_digest}"
    );
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(router, request).await.0
}

/// POST do=start for a file and return (status, parsed uploadId if any).
#[allow(dead_code)]
pub async fn start_upload(
    router: &axum::Router,
    file_name: &str,
    file_size: u64,
    num_chunks: u64,
    file_digest: &str,
) -> (StatusCode, Option<String>) {
    let uri = format!(
        "/upload?do=start&fileName={file_name}&fileSize={file_size}&fileNumChunks={num_chunks}&fileDigest={file_digest}"
    );
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(router, request).await;
    let upload_id = serde_json::from_slice::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["uploadId"].as_str().map(str::to_string));
    (status, upload_id)
}

/// POST do=chunk with a multipart body.
#[allow(dead_code)]
pub async fn put_chunk(
    router: &axum::Router,
    upload_id: &str,
    chunk_num: u32,
    data: &[u8],
) -> StatusCode {
    let digest = sha256_hex(data);
    let uri = format!(
        "/upload?do=chunk&uploadId={upload_id}&chunkNum={chunk_num}&chunkSize={}&chunkDigest={digest}",
        data.len()
    );
    let (content_type, body) = multipart_chunk_body(data);
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap();
    send(router, request).await.0
}

/// POST do=finish.
#[allow(dead_code)]
pub async fn finish_upload(router: &axum::Router, upload_id: &str) -> StatusCode {
    let uri = format!("/upload?do=finish&uploadId={upload_id}");
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(router, request).await.0
}
