//! Protocol client for the upload API.

use crate::error::{ClientError, ClientResult};
use crate::transport::RetryingTransport;
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use upchunk_core::{ChunkDigest, ChunkSpec, FileIdentity, StartResponse, UploadId};

/// Multipart form field carrying the chunk bytes.
const CHUNK_FIELD: &str = "file";

/// The chunk-level transfer surface, separated so the worker pool can be
/// exercised against a mock.
#[async_trait]
pub trait ChunkTransfer: Send + Sync + 'static {
    /// Probe whether the server already holds the chunk.
    async fn check_chunk(
        &self,
        upload_id: UploadId,
        chunk: &ChunkSpec,
        digest: &ChunkDigest,
    ) -> ClientResult<bool>;

    /// Deliver the chunk bytes.
    async fn put_chunk(
        &self,
        upload_id: UploadId,
        chunk: &ChunkSpec,
        digest: &ChunkDigest,
        data: Vec<u8>,
    ) -> ClientResult<()>;
}

/// HTTP client for the upload endpoint.
#[derive(Clone)]
pub struct ApiClient {
    transport: RetryingTransport,
    endpoint: Url,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> ClientResult<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ClientError::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        Ok(Self {
            transport: RetryingTransport::new()?,
            endpoint,
        })
    }

    async fn unexpected(response: reqwest::Response) -> ClientError {
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        ClientError::UnexpectedStatus { status, message }
    }

    /// Open (or resume) a session for a file.
    pub async fn start(&self, identity: &FileIdentity) -> ClientResult<UploadId> {
        let response = self
            .transport
            .execute(|http| {
                http.post(self.endpoint.clone()).query(&[
                    ("do", "start"),
                    ("fileName", identity.file_name.as_str()),
                    ("fileSize", &identity.file_size.to_string()),
                    ("fileNumChunks", &identity.num_chunks.to_string()),
                    ("fileDigest", &identity.file_digest.to_hex()),
                ])
            })
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }
        let body: StartResponse = response.json().await.map_err(|e| {
            ClientError::UnexpectedStatus {
                status: 200,
                message: format!("malformed start response: {e}"),
            }
        })?;
        Ok(body.upload_id)
    }

    /// Verify completeness and commit. Returns whether the server committed.
    pub async fn finish(&self, upload_id: UploadId) -> ClientResult<bool> {
        let response = self
            .transport
            .execute(|http| {
                http.post(self.endpoint.clone())
                    .query(&[("do", "finish"), ("uploadId", &upload_id.to_string())])
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NO_CONTENT => Ok(false),
            _ => Err(Self::unexpected(response).await),
        }
    }
}

#[async_trait]
impl ChunkTransfer for ApiClient {
    async fn check_chunk(
        &self,
        upload_id: UploadId,
        chunk: &ChunkSpec,
        digest: &ChunkDigest,
    ) -> ClientResult<bool> {
        let response = self
            .transport
            .execute(|http| {
                http.get(self.endpoint.clone()).query(&[
                    ("uploadId", upload_id.to_string()),
                    ("chunkNum", chunk.num.to_string()),
                    ("chunkSize", chunk.size.to_string()),
                    ("chunkDigest", digest.to_hex()),
                ])
            })
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NO_CONTENT => Ok(false),
            _ => Err(Self::unexpected(response).await),
        }
    }

    async fn put_chunk(
        &self,
        upload_id: UploadId,
        chunk: &ChunkSpec,
        digest: &ChunkDigest,
        data: Vec<u8>,
    ) -> ClientResult<()> {
        let response = self
            .transport
            .execute(|http| {
                let part = reqwest::multipart::Part::bytes(data.clone())
                    .file_name(format!("chunk.{}", chunk.num));
                let form = reqwest::multipart::Form::new().part(CHUNK_FIELD, part);
                http.post(self.endpoint.clone())
                    .query(&[
                        ("do", "chunk".to_string()),
                        ("uploadId", upload_id.to_string()),
                        ("chunkNum", chunk.num.to_string()),
                        ("chunkSize", chunk.size.to_string()),
                        ("chunkDigest", digest.to_hex()),
                    ])
                    .multipart(form)
            })
            .await?;

        if response.status() != StatusCode::OK {
            return Err(Self::unexpected(response).await);
        }
        Ok(())
    }
}
