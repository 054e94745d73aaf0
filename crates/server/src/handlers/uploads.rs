//! Upload endpoint handlers.
//!
//! The whole protocol lives under a single `/upload` path. `GET` probes
//! whether a chunk is already stored; `POST` dispatches on the `do` query
//! parameter: `start` opens (or resumes) a session, `chunk` delivers one
//! chunk as a multipart body, `finish` verifies and commits.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use axum::extract::{FromRequest, Multipart, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use std::collections::HashMap;
use upchunk_core::hash::is_hex_digest;
use upchunk_core::{ChunkDigest, FileDigest, FileIdentity, StartResponse, UploadId, UploadSession};

/// Multipart form field carrying the chunk bytes.
const CHUNK_FIELD: &str = "file";

type Params = HashMap<String, String>;

fn require<'a>(params: &'a Params, name: &str) -> ApiResult<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ApiError::BadRequest(format!("missing parameter: {name}")))
}

/// Parse a non-negative integer strictly: the value must round-trip, which
/// rejects signs, leading zeros, whitespace and trailing garbage.
fn parse_u64_strict(name: &str, value: &str) -> ApiResult<u64> {
    let parsed: u64 = value
        .parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid integer for {name}: {value:?}")))?;
    if parsed.to_string() != value {
        return Err(ApiError::BadRequest(format!(
            "invalid integer for {name}: {value:?}"
        )));
    }
    Ok(parsed)
}

fn parse_digest_param(name: &str, value: &str) -> ApiResult<ChunkDigest> {
    if !is_hex_digest(value) {
        return Err(ApiError::BadRequest(format!(
            "{name} must be 64 lowercase hex characters"
        )));
    }
    ChunkDigest::from_hex(value).map_err(|e| ApiError::BadRequest(e.to_string()))
}

fn parse_upload_id(params: &Params) -> ApiResult<UploadId> {
    let raw = require(params, "uploadId")?;
    UploadId::parse(raw).map_err(|_| ApiError::BadRequest(format!("invalid uploadId: {raw:?}")))
}

/// Parsed and bounds-checked parameters of a `do=start` request.
fn parse_file_identity(params: &Params, state: &AppState) -> ApiResult<FileIdentity> {
    let limits = &state.config.server;

    let file_name = require(params, "fileName")?;
    if file_name.is_empty() {
        return Err(ApiError::BadRequest("fileName must not be empty".into()));
    }

    let file_size = parse_u64_strict("fileSize", require(params, "fileSize")?)?;
    if file_size == 0 {
        return Err(ApiError::BadRequest("fileSize must not be zero".into()));
    }
    if file_size > limits.max_file_size {
        return Err(ApiError::BadRequest(format!(
            "fileSize {} exceeds maximum {}",
            file_size, limits.max_file_size
        )));
    }

    let num_chunks = parse_u64_strict("fileNumChunks", require(params, "fileNumChunks")?)?;
    if num_chunks == 0 || num_chunks > limits.max_num_chunks {
        return Err(ApiError::BadRequest(format!(
            "fileNumChunks must be between 1 and {}",
            limits.max_num_chunks
        )));
    }

    let digest_raw = require(params, "fileDigest")?;
    if !is_hex_digest(digest_raw) {
        return Err(ApiError::BadRequest(
            "fileDigest must be 64 lowercase hex characters".into(),
        ));
    }
    let file_digest =
        FileDigest::from_hex(digest_raw).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    Ok(FileIdentity {
        file_name: file_name.to_string(),
        file_size,
        num_chunks: num_chunks as u32,
        file_digest,
    })
}

/// Parsed and bounds-checked chunk coordinates shared by the check probe and
/// the chunk delivery request.
struct ChunkParams {
    upload_id: UploadId,
    chunk_num: u32,
    chunk_size: u64,
    digest: ChunkDigest,
}

fn parse_chunk_params(params: &Params, state: &AppState) -> ApiResult<ChunkParams> {
    let limits = &state.config.server;

    let upload_id = parse_upload_id(params)?;

    let chunk_num = parse_u64_strict("chunkNum", require(params, "chunkNum")?)?;
    if chunk_num == 0 || chunk_num > limits.max_num_chunks {
        return Err(ApiError::BadRequest(format!(
            "chunkNum must be between 1 and {}",
            limits.max_num_chunks
        )));
    }

    let chunk_size = parse_u64_strict("chunkSize", require(params, "chunkSize")?)?;
    if chunk_size == 0 || chunk_size > limits.max_chunk_size {
        return Err(ApiError::BadRequest(format!(
            "chunkSize must be between 1 and {}",
            limits.max_chunk_size
        )));
    }

    let digest = parse_digest_param("chunkDigest", require(params, "chunkDigest")?)?;

    Ok(ChunkParams {
        upload_id,
        chunk_num: chunk_num as u32,
        chunk_size,
        digest,
    })
}

/// Look up a session, mapping an unknown id to a client error.
async fn load_session(state: &AppState, upload_id: UploadId) -> ApiResult<UploadSession> {
    state
        .registry
        .get(upload_id)
        .await?
        .ok_or_else(|| ApiError::BadRequest(format!("unknown uploadId: {upload_id}")))
}

/// GET /upload - probe whether a chunk is already stored.
///
/// Returns 200 when a chunk with the given number, digest and exact size is
/// present, 204 otherwise. A 204 never prevents anything; the client just
/// uploads the chunk.
pub async fn check_chunk(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> ApiResult<StatusCode> {
    let chunk = parse_chunk_params(&params, &state)?;
    let session = load_session(&state, chunk.upload_id).await?;

    if chunk.chunk_num > session.identity.num_chunks {
        return Err(ApiError::BadRequest(format!(
            "chunkNum {} out of range (session has {} chunks)",
            chunk.chunk_num, session.identity.num_chunks
        )));
    }

    let present = state
        .chunks
        .check_chunk(chunk.upload_id, chunk.chunk_num, chunk.chunk_size, &chunk.digest)
        .await?;

    if present {
        tracing::debug!(upload_id = %chunk.upload_id, chunk_num = chunk.chunk_num, "chunk already present");
        Ok(StatusCode::OK)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}

/// POST /upload - dispatch on the `do` parameter.
pub async fn upload_dispatch(
    State(state): State<AppState>,
    Query(params): Query<Params>,
    request: Request,
) -> ApiResult<Response> {
    match require(&params, "do")? {
        "start" => handle_start(state, params).await,
        "chunk" => handle_chunk(state, params, request).await,
        "finish" => handle_finish(state, params).await,
        other => Err(ApiError::BadRequest(format!("unknown do value: {other:?}"))),
    }
}

/// do=start - open a session, or return the existing one for this identity.
async fn handle_start(state: AppState, params: Params) -> ApiResult<Response> {
    let identity = parse_file_identity(&params, &state)?;

    if let Some(existing) = state.registry.find_by_identity(&identity).await? {
        tracing::info!(upload_id = %existing.id, file_name = %identity.file_name, "resuming upload session");
        return Ok(Json(StartResponse { upload_id: existing.id }).into_response());
    }

    let session = UploadSession::new(identity.clone());
    match state.registry.create(&session).await {
        Ok(()) => {
            tracing::info!(
                upload_id = %session.id,
                file_name = %identity.file_name,
                file_size = identity.file_size,
                num_chunks = identity.num_chunks,
                "upload session created"
            );
            Ok(Json(StartResponse { upload_id: session.id }).into_response())
        }
        Err(e) => {
            // A concurrent start for the same identity may have won the
            // unique-index race; converge on its session.
            if let Some(existing) = state.registry.find_by_identity(&identity).await? {
                tracing::debug!(upload_id = %existing.id, "lost session creation race, resuming");
                Ok(Json(StartResponse { upload_id: existing.id }).into_response())
            } else {
                Err(e.into())
            }
        }
    }
}

/// do=chunk - receive one chunk as a multipart body.
async fn handle_chunk(state: AppState, params: Params, request: Request) -> ApiResult<Response> {
    let chunk = parse_chunk_params(&params, &state)?;
    let session = load_session(&state, chunk.upload_id).await?;

    if chunk.chunk_num > session.identity.num_chunks {
        return Err(ApiError::BadRequest(format!(
            "chunkNum {} out of range (session has {} chunks)",
            chunk.chunk_num, session.identity.num_chunks
        )));
    }

    let mut multipart = Multipart::from_request(request, &state)
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?;

    let mut data = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some(CHUNK_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read chunk body: {e}")))?;
            data = Some(bytes);
        }
        // Unknown fields are ignored.
    }

    let data = data.ok_or_else(|| {
        ApiError::BadRequest(format!("missing multipart field {CHUNK_FIELD:?}"))
    })?;

    if data.len() as u64 != chunk.chunk_size {
        return Err(ApiError::BadRequest(format!(
            "chunk body is {} bytes but chunkSize is {}",
            data.len(),
            chunk.chunk_size
        )));
    }

    state
        .chunks
        .put_chunk(chunk.upload_id, chunk.chunk_num, &chunk.digest, data)
        .await?;

    tracing::debug!(
        upload_id = %chunk.upload_id,
        chunk_num = chunk.chunk_num,
        size = chunk.chunk_size,
        "chunk stored"
    );
    Ok(StatusCode::OK.into_response())
}

/// do=finish - verify completeness and commit the artifact.
///
/// Returns 200 when the upload was verified and committed, 204 when the
/// stored chunks do not (yet) add up to the declared file. A 204 leaves the
/// session and its chunks in place so the client can fill the gaps and finish
/// again.
async fn handle_finish(state: AppState, params: Params) -> ApiResult<Response> {
    let upload_id = parse_upload_id(&params)?;
    let session = load_session(&state, upload_id).await?;

    if state.chunks.try_finish(&session).await? {
        // The artifact is durable; the session record has served its purpose.
        state.registry.delete(upload_id).await?;
        tracing::info!(
            upload_id = %upload_id,
            file_name = %session.identity.file_name,
            file_size = session.identity.file_size,
            "upload committed"
        );
        Ok(StatusCode::OK.into_response())
    } else {
        tracing::warn!(upload_id = %upload_id, "finish verification failed, upload not committed");
        Ok(StatusCode::NO_CONTENT.into_response())
    }
}
