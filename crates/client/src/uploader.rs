//! Per-file upload orchestration.

use crate::api::ApiClient;
use crate::digest;
use crate::error::{ClientError, ClientResult};
use crate::options::{LogLevel, UploadOptions, round_to2};
use crate::pool::{ChunkJob, run_pool};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use upchunk_core::{FileDigest, FileIdentity, MAX_FILE_SIZE, MAX_NUM_CHUNKS, UploadId, plan_chunks};

/// Outcome of one file's upload.
#[derive(Clone, Debug)]
pub struct UploadReport {
    pub file_name: String,
    pub upload_id: UploadId,
    pub file_digest: FileDigest,
    pub file_size: u64,
    pub num_chunks: u32,
    /// Whether the server verified and committed the artifact.
    pub committed: bool,
}

/// Resumable chunked uploader.
pub struct Upchunker {
    options: UploadOptions,
    api: Arc<ApiClient>,
    cancel: CancellationToken,
}

impl Upchunker {
    pub fn new(options: UploadOptions) -> ClientResult<Self> {
        let api = Arc::new(ApiClient::new(&options.endpoint)?);
        Ok(Self {
            options,
            api,
            cancel: CancellationToken::new(),
        })
    }

    /// Token that cancels in-flight uploads when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Upload files sequentially, one report per uploaded file.
    ///
    /// A finish the server does not commit is final for that file and shows
    /// up as `committed: false` in its report; the remaining files still
    /// upload. Transport-level failures and cancellation abort the run.
    pub async fn upload(&self, paths: &[PathBuf]) -> ClientResult<Vec<UploadReport>> {
        let mut reports = Vec::with_capacity(paths.len());
        for path in paths {
            if self.cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }
            if let Some(report) = self.upload_file(path).await? {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    async fn upload_file(&self, path: &Path) -> ClientResult<Option<UploadReport>> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file_size = tokio::fs::metadata(path).await?.len();
        if file_size == 0 {
            self.log(LogLevel::Warn, &format!("{file_name} is empty, skipping"));
            return Ok(None);
        }
        if file_size > MAX_FILE_SIZE {
            return Err(ClientError::FileTooLarge {
                size: file_size,
                max: MAX_FILE_SIZE,
            });
        }

        let plan = plan_chunks(file_size, self.options.chunk_size)?;
        if plan.len() as u64 > MAX_NUM_CHUNKS {
            return Err(ClientError::TooManyChunks {
                num_chunks: plan.len() as u64,
                max: MAX_NUM_CHUNKS,
            });
        }

        let (file_digest, digested_size) = digest::digest_file(
            path,
            &file_name,
            self.options.file_digest_progress.as_ref(),
        )
        .await?;
        debug_assert_eq!(digested_size, file_size);
        self.log(
            LogLevel::Info,
            &format!("{file_name} digest {}", file_digest.to_hex()),
        );

        let total = plan.len() as u64;
        let mut jobs = Vec::with_capacity(plan.len());
        for spec in plan {
            let chunk_digest = digest::digest_chunk(path, spec.offset, spec.size).await?;
            if let Some(cb) = &self.options.chunk_digest_progress {
                cb(
                    &file_name,
                    spec.num as u64,
                    total,
                    round_to2(spec.num as f64 / total as f64),
                );
            }
            jobs.push(ChunkJob {
                spec,
                digest: chunk_digest,
            });
        }

        let identity = FileIdentity {
            file_name: file_name.clone(),
            file_size,
            num_chunks: jobs.len() as u32,
            file_digest,
        };
        let upload_id = self.api.start(&identity).await?;
        self.log(LogLevel::Info, &format!("upload id: {upload_id}"));

        run_pool(
            Arc::clone(&self.api) as Arc<dyn crate::api::ChunkTransfer>,
            path,
            &file_name,
            upload_id,
            jobs,
            self.options.num_simultaneous_uploads,
            self.options.max_chunk_attempts,
            self.cancel.clone(),
            self.options.upload_progress.clone(),
        )
        .await?;

        let committed = self.api.finish(upload_id).await?;
        if committed {
            self.log(LogLevel::Info, &format!("{file_name} received by server"));
        } else {
            self.log(
                LogLevel::Warn,
                &format!("{file_name} was not accepted by the server"),
            );
        }

        Ok(Some(UploadReport {
            file_name,
            upload_id,
            file_digest,
            file_size,
            num_chunks: identity.num_chunks,
            committed,
        }))
    }

    fn log(&self, level: LogLevel, text: &str) {
        match level {
            LogLevel::Info => tracing::info!("{text}"),
            LogLevel::Warn => tracing::warn!("{text}"),
            LogLevel::Error => tracing::error!("{text}"),
        }
        if let Some(cb) = &self.options.log {
            cb(level, text);
        }
    }
}
