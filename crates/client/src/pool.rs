//! Bounded worker pool for chunk transfer.
//!
//! One coordinator task owns the authoritative chunk status list; workers
//! hold no shared state. Each worker receives assignments over its own
//! channel and reports over a shared results channel. A chunk whose delivery
//! is rejected goes back to pending, up to the per-chunk attempt cap; a
//! transport-level failure ends the whole pool. The pool is done when every
//! worker has exited, observed as the results channel closing.

use crate::api::ChunkTransfer;
use crate::digest;
use crate::error::{ClientError, ClientResult};
use crate::options::{ProgressCallback, round_to2};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use upchunk_core::{ChunkDigest, ChunkSpec, UploadId};

/// One unit of work: a chunk and its precomputed digest.
#[derive(Clone, Debug)]
pub struct ChunkJob {
    pub spec: ChunkSpec,
    pub digest: ChunkDigest,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ChunkState {
    Pending,
    InProgress,
    Done,
}

struct WorkerReport {
    worker: usize,
    outcome: Outcome,
}

enum Outcome {
    /// Worker started and can take an assignment.
    Ready,
    /// Assignment finished; `deduplicated` when the probe made the transfer
    /// unnecessary.
    Finished {
        index: usize,
        result: ClientResult<bool>,
    },
}

/// Transfer all chunks of a file with bounded concurrency.
#[allow(clippy::too_many_arguments)]
pub async fn run_pool(
    transfer: Arc<dyn ChunkTransfer>,
    file_path: &Path,
    file_name: &str,
    upload_id: UploadId,
    jobs: Vec<ChunkJob>,
    concurrency: usize,
    max_attempts: u32,
    cancel: CancellationToken,
    progress: Option<ProgressCallback>,
) -> ClientResult<()> {
    let total = jobs.len();
    if total == 0 {
        return Ok(());
    }
    let concurrency = concurrency.max(1).min(total);
    let jobs = Arc::new(jobs);

    let (report_tx, mut report_rx) = mpsc::channel::<WorkerReport>(concurrency);
    let mut assign_txs: Vec<Option<mpsc::Sender<usize>>> = Vec::with_capacity(concurrency);

    for worker in 0..concurrency {
        let (assign_tx, assign_rx) = mpsc::channel::<usize>(1);
        assign_txs.push(Some(assign_tx));
        tokio::spawn(worker_loop(
            worker,
            Arc::clone(&transfer),
            file_path.to_path_buf(),
            upload_id,
            Arc::clone(&jobs),
            assign_rx,
            report_tx.clone(),
            cancel.clone(),
        ));
    }
    // The coordinator keeps no sender; the channel closes when the last
    // worker exits, which is the pool's termination barrier.
    drop(report_tx);

    let mut status = vec![ChunkState::Pending; total];
    let mut attempts = vec![0u32; total];
    let mut pending: VecDeque<usize> = (0..total).collect();
    let mut done = 0usize;
    let mut failure: Option<ClientError> = None;

    loop {
        let report = tokio::select! {
            _ = cancel.cancelled(), if failure.is_none() => {
                failure = Some(ClientError::Cancelled);
                release_workers(&mut assign_txs);
                continue;
            }
            report = report_rx.recv() => match report {
                Some(report) => report,
                // All workers exited.
                None => break,
            },
        };

        match report.outcome {
            Outcome::Ready => {}
            Outcome::Finished {
                index,
                result: Ok(deduplicated),
            } => {
                debug_assert_eq!(status[index], ChunkState::InProgress);
                status[index] = ChunkState::Done;
                done += 1;
                if deduplicated {
                    tracing::debug!(
                        upload_id = %upload_id,
                        chunk_num = jobs[index].spec.num,
                        "chunk already on server, skipped"
                    );
                }
                if let Some(cb) = &progress {
                    cb(
                        file_name,
                        done as u64,
                        total as u64,
                        round_to2(done as f64 / total as f64),
                    );
                }
            }
            Outcome::Finished {
                index,
                result: Err(e),
            } => {
                attempts[index] += 1;
                if failure.is_some() {
                    // Already shutting down; ignore stragglers.
                } else if e.is_transport() {
                    tracing::error!(
                        upload_id = %upload_id,
                        chunk_num = jobs[index].spec.num,
                        error = %e,
                        "transport failure, aborting upload"
                    );
                    failure = Some(e);
                    release_workers(&mut assign_txs);
                } else if attempts[index] >= max_attempts {
                    tracing::error!(
                        upload_id = %upload_id,
                        chunk_num = jobs[index].spec.num,
                        attempts = attempts[index],
                        "chunk attempt cap exhausted"
                    );
                    failure = Some(ClientError::ChunkRejected {
                        chunk_num: jobs[index].spec.num,
                        attempts: attempts[index],
                    });
                    release_workers(&mut assign_txs);
                } else {
                    tracing::warn!(
                        upload_id = %upload_id,
                        chunk_num = jobs[index].spec.num,
                        attempt = attempts[index],
                        error = %e,
                        "chunk delivery failed, requeueing"
                    );
                    status[index] = ChunkState::Pending;
                    pending.push_back(index);
                }
            }
        }

        if failure.is_some() {
            continue;
        }

        if done == total {
            release_workers(&mut assign_txs);
            continue;
        }

        // Hand the reporting worker its next chunk, or leave it idle; idle
        // workers stay parked on their channel in case a failure requeues.
        if let Some(next) = pending.pop_front() {
            status[next] = ChunkState::InProgress;
            if let Some(tx) = &assign_txs[report.worker] {
                if tx.send(next).await.is_err() {
                    // Worker died unexpectedly; put the chunk back.
                    status[next] = ChunkState::Pending;
                    pending.push_front(next);
                }
            } else {
                status[next] = ChunkState::Pending;
                pending.push_front(next);
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None if done == total => Ok(()),
        // Workers all exited with work outstanding; only reachable if a
        // worker panicked.
        None => Err(ClientError::Cancelled),
    }
}

fn release_workers(assign_txs: &mut [Option<mpsc::Sender<usize>>]) {
    for tx in assign_txs.iter_mut() {
        tx.take();
    }
}

#[allow(clippy::too_many_arguments)]
async fn worker_loop(
    worker: usize,
    transfer: Arc<dyn ChunkTransfer>,
    file_path: PathBuf,
    upload_id: UploadId,
    jobs: Arc<Vec<ChunkJob>>,
    mut assign_rx: mpsc::Receiver<usize>,
    report_tx: mpsc::Sender<WorkerReport>,
    cancel: CancellationToken,
) {
    if report_tx
        .send(WorkerReport {
            worker,
            outcome: Outcome::Ready,
        })
        .await
        .is_err()
    {
        return;
    }

    loop {
        let index = tokio::select! {
            _ = cancel.cancelled() => return,
            index = assign_rx.recv() => match index {
                Some(index) => index,
                None => return,
            },
        };

        let job = &jobs[index];
        let result = transfer_one(&*transfer, &file_path, upload_id, job).await;
        if report_tx
            .send(WorkerReport {
                worker,
                outcome: Outcome::Finished { index, result },
            })
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Probe for the chunk, uploading it only when absent. Returns whether the
/// probe hit.
async fn transfer_one(
    transfer: &dyn ChunkTransfer,
    file_path: &Path,
    upload_id: UploadId,
    job: &ChunkJob,
) -> ClientResult<bool> {
    if transfer
        .check_chunk(upload_id, &job.spec, &job.digest)
        .await?
    {
        return Ok(true);
    }

    let data = digest::read_chunk(file_path, job.spec.offset, job.spec.size).await?;
    transfer
        .put_chunk(upload_id, &job.spec, &job.digest, data)
        .await?;
    Ok(false)
}
