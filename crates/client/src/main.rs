//! Upchunk client binary.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use upchunk_client::{UploadOptions, Upchunker};

/// Upchunk - resumable chunked file uploader
#[derive(Parser, Debug)]
#[command(name = "upchunk")]
#[command(version, about, long_about = None)]
struct Args {
    /// Upload endpoint URL
    #[arg(
        short,
        long,
        env = "UPCHUNK_ENDPOINT",
        default_value = "http://127.0.0.1:8080/upload"
    )]
    endpoint: String,

    /// Chunk size in bytes
    #[arg(long, default_value_t = upchunk_core::DEFAULT_CHUNK_SIZE)]
    chunk_size: u64,

    /// Number of chunks uploaded concurrently
    #[arg(short = 'j', long, default_value_t = 2)]
    concurrency: usize,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut options = UploadOptions::new(&args.endpoint);
    options.chunk_size = args.chunk_size;
    options.num_simultaneous_uploads = args.concurrency;
    options.upload_progress = Some(std::sync::Arc::new(|name, done, total, fraction| {
        tracing::info!("{name}: {done}/{total} chunks ({:.0}%)", fraction * 100.0);
    }));

    let uploader = Upchunker::new(options).context("failed to create uploader")?;

    // Ctrl-C cancels in-flight transfers cleanly.
    let cancel = uploader.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling");
            cancel.cancel();
        }
    });

    let reports = uploader.upload(&args.files).await?;

    let mut failed = 0;
    for report in &reports {
        if report.committed {
            tracing::info!(
                "{} ({} bytes, {} chunks) committed as {}",
                report.file_name,
                report.file_size,
                report.num_chunks,
                report.upload_id
            );
        } else {
            failed += 1;
            tracing::error!("{} was not committed", report.file_name);
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} uploads not committed", reports.len());
    }
    Ok(())
}
