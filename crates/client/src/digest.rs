//! Local file digesting.
//!
//! The whole-file digest streams in fixed 10 MiB blocks regardless of the
//! chunk size, so digest progress granularity stays the same when small
//! chunks are used.

use crate::error::ClientResult;
use crate::options::{ProgressCallback, round_to2};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use upchunk_core::{ChunkDigest, ContentHash, DIGEST_BLOCK_SIZE, FileDigest};

/// Hash a whole file, reporting progress per 10 MiB block.
///
/// Returns the digest and the file size in bytes.
pub async fn digest_file(
    path: &Path,
    name: &str,
    progress: Option<&ProgressCallback>,
) -> ClientResult<(FileDigest, u64)> {
    let mut file = File::open(path).await?;
    let file_size = file.metadata().await?.len();
    let total_blocks = file_size.div_ceil(DIGEST_BLOCK_SIZE).max(1);

    let mut hasher = ContentHash::hasher();
    let mut buf = vec![0u8; DIGEST_BLOCK_SIZE as usize];
    let mut block = 0u64;
    let mut remaining = file_size;

    while remaining > 0 {
        let want = remaining.min(DIGEST_BLOCK_SIZE) as usize;
        file.read_exact(&mut buf[..want]).await?;
        hasher.update(&buf[..want]);
        remaining -= want as u64;
        block += 1;
        if let Some(cb) = progress {
            cb(
                name,
                block,
                total_blocks,
                round_to2(block as f64 / total_blocks as f64),
            );
        }
    }

    Ok((FileDigest::from_content_hash(hasher.finalize()), file_size))
}

/// Read exactly the byte range of one chunk.
pub async fn read_chunk(path: &Path, offset: u64, size: u64) -> ClientResult<Vec<u8>> {
    let mut file = File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;
    let mut buf = vec![0u8; size as usize];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Hash one chunk's byte range.
pub async fn digest_chunk(path: &Path, offset: u64, size: u64) -> ClientResult<ChunkDigest> {
    let data = read_chunk(path, offset, size).await?;
    Ok(ChunkDigest::compute(&data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file_with(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[tokio::test]
    async fn test_digest_file_matches_one_shot_hash() {
        let data: Vec<u8> = (0..100_000).map(|i| (i % 256) as u8).collect();
        let file = temp_file_with(&data);

        let (digest, size) = digest_file(file.path(), "t", None).await.unwrap();
        assert_eq!(size, data.len() as u64);
        assert_eq!(digest, FileDigest::compute(&data));
    }

    #[tokio::test]
    async fn test_digest_file_progress_for_small_file_is_single_block() {
        let file = temp_file_with(b"tiny");
        let calls = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let calls2 = calls.clone();
        let cb: ProgressCallback = std::sync::Arc::new(move |_name, m, n, f| {
            calls2.lock().unwrap().push((m, n, f));
        });

        digest_file(file.path(), "t", Some(&cb)).await.unwrap();
        assert_eq!(*calls.lock().unwrap(), vec![(1, 1, 1.0)]);
    }

    #[tokio::test]
    async fn test_digest_chunk_hashes_exact_range() {
        let data: Vec<u8> = (0..1000).map(|i| (i % 256) as u8).collect();
        let file = temp_file_with(&data);

        let digest = digest_chunk(file.path(), 100, 250).await.unwrap();
        assert_eq!(digest, ChunkDigest::compute(&data[100..350]));

        let bytes = read_chunk(file.path(), 100, 250).await.unwrap();
        assert_eq!(bytes, &data[100..350]);
    }
}
