//! Deterministic chunk planning.

use serde::{Deserialize, Serialize};

/// One entry of a chunk plan: a contiguous byte range of a file.
///
/// Chunk numbers are 1-based and contiguous. Every chunk has the plan's
/// chunk size except the last, which may be smaller but is never empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkSpec {
    /// 1-based chunk number.
    pub num: u32,
    /// Byte offset of this chunk within the file.
    pub offset: u64,
    /// Size of this chunk in bytes.
    pub size: u64,
}

/// Partition a file of `file_size` bytes into numbered chunks of `chunk_size`.
///
/// When `file_size` is an exact multiple of `chunk_size` the last chunk has
/// the full chunk size; the plan never contains a zero-length chunk. An empty
/// file yields an empty plan.
pub fn plan_chunks(file_size: u64, chunk_size: u64) -> crate::Result<Vec<ChunkSpec>> {
    if chunk_size == 0 {
        return Err(crate::Error::InvalidChunkSize(chunk_size));
    }

    let num_chunks = file_size.div_ceil(chunk_size);
    let mut chunks = Vec::with_capacity(num_chunks as usize);
    for num in 1..=num_chunks {
        let offset = (num - 1) * chunk_size;
        let size = chunk_size.min(file_size - offset);
        chunks.push(ChunkSpec {
            num: num as u32,
            offset,
            size,
        });
    }
    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_short_last_chunk() {
        // 2.5 MiB file with 1 MiB chunks: [1048576, 1048576, 524288]
        let mib = 1024 * 1024;
        let chunks = plan_chunks(2 * mib + mib / 2, mib).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.size).collect::<Vec<_>>(),
            vec![mib, mib, mib / 2]
        );
        assert_eq!(chunks[2].offset, 2 * mib);
    }

    #[test]
    fn test_plan_exact_multiple_has_no_empty_chunk() {
        let chunks = plan_chunks(200, 100).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].size, 100);
        assert_eq!(chunks[1].size, 100);
    }

    #[test]
    fn test_plan_numbering_and_coverage() {
        let chunks = plan_chunks(1001, 100).unwrap();
        assert_eq!(chunks.len(), 11);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.num as usize, i + 1);
            assert_eq!(c.offset, i as u64 * 100);
        }
        assert_eq!(chunks.iter().map(|c| c.size).sum::<u64>(), 1001);
        assert_eq!(chunks.last().unwrap().size, 1);
    }

    #[test]
    fn test_plan_single_small_file() {
        let chunks = plan_chunks(10, 100).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].size, 10);
    }

    #[test]
    fn test_plan_empty_file_and_zero_chunk_size() {
        assert!(plan_chunks(100, 0).is_err());
        assert!(plan_chunks(0, 100).unwrap().is_empty());
    }
}
