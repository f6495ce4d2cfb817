//! # Byte-Range Chunker
//!
//! Splits an audio file that is too big for a single API call into fixed-size,
//! contiguous byte ranges, each written to its own scratch file.
//!
//! ## Splitting rules:
//! - `count = ceil(size / chunk_size)`
//! - range `i` covers `[i * chunk_size, min((i + 1) * chunk_size, size))`
//! - ranges never overlap and concatenate back to the original bytes
//!
//! Boundaries are purely arithmetic. They can fall in the middle of an audio frame,
//! which costs a few garbled words at each seam; the API still decodes each piece.

use crate::audio::scratch;
use crate::error::{AppError, AppResult};
use std::ops::Range;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::debug;

/// Compute the byte ranges for a file of `size` bytes.
///
/// An empty file yields no ranges. A zero `chunk_size` is an error.
pub fn chunk_ranges(size: u64, chunk_size: u64) -> AppResult<Vec<Range<u64>>> {
    if chunk_size == 0 {
        return Err(AppError::Internal("chunk size must be positive".to_string()));
    }

    let count = size.div_ceil(chunk_size);
    Ok((0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = (start + chunk_size).min(size);
            start..end
        })
        .collect())
}

/// Write each range of `source` into its own chunk file in `dir`, in order.
///
/// The returned files delete themselves when dropped, so a failure part-way through
/// leaves nothing behind.
pub async fn split_into_chunks(
    source: &Path,
    size: u64,
    chunk_size: u64,
    extension: &str,
    dir: &Path,
) -> AppResult<Vec<NamedTempFile>> {
    let ranges = chunk_ranges(size, chunk_size)?;
    let mut input = tokio::fs::File::open(source).await?;
    let mut chunks = Vec::with_capacity(ranges.len());

    for (index, range) in ranges.into_iter().enumerate() {
        let len = (range.end - range.start) as usize;
        let mut buffer = vec![0u8; len];

        input.seek(std::io::SeekFrom::Start(range.start)).await?;
        input.read_exact(&mut buffer).await?;

        let chunk = scratch::chunk_file(dir, index, extension)?;
        let mut output = tokio::fs::File::from_std(chunk.as_file().try_clone()?);
        output.write_all(&buffer).await?;
        output.flush().await?;

        debug!(
            chunk = index,
            start = range.start,
            end = range.end,
            path = %chunk.path().display(),
            "Wrote audio chunk"
        );
        chunks.push(chunk);
    }

    Ok(chunks)
}
