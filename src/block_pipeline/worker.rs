// In: src/block_pipeline/worker.rs

//! The segment worker: reads exactly one planned byte range and encodes it.
//!
//! The range is read forward in chunks of `granularity` bytes, each chunk
//! becoming one zstd frame appended to the segment's payload. A chunk that
//! would cross `segment.end` is cut at the boundary. End-of-file before the
//! boundary is a fatal short read, never a quiet end of range.

use std::io::{self, Write};

use crate::block_pipeline::artifact::{ArtifactStore, CompressedSegment};
use crate::block_pipeline::planner::Segment;
use crate::block_pipeline::source::RangeSource;
use crate::error::BlockError;
use crate::kernels::ZstdCodec;

/// Compresses `segment` of `source`.
///
/// Errors are returned unwrapped; the orchestrator attaches the segment index.
pub(crate) fn run_segment<S: RangeSource + ?Sized>(
    segment: &Segment,
    source: &S,
    codec: &ZstdCodec,
    granularity: usize,
    store: &ArtifactStore,
) -> Result<CompressedSegment, BlockError> {
    if segment.is_empty() {
        return encode_empty_segment(segment, codec, store);
    }

    let chunk_cap = usize::try_from(segment.len())
        .unwrap_or(usize::MAX)
        .min(granularity);
    let mut buf = vec![0u8; chunk_cap];
    let mut encoder = codec.encoder()?;
    let mut sink = store.sink(segment.index, chunk_cap / 2)?;

    let mut pos = segment.start;
    while pos < segment.end {
        // Never let a read extend past the boundary.
        let want = (segment.end - pos).min(chunk_cap as u64) as usize;
        let chunk = &mut buf[..want];
        read_exact_at(source, chunk, pos, segment.end)?;
        encoder.encode_into(chunk, pos, &mut sink)?;
        pos += want as u64;
    }
    sink.flush()?;

    let compressed = sink.finish(segment.index, segment.len())?;
    crate::log_metric!(
        "event" = "segment_done",
        "index" = segment.index,
        "raw" = segment.len(),
        "compressed" = compressed.len()
    );
    Ok(compressed)
}

/// Segment 0 is only empty when the whole source is; it still gets one empty
/// frame so the final output is a valid stream. Other empty segments skip the
/// codec entirely.
fn encode_empty_segment(
    segment: &Segment,
    codec: &ZstdCodec,
    store: &ArtifactStore,
) -> Result<CompressedSegment, BlockError> {
    let mut sink = store.sink(segment.index, 0)?;
    if segment.index == 0 {
        codec
            .encoder()?
            .encode_into(&[], segment.start, &mut sink)?;
        sink.flush()?;
    }
    sink.finish(segment.index, 0)
}

/// Fills `buf` completely from `offset`, retrying partial reads. Zero bytes
/// before `buf` is full means the source is shorter than planned.
fn read_exact_at<S: RangeSource + ?Sized>(
    source: &S,
    buf: &mut [u8],
    offset: u64,
    expected_end: u64,
) -> Result<(), BlockError> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read_at(&mut buf[filled..], offset + filled as u64) {
            Ok(0) => {
                return Err(BlockError::ShortRead {
                    offset: offset + filled as u64,
                    expected_end,
                })
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(BlockError::Io(e)),
        }
    }
    Ok(())
}
