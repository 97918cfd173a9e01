// In: src/block_pipeline/reassembler.rs

//! Joins compressed segments into the final stream.
//!
//! Workers finish in any order; the output order is the planned index order
//! and nothing else. Zstd frames are concatenation-safe, so this is pure byte
//! concatenation with no re-encoding and no header rewriting.

use std::io::Write;

use crate::block_pipeline::artifact::CompressedSegment;
use crate::error::BlockError;

/// Writes `segments` to `output` in ascending index order and returns the
/// number of bytes written.
///
/// `expected` is the planned segment count; the set must hold each index in
/// `0..expected` exactly once. Each artifact is released as soon as it has
/// been written, and all of them are released if anything fails.
pub fn assemble<W: Write + ?Sized>(
    mut segments: Vec<CompressedSegment>,
    expected: usize,
    output: &mut W,
) -> Result<u64, BlockError> {
    segments.sort_unstable_by_key(|s| s.index);
    check_complete(&segments, expected)?;

    let mut written = 0u64;
    for segment in segments {
        written += segment.write_to(output).map_err(|e| {
            BlockError::Reassembly(format!(
                "writing segment {} to the destination failed: {}",
                segment.index, e
            ))
        })?;
        log::debug!(
            "Emitted segment {} ({} -> {} bytes)",
            segment.index,
            segment.raw_len,
            segment.len()
        );
        // `segment` drops here, freeing its buffer or deleting its spill file.
    }
    output
        .flush()
        .map_err(|e| BlockError::Reassembly(format!("flushing the destination failed: {}", e)))?;
    Ok(written)
}

/// `segments` must be sorted by index.
fn check_complete(segments: &[CompressedSegment], expected: usize) -> Result<(), BlockError> {
    for (position, segment) in segments.iter().enumerate() {
        if segment.index != position {
            let problem = if position > 0 && segments[position - 1].index == segment.index {
                format!("segment {} was produced twice", segment.index)
            } else {
                format!("segment {} is missing", position)
            };
            return Err(BlockError::Reassembly(problem));
        }
    }
    if segments.len() != expected {
        return Err(BlockError::Reassembly(format!(
            "collected {} segments, planned {}",
            segments.len(),
            expected
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block_pipeline::artifact::SegmentPayload;
    use std::io;

    fn segment(index: usize, bytes: &[u8]) -> CompressedSegment {
        CompressedSegment {
            index,
            raw_len: bytes.len() as u64,
            payload: SegmentPayload::Memory(bytes.to_vec()),
        }
    }

    #[test]
    fn test_assembles_in_index_order_not_arrival_order() {
        let arrived = vec![segment(2, b"cc"), segment(0, b"a"), segment(1, b"bbb")];
        let mut out = Vec::new();
        let written = assemble(arrived, 3, &mut out).unwrap();
        assert_eq!(out, b"abbbcc");
        assert_eq!(written, 6);
    }

    #[test]
    fn test_empty_payloads_contribute_nothing() {
        let arrived = vec![segment(1, b""), segment(0, b"xyz"), segment(2, b"")];
        let mut out = Vec::new();
        assemble(arrived, 3, &mut out).unwrap();
        assert_eq!(out, b"xyz");
    }

    #[test]
    fn test_missing_segment_is_rejected_before_writing() {
        let arrived = vec![segment(0, b"a"), segment(2, b"c")];
        let mut out = Vec::new();
        let err = assemble(arrived, 3, &mut out).unwrap_err();
        assert!(err.to_string().contains("segment 1 is missing"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_segment_is_rejected() {
        let arrived = vec![segment(0, b"a"), segment(1, b"b"), segment(1, b"b")];
        let mut out = Vec::new();
        let err = assemble(arrived, 3, &mut out).unwrap_err();
        assert!(err.to_string().contains("produced twice"));
    }

    #[test]
    fn test_short_collection_is_rejected() {
        let arrived = vec![segment(0, b"a"), segment(1, b"b")];
        let mut out = Vec::new();
        let err = assemble(arrived, 4, &mut out).unwrap_err();
        assert!(matches!(err, BlockError::Reassembly(_)));
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_failure_is_a_reassembly_error() {
        let arrived = vec![segment(0, b"a")];
        let err = assemble(arrived, 1, &mut FailingWriter).unwrap_err();
        match err {
            BlockError::Reassembly(msg) => assert!(msg.contains("disk full")),
            other => panic!("expected Reassembly, got {other:?}"),
        }
    }
}
