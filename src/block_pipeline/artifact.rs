// In: src/block_pipeline/artifact.rs

//! Intermediate artifacts: the compressed output of one segment, held between
//! its worker and the reassembler.
//!
//! A `CompressedSegment` owns its payload. Dropping it releases the payload on
//! every path: buffers are freed and spill files are deleted by
//! `NamedTempFile`. The segment index travels as a field, never inside a file
//! name, so ordering does not depend on how the filesystem lists the spill
//! directory.

use std::io::{self, BufWriter, Write};
use std::path::Path;

use tempfile::{NamedTempFile, TempDir};

use crate::config::ArtifactStorage;
use crate::error::BlockError;

//==================================================================================
// 1. Compressed Segment
//==================================================================================

#[derive(Debug)]
pub enum SegmentPayload {
    Memory(Vec<u8>),
    Spilled { file: NamedTempFile, len: u64 },
}

/// The compressed form of one planned segment.
#[derive(Debug)]
pub struct CompressedSegment {
    /// Matches the originating `Segment::index`.
    pub index: usize,
    /// Uncompressed length of the segment.
    pub raw_len: u64,
    pub payload: SegmentPayload,
}

impl CompressedSegment {
    /// Compressed payload length in bytes.
    pub fn len(&self) -> u64 {
        match &self.payload {
            SegmentPayload::Memory(bytes) => bytes.len() as u64,
            SegmentPayload::Spilled { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the payload verbatim into `out`, returning the bytes written.
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> io::Result<u64> {
        match &self.payload {
            SegmentPayload::Memory(bytes) => {
                out.write_all(bytes)?;
                Ok(bytes.len() as u64)
            }
            SegmentPayload::Spilled { file, len } => {
                // A fresh handle has its own cursor, starting at 0.
                let mut reader = file.reopen()?;
                let copied = io::copy(&mut reader, out)?;
                if copied != *len {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "spill file for segment {} holds {} bytes, expected {}",
                            self.index, copied, len
                        ),
                    ));
                }
                Ok(copied)
            }
        }
    }

    /// Path of the spill file, if the payload lives on disk.
    pub fn spill_path(&self) -> Option<&Path> {
        match &self.payload {
            SegmentPayload::Memory(_) => None,
            SegmentPayload::Spilled { file, .. } => Some(file.path()),
        }
    }
}

//==================================================================================
// 2. Artifact Store (one per pipeline run)
//==================================================================================

/// Creates payload sinks for a single run. Spilling uses a run-scoped scratch
/// directory that is removed when the store is dropped.
#[derive(Debug)]
pub(crate) enum ArtifactStore {
    Memory,
    Spill(TempDir),
}

impl ArtifactStore {
    pub(crate) fn create(storage: &ArtifactStorage) -> Result<Self, BlockError> {
        match storage {
            ArtifactStorage::Memory => Ok(ArtifactStore::Memory),
            ArtifactStorage::Spill { dir } => {
                let builder = {
                    let mut b = tempfile::Builder::new();
                    b.prefix("blockzstd-run-");
                    b
                };
                let scratch = match dir {
                    Some(parent) => builder.tempdir_in(parent)?,
                    None => builder.tempdir()?,
                };
                log::debug!("Spilling segments under {}", scratch.path().display());
                Ok(ArtifactStore::Spill(scratch))
            }
        }
    }

    /// A fresh, exclusively owned sink for segment `index`.
    pub(crate) fn sink(&self, index: usize, size_hint: usize) -> Result<PayloadSink, BlockError> {
        match self {
            ArtifactStore::Memory => Ok(PayloadSink::Memory(Vec::with_capacity(size_hint))),
            ArtifactStore::Spill(scratch) => {
                let file = tempfile::Builder::new()
                    .prefix(&format!("segment-{:06}-", index))
                    .suffix(".zst")
                    .tempfile_in(scratch.path())?;
                Ok(PayloadSink::Spill {
                    writer: BufWriter::new(file),
                    len: 0,
                })
            }
        }
    }
}

/// Where a worker appends its encoded frames.
pub(crate) enum PayloadSink {
    Memory(Vec<u8>),
    Spill {
        writer: BufWriter<NamedTempFile>,
        len: u64,
    },
}

impl Write for PayloadSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            PayloadSink::Memory(bytes) => {
                bytes.extend_from_slice(buf);
                Ok(buf.len())
            }
            PayloadSink::Spill { writer, len } => {
                let n = writer.write(buf)?;
                *len += n as u64;
                Ok(n)
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            PayloadSink::Memory(_) => Ok(()),
            PayloadSink::Spill { writer, .. } => writer.flush(),
        }
    }
}

impl PayloadSink {
    /// Seals the sink into the segment's artifact.
    pub(crate) fn finish(self, index: usize, raw_len: u64) -> Result<CompressedSegment, BlockError> {
        let payload = match self {
            PayloadSink::Memory(mut bytes) => {
                bytes.shrink_to_fit();
                SegmentPayload::Memory(bytes)
            }
            PayloadSink::Spill { writer, len } => {
                let file = writer.into_inner().map_err(|e| e.into_error())?;
                SegmentPayload::Spilled { file, len }
            }
        };
        Ok(CompressedSegment {
            index,
            raw_len,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_roundtrips_payload() {
        let store = ArtifactStore::create(&ArtifactStorage::Memory).unwrap();
        let mut sink = store.sink(3, 16).unwrap();
        sink.write_all(b"frame-a").unwrap();
        sink.write_all(b"frame-b").unwrap();
        let segment = sink.finish(3, 100).unwrap();

        assert_eq!(segment.index, 3);
        assert_eq!(segment.raw_len, 100);
        assert_eq!(segment.len(), 14);
        assert!(segment.spill_path().is_none());

        let mut out = Vec::new();
        assert_eq!(segment.write_to(&mut out).unwrap(), 14);
        assert_eq!(out, b"frame-aframe-b");
    }

    #[test]
    fn test_spilled_segment_is_deleted_on_drop() {
        let parent = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::create(&ArtifactStorage::Spill {
            dir: Some(parent.path().to_path_buf()),
        })
        .unwrap();

        let mut sink = store.sink(0, 0).unwrap();
        sink.write_all(b"spilled payload").unwrap();
        let segment = sink.finish(0, 42).unwrap();

        let path = segment.spill_path().unwrap().to_path_buf();
        assert!(path.exists());
        assert_eq!(segment.len(), 15);

        let mut out = Vec::new();
        segment.write_to(&mut out).unwrap();
        assert_eq!(out, b"spilled payload");

        drop(segment);
        assert!(!path.exists());
    }

    #[test]
    fn test_spill_store_removes_scratch_dir_on_drop() {
        let parent = tempfile::TempDir::new().unwrap();
        let store = ArtifactStore::create(&ArtifactStorage::Spill {
            dir: Some(parent.path().to_path_buf()),
        })
        .unwrap();
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 1);

        drop(store);
        assert_eq!(std::fs::read_dir(parent.path()).unwrap().count(), 0);
    }
}
