// In: src/block_pipeline/source.rs

//! Read-only, random-access sources for segment workers.
//!
//! Workers never share a cursor. Every read names its own offset (`pread` on
//! Unix, `seek_read` on Windows), so any number of workers may read one
//! source concurrently.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::BlockError;

/// A byte-addressable source with a size known up front.
pub trait RangeSource: Send + Sync {
    /// Total size in bytes.
    fn size(&self) -> u64;

    /// Reads into `buf` starting at `offset`, returning the number of bytes read.
    /// `Ok(0)` means the source ended at `offset`.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;
}

//==================================================================================
// 1. File Source
//==================================================================================

/// A regular file, opened once and read through positioned reads.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    file: File,
    size: u64,
}

impl SourceFile {
    /// Opens `path` read-only and records its size.
    ///
    /// Fails with `Planning` if the file cannot be stat'ed or opened, and with
    /// `Configuration` if it is not a regular file (pipes and devices cannot be
    /// split into byte ranges).
    pub fn open(path: &Path) -> Result<Self, BlockError> {
        let planning_err = |source: io::Error| BlockError::Planning {
            path: path.to_path_buf(),
            source,
        };

        let metadata = std::fs::metadata(path).map_err(planning_err)?;
        if !metadata.is_file() {
            return Err(BlockError::Configuration(format!(
                "'{}' is not a regular, seekable file; block mode needs random access",
                path.display()
            )));
        }
        let file = File::open(path).map_err(planning_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RangeSource for SourceFile {
    fn size(&self) -> u64 {
        self.size
    }

    #[cfg(unix)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::unix::fs::FileExt::read_at(&self.file, buf, offset)
    }

    #[cfg(windows)]
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        std::os::windows::fs::FileExt::seek_read(&self.file, buf, offset)
    }
}

//==================================================================================
// 2. In-Memory Source
//==================================================================================

/// Borrowed bytes, used by `compress_bytes` and in tests.
#[derive(Debug, Clone, Copy)]
pub struct MemorySource<'a> {
    bytes: &'a [u8],
}

impl<'a> MemorySource<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }
}

impl RangeSource for MemorySource<'_> {
    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let start = usize::try_from(offset)
            .unwrap_or(usize::MAX)
            .min(self.bytes.len());
        let available = &self.bytes[start..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        Ok(n)
    }
}
