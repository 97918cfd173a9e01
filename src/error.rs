// In: src/error.rs

//! This module defines the single, unified error type for the entire blockzstd library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockError {
    // =========================================================================
    // === High-Level, Semantic Errors (Specific to the block pipeline)
    // =========================================================================
    /// Invalid level, worker count, granularity, destination or a non-seekable
    /// source. Raised before any work starts.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The source could not be inspected, so no segments were planned.
    #[error("Cannot plan segments for '{}': {source}", path.display())]
    Planning {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single segment failed. The pipeline aborts the whole run with this index.
    #[error("Segment {index} [{start}, {end}) failed: {source}")]
    Worker {
        index: usize,
        start: u64,
        end: u64,
        #[source]
        source: Box<BlockError>,
    },

    /// The source returned end-of-file before the segment boundary was reached.
    #[error("Short read at offset {offset}: source ended before segment end {expected_end}")]
    ShortRead { offset: u64, expected_end: u64 },

    #[error("Zstd encoding of bytes [{start}, {end}) failed: {reason}")]
    Codec { start: u64, end: u64, reason: String },

    /// The encoder context could not be created or configured. No bytes were
    /// involved yet, so there is no range to report.
    #[error("Zstd encoder setup failed: {0}")]
    CodecSetup(String),

    #[error("Compressed stream is corrupt or truncated: {0}")]
    Corrupt(String),

    #[error("Reassembly failed: {0}")]
    Reassembly(String),

    // =========================================================================
    // === External Error Wrappers (Using #[from] for automatic conversion)
    // =========================================================================
    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, typically while loading a `BlockConfig`.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Worker pool could not be created: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl BlockError {
    /// Wraps `self` as the failure of one segment.
    pub(crate) fn in_segment(self, index: usize, start: u64, end: u64) -> Self {
        BlockError::Worker {
            index,
            start,
            end,
            source: Box::new(self),
        }
    }

    /// The index of the segment responsible for this failure, if any.
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            BlockError::Worker { index, .. } => Some(*index),
            _ => None,
        }
    }
}
