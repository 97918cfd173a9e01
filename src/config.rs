// In: src/config.rs

//! The single source of truth for all block-mode compression configuration.
//!
//! `BlockConfig` is created once at the application boundary (from code or a
//! JSON document) and then passed down through the pipeline as a shared,
//! read-only `Arc<BlockConfig>`. Every setting is checked by `validate` before
//! any file is opened.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BlockError;
use crate::kernels::zstd;

/// One mebibyte, the default read granularity.
pub const ONE_MIB: u64 = 1 << 20;

/// Upper bound on `workers`. Every worker is one planned segment.
pub const MAX_WORKERS: u32 = 4096;

//==================================================================================
// I. Core Configuration Enums & Structs
//==================================================================================

/// Where compressed segments are held between the workers and the reassembler.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArtifactStorage {
    /// **Default:** each segment's payload is an in-memory buffer.
    #[default]
    Memory,

    /// Each segment's payload is spilled to its own temporary file inside a
    /// run-scoped directory. Keeps memory flat for very large inputs.
    Spill {
        /// Parent directory for the run's scratch directory. `None` uses the
        /// system temporary directory.
        #[serde(default)]
        dir: Option<PathBuf>,
    },
}

//==================================================================================
// II. The Unified BlockConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct BlockConfig {
    /// Zstandard compression level. Must lie in the codec's supported range.
    #[serde(default = "default_level")]
    pub level: i32,

    /// Number of segments to plan and the size of the worker pool.
    #[serde(default = "default_workers")]
    pub workers: u32,

    /// The I/O chunk size in bytes. Segment boundaries and codec frames are
    /// aligned to it.
    #[serde(default = "default_granularity")]
    pub granularity: u64,

    /// Concurrency hint forwarded to the encoder (zstd's own worker threads).
    /// `0` keeps the encoder single-threaded inside each segment worker.
    #[serde(default)]
    pub encoder_threads: u32,

    #[serde(default)]
    pub artifacts: ArtifactStorage,

    /// If true, the destination is written through a temporary sibling file
    /// and renamed into place only after full success.
    #[serde(default = "default_true")]
    pub atomic_output: bool,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            workers: default_workers(),
            granularity: default_granularity(),
            encoder_threads: 0,
            artifacts: ArtifactStorage::default(),
            atomic_output: true,
        }
    }
}

impl BlockConfig {
    /// Convenience constructor for the common (level, workers) pair.
    pub fn new(level: i32, workers: u32) -> Self {
        Self {
            level,
            workers,
            ..Self::default()
        }
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, BlockError> {
        let config: BlockConfig = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Checks every setting. Called before any I/O happens.
    pub fn validate(&self) -> Result<(), BlockError> {
        zstd::validate_level(self.level)?;
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(BlockError::Configuration(format!(
                "worker count {} is outside 1..={}",
                self.workers, MAX_WORKERS
            )));
        }
        if self.granularity == 0 {
            return Err(BlockError::Configuration(
                "granularity must be at least 1 byte".to_string(),
            ));
        }
        if usize::try_from(self.granularity).is_err() {
            return Err(BlockError::Configuration(format!(
                "granularity {} does not fit in memory on this platform",
                self.granularity
            )));
        }
        Ok(())
    }

    /// The granularity as a buffer length. Only meaningful after `validate`.
    pub(crate) fn chunk_len(&self) -> usize {
        usize::try_from(self.granularity).unwrap_or(usize::MAX)
    }
}

fn default_level() -> i32 {
    3
}

fn default_workers() -> u32 {
    4
}

fn default_granularity() -> u64 {
    ONE_MIB
}

/// Helper for `serde` to default a boolean field to true.
fn default_true() -> bool {
    true
}
