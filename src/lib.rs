//! This file is the root of the `blockzstd` Rust crate.
//!
//! blockzstd compresses a large file by splitting it into contiguous byte
//! ranges, compressing every range on its own worker, and concatenating the
//! independently decodable zstd frames back into one valid stream, in the
//! original order.
//!
//! Its responsibilities are strictly limited to declaring the top-level
//! modules and re-exporting the public API.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[macro_use]
mod observability; // Make macros available throughout the crate

pub mod block_pipeline;
pub mod bridge;
pub mod config;
pub mod error;
pub mod kernels;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use block_pipeline::{BlockPipeline, PipelineReport, Segment};
pub use bridge::{
    compress_bytes, compress_file, decompress_bytes, decompress_file, run_block_pipeline,
};
pub use config::{ArtifactStorage, BlockConfig};
pub use error::BlockError;
pub use observability::enable_verbose_logging;
