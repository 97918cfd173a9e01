//! This module holds the codec kernels the block pipeline treats as a black box.
//!
//! The pipeline relies on one framing property of every kernel here:
//! independently encoded frames concatenate into a single decodable stream.

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Final Stage: Entropy Coding
pub mod zstd;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::zstd::{decode_stream, decompress_to_writer, ChunkEncoder, DecodeStream, ZstdCodec};
