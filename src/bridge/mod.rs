// In: src/bridge/mod.rs

// ====================================================================================
// ARCHITECTURAL OVERVIEW: The Bridge Layer
// ====================================================================================
//
// The `bridge` is the public-facing API of blockzstd. It owns everything the
// engine deliberately does not know about: paths, destinations, and the
// all-or-nothing guarantee on the output file.
//
// Data Flow (Compression):
//
//   1. [run_block_pipeline / compress_file]  -> Receives source + destination paths
//         |
//         `-> a. Validates the `BlockConfig` (no I/O yet)
//         `-> b. Opens the source as a `SourceFile` (regular files only)
//         |
//   2. [block_pipeline::BlockPipeline::collect] -> plan, dispatch, collect
//         |
//   3. [write_destination] -> reassemble into a sibling temporary, rename on success
//
// Data Flow (Decompression):
//
//   1. [decompress_file] -> Receives a multi-frame zstd file
//         |
//         `-> kernels::decompress_to_writer, through the same temporary-and-rename path
//
// ====================================================================================
pub mod stateless_api;

pub use stateless_api::{
    compress_bytes, compress_file, compress_source_to_path, decompress_bytes, decompress_file,
    run_block_pipeline,
};
