//! The segment-parallel compression engine.
//!
//! A run plans contiguous byte ranges over a random-access source, compresses
//! each range on its own worker into independently decodable zstd frames, and
//! concatenates the per-range outputs in planned order. It knows nothing about
//! paths or destinations; the `bridge` layer owns those.

//==================================================================================
// 1. Module Declarations
//==================================================================================

pub mod artifact;
pub mod orchestrator;
pub mod planner;
pub mod reassembler;
pub mod source;

mod worker;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use self::artifact::{CompressedSegment, SegmentPayload};
pub use self::orchestrator::{BlockPipeline, CollectedSegments, PipelineReport, PipelineState};
pub use self::planner::{plan, Segment};
pub use self::source::{MemorySource, RangeSource, SourceFile};

#[cfg(test)]
mod orchestrator_tests;
