// In: src/block_pipeline/orchestrator.rs

//! Drives one block-mode run: planner, then workers, then reassembler.
//!
//! State flow: `Planning -> Dispatched -> Collecting -> {Assembled | Failed}`.
//!
//! Workers run on a dedicated rayon pool sized to the configured worker
//! count. The first worker failure is latched as *the* error of the run.
//! Segments that have not started by then are skipped; segments already
//! running finish, and their results are dropped. Dropping a result releases
//! its artifact, so a failed run leaves no intermediate files behind.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rayon::prelude::*;
use serde::Serialize;

use crate::block_pipeline::artifact::{ArtifactStore, CompressedSegment};
use crate::block_pipeline::planner::{self, Segment};
use crate::block_pipeline::reassembler;
use crate::block_pipeline::source::RangeSource;
use crate::block_pipeline::worker;
use crate::config::BlockConfig;
use crate::error::BlockError;
use crate::kernels::ZstdCodec;

//==================================================================================
// 1. Run State & Report
//==================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Planning,
    Dispatched,
    Collecting,
    Assembled,
    Failed,
}

/// Summary of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub segments: usize,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Threads for one run: one per non-empty segment, never more than `workers`.
fn pool_size(busy_segments: usize, workers: u32) -> usize {
    busy_segments.min(workers as usize).max(1)
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    log::debug!("Pipeline state {:?} -> {:?}", state, next);
    *state = next;
}

//==================================================================================
// 2. Failure Latch
//==================================================================================

/// First-writer-wins holder for the run's error.
#[derive(Default)]
struct FailureLatch {
    tripped: AtomicBool,
    first: Mutex<Option<BlockError>>,
}

impl FailureLatch {
    fn is_set(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    fn record(&self, err: BlockError) {
        let mut slot = self.first.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            log::error!("Block pipeline failed: {}", err);
            *slot = Some(err);
            self.tripped.store(true, Ordering::Release);
        } else {
            log::warn!("Ignoring later failure: {}", err);
        }
    }

    fn into_error(self) -> Option<BlockError> {
        self.first
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

//==================================================================================
// 3. Collected Segments
//==================================================================================

/// Every planned segment, compressed and waiting for reassembly.
///
/// Field order matters: the segments drop before the store that owns their
/// scratch directory.
pub struct CollectedSegments {
    segments: Vec<CompressedSegment>,
    planned: usize,
    bytes_in: u64,
    _store: ArtifactStore,
}

impl CollectedSegments {
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Total compressed size of all segments.
    pub fn compressed_len(&self) -> u64 {
        self.segments.iter().map(CompressedSegment::len).sum()
    }

    /// Runs the reassembler into `output`, consuming (and releasing) every segment.
    pub fn assemble<W: Write + ?Sized>(self, output: &mut W) -> Result<PipelineReport, BlockError> {
        let CollectedSegments {
            segments,
            planned,
            bytes_in,
            _store,
        } = self;
        let mut state = PipelineState::Collecting;
        match reassembler::assemble(segments, planned, output) {
            Ok(bytes_out) => {
                transition(&mut state, PipelineState::Assembled);
                Ok(PipelineReport {
                    segments: planned,
                    bytes_in,
                    bytes_out,
                })
            }
            Err(e) => {
                transition(&mut state, PipelineState::Failed);
                Err(e)
            }
        }
    }
}

//==================================================================================
// 4. Pipeline
//==================================================================================

pub struct BlockPipeline {
    config: Arc<BlockConfig>,
    codec: ZstdCodec,
}

impl BlockPipeline {
    /// Validates `config` up front; nothing is opened or read here.
    pub fn new(config: Arc<BlockConfig>) -> Result<Self, BlockError> {
        config.validate()?;
        let codec = ZstdCodec::new(config.level, config.encoder_threads)?;
        Ok(Self { config, codec })
    }

    pub fn config(&self) -> &BlockConfig {
        &self.config
    }

    /// Compresses `source` into `output` in one call.
    pub fn compress<S, W>(&self, source: &S, output: &mut W) -> Result<PipelineReport, BlockError>
    where
        S: RangeSource + ?Sized,
        W: Write + ?Sized,
    {
        let collected = self.collect(source)?;
        let report = collected.assemble(output)?;
        log::info!(
            "Block pipeline assembled {} segments: {} -> {} bytes",
            report.segments,
            report.bytes_in,
            report.bytes_out
        );
        Ok(report)
    }

    /// Plans and compresses every segment of `source`, stopping at the barrier
    /// before reassembly. Ends in `Collecting` on success, `Failed` otherwise.
    pub fn collect<S: RangeSource + ?Sized>(&self, source: &S) -> Result<CollectedSegments, BlockError> {
        let mut state = PipelineState::Planning;
        let file_size = source.size();
        let segments = planner::plan(file_size, self.config.workers, self.config.granularity)?;
        let store = ArtifactStore::create(&self.config.artifacts)?;

        // Empty segments never touch the source, so they get no thread.
        let (busy, idle): (Vec<&Segment>, Vec<&Segment>) =
            segments.iter().partition(|segment| !segment.is_empty());

        let pool_size = pool_size(busy.len(), self.config.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(pool_size)
            .thread_name(|i| format!("blockzstd-worker-{}", i))
            .build()?;

        log::info!(
            "Compressing {} bytes in {} segments ({} non-empty) on {} workers (level {})",
            file_size,
            segments.len(),
            busy.len(),
            pool_size,
            self.codec.level()
        );

        transition(&mut state, PipelineState::Dispatched);
        let latch = FailureLatch::default();
        let mut results: Vec<Option<CompressedSegment>> = pool.install(|| {
            busy.par_iter()
                .map(|segment| self.run_one(segment, source, &store, &latch))
                .collect()
        });
        results.extend(
            idle.iter()
                .map(|segment| self.run_one(segment, source, &store, &latch)),
        );
        transition(&mut state, PipelineState::Collecting);

        if let Some(err) = latch.into_error() {
            let purged = results.iter().flatten().count();
            drop(results);
            transition(&mut state, PipelineState::Failed);
            log::info!("Purged {} finished segment artifacts after failure", purged);
            return Err(err);
        }

        let collected: Vec<CompressedSegment> = results.into_iter().flatten().collect();
        if collected.len() != segments.len() {
            transition(&mut state, PipelineState::Failed);
            return Err(BlockError::Reassembly(format!(
                "collected {} segments, planned {}",
                collected.len(),
                segments.len()
            )));
        }
        Ok(CollectedSegments {
            segments: collected,
            planned: segments.len(),
            bytes_in: file_size,
            _store: store,
        })
    }

    fn run_one<S: RangeSource + ?Sized>(
        &self,
        segment: &Segment,
        source: &S,
        store: &ArtifactStore,
        latch: &FailureLatch,
    ) -> Option<CompressedSegment> {
        if latch.is_set() {
            log::debug!("Segment {} not started: run already failed", segment.index);
            return None;
        }

        log::debug!(
            "Segment {} [{}, {}) started",
            segment.index,
            segment.start,
            segment.end
        );
        match worker::run_segment(segment, source, &self.codec, self.config.chunk_len(), store) {
            Ok(_) if latch.is_set() => {
                log::warn!("Discarding segment {}: run already failed", segment.index);
                None
            }
            Ok(done) => Some(done),
            Err(e) => {
                latch.record(e.in_segment(segment.index, segment.start, segment.end));
                None
            }
        }
    }
}
