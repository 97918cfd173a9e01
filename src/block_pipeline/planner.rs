// In: src/block_pipeline/planner.rs

//! The segment planner.
//!
//! Splits `[0, file_size)` into one contiguous byte range per worker. The file
//! is first measured in granularity units (the last unit may be partial); the
//! units are shared out as evenly as possible, with the first `R` workers
//! taking one extra unit each. Every boundary except the clamped tail lands on
//! a multiple of the granularity, so each worker can read whole chunks.

use serde::Serialize;

use crate::config::MAX_WORKERS;
use crate::error::BlockError;

/// A contiguous, half-open byte range `[start, end)` of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub index: usize,
    pub start: u64,
    pub end: u64,
}

impl Segment {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Computes the ordered segments for a file of `file_size` bytes.
///
/// Deterministic for identical inputs. A zero-size file plans a single empty
/// segment. When there are more workers than granularity units, the trailing
/// segments are empty.
pub fn plan(
    file_size: u64,
    worker_count: u32,
    granularity: u64,
) -> Result<Vec<Segment>, BlockError> {
    if worker_count == 0 || worker_count > MAX_WORKERS {
        return Err(BlockError::Configuration(format!(
            "worker count {} is outside 1..={}",
            worker_count, MAX_WORKERS
        )));
    }
    if granularity == 0 {
        return Err(BlockError::Configuration(
            "granularity must be at least 1 byte".to_string(),
        ));
    }

    if file_size == 0 {
        return Ok(vec![Segment {
            index: 0,
            start: 0,
            end: 0,
        }]);
    }

    let total_units = file_size.div_ceil(granularity);
    let workers = u64::from(worker_count);
    let base_units = total_units / workers;
    let mut extra_units = total_units % workers;

    let mut segments = Vec::with_capacity(worker_count as usize);
    let mut start = 0u64;
    for index in 0..worker_count as usize {
        let mut units = base_units;
        if extra_units > 0 {
            units += 1;
            extra_units -= 1;
        }
        // The last unit may be partial, so never run past the real size.
        let end = start
            .saturating_add(units.saturating_mul(granularity))
            .min(file_size);
        segments.push(Segment { index, start, end });
        start = end;
    }

    log::debug!(
        "Planned {} segments over {} bytes ({} units of {} bytes)",
        segments.len(),
        file_size,
        total_units,
        granularity
    );
    Ok(segments)
}
