use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use crate::block_pipeline::orchestrator::BlockPipeline;
use crate::block_pipeline::source::{MemorySource, RangeSource};
use crate::config::{ArtifactStorage, BlockConfig, MAX_WORKERS, ONE_MIB};
use crate::error::BlockError;
use crate::kernels::decompress_to_writer;

//==============================================================================
// Test Helpers
//==============================================================================

/// Half repetitive text, half noise, so frames are neither trivial nor incompressible.
fn sample_data(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = Vec::with_capacity(len);
    let text = b"the quick brown fox jumps over the lazy dog. ";
    while data.len() < len {
        if rng.random_range(0..2) == 0 {
            data.extend_from_slice(text);
        } else {
            let mut noise = [0u8; 64];
            rng.fill_bytes(&mut noise);
            data.extend_from_slice(&noise);
        }
    }
    data.truncate(len);
    data
}

fn config(level: i32, workers: u32, granularity: u64) -> Arc<BlockConfig> {
    Arc::new(BlockConfig {
        level,
        workers,
        granularity,
        ..BlockConfig::default()
    })
}

fn compress_with<S: RangeSource + ?Sized>(source: &S, config: Arc<BlockConfig>) -> Vec<u8> {
    let pipeline = BlockPipeline::new(config).expect("valid config");
    let mut out = Vec::new();
    pipeline
        .compress(source, &mut out)
        .expect("Compression failed during test");
    out
}

fn decompress(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    decompress_to_writer(bytes, &mut out).expect("Decompression failed during test");
    out
}

/// Sleeps before every read, longer for earlier offsets, so later segments
/// tend to finish first.
struct DelayedSource<'a> {
    inner: MemorySource<'a>,
    delays_ms: Vec<u64>,
    granularity: u64,
}

impl RangeSource for DelayedSource<'_> {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let unit = (offset / self.granularity) as usize;
        let delay = self.delays_ms[unit % self.delays_ms.len()];
        thread::sleep(Duration::from_millis(delay));
        self.inner.read_at(buf, offset)
    }
}

/// Fails every read that starts inside `[fail_start, fail_end)`.
struct FaultySource<'a> {
    inner: MemorySource<'a>,
    fail_start: u64,
    fail_end: u64,
}

impl RangeSource for FaultySource<'_> {
    fn size(&self) -> u64 {
        self.inner.size()
    }

    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        if (self.fail_start..self.fail_end).contains(&offset) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected read failure"));
        }
        self.inner.read_at(buf, offset)
    }
}

//==============================================================================
// Round-trip
//==============================================================================

#[test]
fn test_roundtrip_across_sizes_and_worker_counts() {
    let granularity = 4096;
    for &len in &[0usize, 1, 4095, 4096, 4097, 3 * 4096, 50_000, 123_457] {
        let data = sample_data(len, len as u64);
        for &workers in &[1u32, 2, 3, 7, 40] {
            let compressed = compress_with(
                &MemorySource::new(&data),
                config(3, workers, granularity),
            );
            assert_eq!(
                decompress(&compressed),
                data,
                "roundtrip failed for len={} workers={}",
                len,
                workers
            );
        }
    }
}

#[test]
fn test_three_mib_three_workers_scenario() {
    let data = sample_data(3 * ONE_MIB as usize, 3);
    let pipeline = BlockPipeline::new(config(3, 3, ONE_MIB)).unwrap();

    let collected = pipeline.collect(&MemorySource::new(&data)).unwrap();
    assert_eq!(collected.len(), 3);

    let mut out = Vec::new();
    let report = collected.assemble(&mut out).unwrap();
    assert_eq!(report.segments, 3);
    assert_eq!(report.bytes_in, 3 * ONE_MIB);
    assert_eq!(report.bytes_out, out.len() as u64);
    assert_eq!(decompress(&out), data);
}

#[test]
fn test_max_workers_on_one_byte_source_stays_cheap() {
    let pipeline = BlockPipeline::new(config(3, MAX_WORKERS, ONE_MIB)).unwrap();
    let mut out = Vec::new();
    let report = pipeline
        .compress(&MemorySource::new(b"x"), &mut out)
        .unwrap();

    assert_eq!(report.segments, MAX_WORKERS as usize);
    assert_eq!(decompress(&out), b"x".to_vec());
}

#[test]
fn test_empty_source_produces_valid_stream() {
    let compressed = compress_with(&MemorySource::new(&[]), config(3, 4, ONE_MIB));
    assert!(!compressed.is_empty());
    assert!(decompress(&compressed).is_empty());
}

#[test]
fn test_spilled_artifacts_roundtrip_and_leave_no_residue() {
    let scratch = tempfile::TempDir::new().unwrap();
    let data = sample_data(200_000, 11);
    let config = Arc::new(BlockConfig {
        level: 5,
        workers: 4,
        granularity: 16_384,
        artifacts: ArtifactStorage::Spill {
            dir: Some(scratch.path().to_path_buf()),
        },
        ..BlockConfig::default()
    });

    let compressed = compress_with(&MemorySource::new(&data), config);
    assert_eq!(decompress(&compressed), data);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_output_is_deterministic() {
    let data = sample_data(90_000, 5);
    let a = compress_with(&MemorySource::new(&data), config(7, 5, 8192));
    let b = compress_with(&MemorySource::new(&data), config(7, 5, 8192));
    assert_eq!(a, b);
}

//==============================================================================
// Ordering
//==============================================================================

#[test]
fn test_completion_order_does_not_change_output() {
    let granularity = 8192;
    let data = sample_data(6 * granularity as usize, 21);
    let baseline = compress_with(&MemorySource::new(&data), config(3, 6, granularity));

    // Earliest segments sleep longest.
    let reversed = DelayedSource {
        inner: MemorySource::new(&data),
        delays_ms: vec![60, 50, 40, 30, 20, 10],
        granularity,
    };
    assert_eq!(compress_with(&reversed, config(3, 6, granularity)), baseline);

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..3 {
        let shuffled = DelayedSource {
            inner: MemorySource::new(&data),
            delays_ms: (0..6).map(|_| rng.random_range(0..30)).collect(),
            granularity,
        };
        assert_eq!(compress_with(&shuffled, config(3, 6, granularity)), baseline);
    }
}

//==============================================================================
// Failure handling
//==============================================================================

#[test]
fn test_read_failure_in_segment_two_is_reported_and_purged() {
    let scratch = tempfile::TempDir::new().unwrap();
    let data = sample_data(4 * 65_536, 8);
    let source = FaultySource {
        inner: MemorySource::new(&data),
        fail_start: 2 * 65_536,
        fail_end: 3 * 65_536,
    };
    let config = Arc::new(BlockConfig {
        level: 3,
        workers: 4,
        granularity: 65_536,
        artifacts: ArtifactStorage::Spill {
            dir: Some(scratch.path().to_path_buf()),
        },
        ..BlockConfig::default()
    });

    let pipeline = BlockPipeline::new(config).unwrap();
    let err = match pipeline.collect(&source) {
        Ok(_) => panic!("expected the run to fail"),
        Err(e) => e,
    };

    assert_eq!(err.segment_index(), Some(2));
    match &err {
        BlockError::Worker {
            start, end, source, ..
        } => {
            assert_eq!((*start, *end), (2 * 65_536, 3 * 65_536));
            assert!(matches!(**source, BlockError::Io(_)));
        }
        other => panic!("expected Worker error, got {other:?}"),
    }
    // Segments 0, 1 and 3 may have finished; none of their spill files survive.
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[test]
fn test_failed_run_writes_nothing_to_output() {
    let data = sample_data(4 * 4096, 9);
    let source = FaultySource {
        inner: MemorySource::new(&data),
        fail_start: 0,
        fail_end: 1,
    };
    let pipeline = BlockPipeline::new(config(3, 4, 4096)).unwrap();

    let mut out = Vec::new();
    let err = pipeline.compress(&source, &mut out).unwrap_err();
    assert_eq!(err.segment_index(), Some(0));
    assert!(out.is_empty());
}

#[test]
fn test_invalid_configuration_fails_before_any_read() {
    assert!(matches!(
        BlockPipeline::new(config(1_000, 4, ONE_MIB)),
        Err(BlockError::Configuration(_))
    ));
    assert!(matches!(
        BlockPipeline::new(config(3, 0, ONE_MIB)),
        Err(BlockError::Configuration(_))
    ));
    assert!(matches!(
        BlockPipeline::new(config(3, MAX_WORKERS + 1, ONE_MIB)),
        Err(BlockError::Configuration(_))
    ));
    assert!(matches!(
        BlockPipeline::new(config(3, 2, 0)),
        Err(BlockError::Configuration(_))
    ));
}
