// In: src/bridge/stateless_api.rs

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::block_pipeline::{BlockPipeline, MemorySource, PipelineReport, RangeSource, SourceFile};
use crate::config::BlockConfig;
use crate::error::BlockError;
use crate::kernels;

//==================================================================================
// 1. Compression
//==================================================================================

/// Compresses the file at `source` into `dest` with `workers` parallel segments.
///
/// On failure nothing is left at `dest`; a worker failure carries its segment
/// index (see `BlockError::segment_index`).
pub fn run_block_pipeline(
    source: &Path,
    dest: &Path,
    level: i32,
    workers: u32,
) -> Result<PipelineReport, BlockError> {
    compress_file(source, dest, Arc::new(BlockConfig::new(level, workers)))
}

/// Compresses the file at `source` into `dest` using a full `BlockConfig`.
pub fn compress_file(
    source: &Path,
    dest: &Path,
    config: Arc<BlockConfig>,
) -> Result<PipelineReport, BlockError> {
    let pipeline = BlockPipeline::new(config)?;
    let source_file = SourceFile::open(source)?;
    log::info!(
        "Block compressing '{}' -> '{}'",
        source_file.path().display(),
        dest.display()
    );
    compress_source_to_path(&pipeline, &source_file, dest)
}

/// Runs `pipeline` over any random-access source and writes the result to `dest`.
///
/// All segments are compressed before `dest` is touched, so a worker failure
/// never creates or alters the destination.
pub fn compress_source_to_path<S: RangeSource + ?Sized>(
    pipeline: &BlockPipeline,
    source: &S,
    dest: &Path,
) -> Result<PipelineReport, BlockError> {
    check_destination(dest)?;
    let collected = pipeline.collect(source)?;
    write_destination(dest, pipeline.config().atomic_output, |out| {
        collected.assemble(out)
    })
}

/// Compresses an in-memory buffer with the same segment pipeline.
pub fn compress_bytes(data: &[u8], config: Arc<BlockConfig>) -> Result<Vec<u8>, BlockError> {
    let pipeline = BlockPipeline::new(config)?;
    let mut out = Vec::new();
    pipeline.compress(&MemorySource::new(data), &mut out)?;
    Ok(out)
}

//==================================================================================
// 2. Decompression
//==================================================================================

/// Decompresses a block-mode (or any multi-frame zstd) file into `dest`.
/// Returns the decoded length.
pub fn decompress_file(source: &Path, dest: &Path) -> Result<u64, BlockError> {
    check_destination(dest)?;
    let input = File::open(source).map_err(|e| BlockError::Planning {
        path: source.to_path_buf(),
        source: e,
    })?;
    write_destination(dest, true, |out| kernels::decompress_to_writer(input, out))
}

pub fn decompress_bytes(data: &[u8]) -> Result<Vec<u8>, BlockError> {
    let mut out = Vec::new();
    kernels::decompress_to_writer(data, &mut out)?;
    Ok(out)
}

//==================================================================================
// 3. Destination Handling
//==================================================================================

fn check_destination(dest: &Path) -> Result<(), BlockError> {
    if dest.as_os_str().is_empty() {
        return Err(BlockError::Configuration(
            "destination path is empty".to_string(),
        ));
    }
    if dest.is_dir() {
        return Err(BlockError::Configuration(format!(
            "destination '{}' is a directory",
            dest.display()
        )));
    }
    Ok(())
}

/// Runs `emit` against a writer for `dest`.
///
/// Atomic mode writes a hidden sibling temporary and renames it over `dest`
/// only after `emit` succeeds; otherwise `dest` is written in place and
/// removed if `emit` fails.
fn write_destination<T, F>(dest: &Path, atomic: bool, emit: F) -> Result<T, BlockError>
where
    F: FnOnce(&mut dyn Write) -> Result<T, BlockError>,
{
    if atomic {
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let partial = tempfile::Builder::new()
            .prefix(".blockzstd-")
            .suffix(".partial")
            .tempfile_in(parent)?;

        let mut writer = BufWriter::new(partial);
        let value = emit(&mut writer)?;
        let partial = writer
            .into_inner()
            .map_err(|e| BlockError::Reassembly(format!("flushing output failed: {}", e)))?;
        partial.as_file().sync_all()?;
        partial.persist(dest).map_err(|e| {
            BlockError::Reassembly(format!(
                "moving output into '{}' failed: {}",
                dest.display(),
                e.error
            ))
        })?;
        Ok(value)
    } else {
        let mut writer = BufWriter::new(File::create(dest)?);
        let result = emit(&mut writer).and_then(|value| {
            writer.flush()?;
            Ok(value)
        });
        if result.is_err() {
            drop(writer);
            if let Err(e) = fs::remove_file(dest) {
                log::warn!("Could not remove partial output '{}': {}", dest.display(), e);
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compress_bytes_roundtrip() {
        let data = b"segment ".repeat(10_000);
        let config = Arc::new(BlockConfig {
            granularity: 4096,
            ..BlockConfig::new(3, 4)
        });

        let compressed = compress_bytes(&data, config).unwrap();
        assert!(compressed.len() < data.len());
        assert_eq!(decompress_bytes(&compressed).unwrap(), data);
    }

    #[test]
    fn test_empty_destination_is_a_configuration_error() {
        let err = check_destination(Path::new("")).unwrap_err();
        assert!(matches!(err, BlockError::Configuration(_)));
    }
}
