//! This module contains the Zstandard kernel used by the block pipeline.
//!
//! Every call to `ChunkEncoder::encode` emits one complete, independently
//! decodable zstd frame. Zstd frames concatenate into a valid multi-frame
//! stream, so segment payloads built from these frames can be joined byte for
//! byte without any re-encoding. `decode_stream` consumes such a stream lazily.
//! This module is a safe, panic-free wrapper around the `zstd` crate.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::ops::RangeInclusive;

use zstd::bulk::Compressor;
use zstd::stream::raw::CParameter;
use zstd::stream::read::Decoder;

use crate::error::BlockError;

//==================================================================================
// 1. Level Validation
//==================================================================================

/// The range of compression levels the linked zstd library accepts.
pub fn supported_levels() -> RangeInclusive<i32> {
    zstd::compression_level_range()
}

/// Fails fast with a configuration error for a level outside `supported_levels()`.
pub fn validate_level(level: i32) -> Result<(), BlockError> {
    let range = supported_levels();
    if range.contains(&level) {
        Ok(())
    } else {
        Err(BlockError::Configuration(format!(
            "compression level {} is outside the supported range {}..={}",
            level,
            range.start(),
            range.end()
        )))
    }
}

//==================================================================================
// 2. Encoding
//==================================================================================

/// Immutable codec settings shared by all segment workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZstdCodec {
    level: i32,
    encoder_threads: u32,
}

impl ZstdCodec {
    pub fn new(level: i32, encoder_threads: u32) -> Result<Self, BlockError> {
        validate_level(level)?;
        Ok(Self {
            level,
            encoder_threads,
        })
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Creates an encoder owned by a single worker and reused for every chunk
    /// of its segment.
    pub fn encoder(&self) -> Result<ChunkEncoder, BlockError> {
        let mut compressor = Compressor::new(self.level).map_err(setup_error)?;
        compressor
            .set_parameter(CParameter::ChecksumFlag(true))
            .map_err(setup_error)?;
        if self.encoder_threads > 0 {
            compressor
                .set_parameter(CParameter::NbWorkers(self.encoder_threads))
                .map_err(setup_error)?;
        }
        Ok(ChunkEncoder { compressor })
    }
}

fn setup_error(e: io::Error) -> BlockError {
    BlockError::CodecSetup(e.to_string())
}

/// A reusable zstd context. Each `encode` produces one self-contained frame.
pub struct ChunkEncoder {
    compressor: Compressor<'static>,
}

impl ChunkEncoder {
    /// Compresses `chunk`, which covers source bytes starting at `start`, and
    /// appends the resulting frame to `out`.
    pub fn encode_into<W: Write>(
        &mut self,
        chunk: &[u8],
        start: u64,
        out: &mut W,
    ) -> Result<usize, BlockError> {
        let frame = self.encode(chunk, start)?;
        out.write_all(&frame)?;
        Ok(frame.len())
    }

    /// Compresses `chunk` into a fresh frame. Failures carry the chunk's byte range.
    pub fn encode(&mut self, chunk: &[u8], start: u64) -> Result<Vec<u8>, BlockError> {
        self.compressor
            .compress(chunk)
            .map_err(|e| BlockError::Codec {
                start,
                end: start + chunk.len() as u64,
                reason: e.to_string(),
            })
    }
}

//==================================================================================
// 3. Decoding
//==================================================================================

/// Wraps the compressed input and remembers whether reading it failed, so a
/// broken source is not reported as a corrupt stream.
struct InputReader<R> {
    inner: R,
    failed: bool,
}

impl<R: Read> Read for InputReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Err(e) if e.kind() != io::ErrorKind::Interrupted => {
                self.failed = true;
                Err(e)
            }
            other => other,
        }
    }
}

/// A lazy reader over the decoded contents of a (possibly multi-frame) stream.
///
/// Decoder failures surface as `io::ErrorKind::InvalidData`. Errors from the
/// underlying reader pass through unchanged and set `input_failed`.
pub struct DecodeStream<R: Read> {
    decoder: Option<Decoder<'static, BufReader<InputReader<R>>>>,
}

impl<R: Read> DecodeStream<R> {
    /// True once reading the compressed input itself has failed.
    pub fn input_failed(&self) -> bool {
        self.decoder
            .as_ref()
            .is_some_and(|decoder| decoder.get_ref().get_ref().failed)
    }
}

/// Opens a decoding view over `reader`. Empty input decodes to nothing.
pub fn decode_stream<R: Read>(reader: R) -> Result<DecodeStream<R>, BlockError> {
    let mut buffered = BufReader::new(InputReader {
        inner: reader,
        failed: false,
    });
    if buffered.fill_buf()?.is_empty() {
        return Ok(DecodeStream { decoder: None });
    }
    let decoder = Decoder::with_buffer(buffered)
        .map_err(|e| BlockError::Corrupt(format!("decoder setup failed: {}", e)))?;
    Ok(DecodeStream {
        decoder: Some(decoder),
    })
}

impl<R: Read> Read for DecodeStream<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let result = match self.decoder.as_mut() {
            None => return Ok(0),
            Some(decoder) => decoder.read(buf),
        };
        match result {
            Err(e) if e.kind() != io::ErrorKind::Interrupted && !self.input_failed() => {
                Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string()))
            }
            other => other,
        }
    }
}

/// Decodes the whole of `reader` into `writer`, returning the decoded length.
///
/// Malformed or truncated input is `Corrupt`. Failures reading `reader` or
/// writing `writer` stay I/O errors.
pub fn decompress_to_writer<R: Read, W: Write + ?Sized>(
    reader: R,
    writer: &mut W,
) -> Result<u64, BlockError> {
    let mut stream = decode_stream(reader)?;
    let mut buf = vec![0u8; 64 * 1024];
    let mut total = 0u64;
    loop {
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if stream.input_failed() => return Err(BlockError::Io(e)),
            Err(e) => return Err(BlockError::Corrupt(e.to_string())),
        };
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    Ok(total)
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
