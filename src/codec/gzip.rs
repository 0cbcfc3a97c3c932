//! Gzip codec on top of `flate2`.
//!
//! Member concatenation is owned by [`MultiGzDecoder`]; this layer enforces
//! the chunk quota, the sticky end-of-stream contract, error classification,
//! and page-cache hints, matching the other codec variants.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Write};

use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::codec::source::{ByteSource, CountingWriter, TrackedSource};
use crate::codec::{classify_read_error, Chunk, Compressor, Decompressor};
use crate::codec::{CHUNK_BYTES, INPUT_BUFFER_BYTES};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

/// Streaming gzip decompressor; decodes all members back to back.
///
/// A failure discovered after part of a chunk has been decoded is held back
/// until the partial chunk has been delivered.
pub struct GzipDecompressor<R: ByteSource> {
    decoder: Option<MultiGzDecoder<BufReader<TrackedSource<R>>>>,
    pending: Option<Error>,
    offset: u64,
    done: bool,
}

impl GzipDecompressor<File> {
    /// Stream from an already-open file.
    pub fn new(file: File) -> Self {
        Self::from_source(file)
    }
}

impl GzipDecompressor<Cursor<Vec<u8>>> {
    /// Stream from an owned in-memory buffer.
    pub fn from_buffer(data: Vec<u8>) -> Self {
        Self::from_source(Cursor::new(data))
    }
}

impl<R: ByteSource> GzipDecompressor<R> {
    pub fn from_source(source: R) -> Self {
        let reader = BufReader::with_capacity(INPUT_BUFFER_BYTES, TrackedSource::new(source));
        Self {
            decoder: Some(MultiGzDecoder::new(reader)),
            pending: None,
            offset: 0,
            done: false,
        }
    }
}

impl<R: ByteSource> fmt::Debug for GzipDecompressor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GzipDecompressor")
            .field("offset", &self.offset)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: ByteSource> Decompressor for GzipDecompressor<R> {
    fn read(&mut self) -> Result<Chunk> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        if self.done {
            return Ok(Chunk::new());
        }
        let decoder = match self.decoder.as_mut() {
            Some(decoder) => decoder,
            None => return Ok(Chunk::new()),
        };

        let mut chunk = vec![0u8; CHUNK_BYTES];
        let mut filled = 0;
        while filled < chunk.len() {
            match decoder.read(&mut chunk[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.pending = Some(classify_read_error("gzip", e));
                    break;
                }
            }
        }
        self.offset = decoder.get_ref().get_ref().consumed();
        chunk.truncate(filled);
        match self.pending.take() {
            // Deliver the decoded prefix first; an empty prefix means the
            // failure is the very next event.
            Some(err) if chunk.is_empty() => Err(err),
            pending => {
                self.pending = pending;
                Ok(chunk)
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.pending = None;
        if let Some(decoder) = self.decoder.take() {
            let source = decoder.into_inner().into_inner();
            self.offset = source.consumed();
            source.evict_all();
        }
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: ByteSource> Drop for GzipDecompressor<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Streaming gzip compressor producing a single member.
pub struct GzipCompressor<W: Write + Send> {
    encoder: Option<GzEncoder<CountingWriter<W>>>,
    written: u64,
}

impl<W: Write + Send> GzipCompressor<W> {
    pub fn new(sink: W) -> Self {
        Self {
            encoder: Some(GzEncoder::new(
                CountingWriter::new(sink),
                Compression::default(),
            )),
            written: 0,
        }
    }
}

impl<W: Write + Send> Compressor for GzipCompressor<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| Error::codec("gzip", "write after close"))?;
        encoder
            .write_all(data)
            .map_err(|e| Error::input("compressed write failed", e))?;
        self.written = encoder.get_ref().written();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(encoder) = self.encoder.take() {
            let mut sink = encoder
                .finish()
                .map_err(|e| Error::codec("gzip", format!("finalize failed: {e}")))?;
            sink.flush().map_err(|e| Error::input("sink flush failed", e))?;
            self.written = sink.written();
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        match self.encoder.as_ref() {
            Some(encoder) => encoder.get_ref().written(),
            None => self.written,
        }
    }
}

impl<W: Write + Send> Drop for GzipCompressor<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("swallowed gzip compressor close failure: {e}");
        }
    }
}
