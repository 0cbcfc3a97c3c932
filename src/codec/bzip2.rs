//! Bzip2 codec with multi-stream support.
//!
//! Large bzip2 archives are often the concatenation of several independently
//! compressed streams (parallel compressors emit one stream per worker), so
//! end-of-stream detection cannot rely on the codec alone: the logical
//! stream-end signal has to be combined with a physical end-of-file check on
//! the source. This module owns that state machine, built directly on the
//! raw [`Decompress`] streaming API:
//!
//! - logical stream end with unconsumed input left in the window seeds a
//!   fresh stream from exactly those leftover bytes (streams packed with no
//!   byte gap); that stream stays fully open, so unparseable tail bytes
//!   surface as codec errors,
//! - logical stream end with a drained window triggers one more source read
//!   to decide between a follow-on stream and true end-of-file; a failed
//!   speculative open there ends the output cleanly,
//! - physical end-of-file inside a logical stream is a hard integrity error.
//!
//! A failure discovered after part of a chunk has been decoded is held back
//! until the partial chunk has been delivered, so the consumer always knows
//! exactly which output preceded the failure.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};

use bzip2::write::BzEncoder;
use bzip2::{Compression, Decompress, Status};

use crate::codec::source::{ByteSource, CountingWriter, TrackedSource};
use crate::codec::{Chunk, Compressor, Decompressor, CHUNK_BYTES, INPUT_BUFFER_BYTES};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

/// Streaming bzip2 decompressor; decodes concatenated streams back to back.
pub struct Bzip2Decompressor<R: ByteSource> {
    source: Option<TrackedSource<R>>,
    decomp: Decompress,
    in_buf: Vec<u8>,
    in_start: usize,
    in_end: usize,
    source_eof: bool,
    /// No byte of the current logical stream has been consumed yet.
    opening: bool,
    /// The current stream is a speculative open after a drained window; a
    /// parse failure there means end-of-input, not corruption. A stream
    /// seeded from leftover tail bytes is not speculative, so its failures
    /// surface as codec errors.
    speculative: bool,
    /// Logical streams completed so far.
    streams_done: u64,
    /// Failure held back until the partial chunk decoded before it has been
    /// delivered.
    pending: Option<Error>,
    offset: u64,
    done: bool,
}

impl Bzip2Decompressor<File> {
    /// Stream from an already-open file.
    pub fn new(file: File) -> Self {
        Self::from_source(file)
    }
}

impl Bzip2Decompressor<Cursor<Vec<u8>>> {
    /// Stream from an owned in-memory buffer.
    pub fn from_buffer(data: Vec<u8>) -> Self {
        Self::from_source(Cursor::new(data))
    }
}

impl<R: ByteSource> Bzip2Decompressor<R> {
    pub fn from_source(source: R) -> Self {
        Self {
            source: Some(TrackedSource::new(source)),
            decomp: Decompress::new(false),
            in_buf: vec![0u8; INPUT_BUFFER_BYTES],
            in_start: 0,
            in_end: 0,
            source_eof: false,
            opening: true,
            speculative: false,
            streams_done: 0,
            pending: None,
            offset: 0,
            done: false,
        }
    }

    /// Streams decoded to completion, counting the one in progress once it
    /// ends.
    pub fn streams_done(&self) -> u64 {
        self.streams_done
    }
}

impl<R: ByteSource> fmt::Debug for Bzip2Decompressor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bzip2Decompressor")
            .field("streams_done", &self.streams_done)
            .field("offset", &self.offset)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: ByteSource> Decompressor for Bzip2Decompressor<R> {
    fn read(&mut self) -> Result<Chunk> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }
        if self.done {
            return Ok(Chunk::new());
        }
        let source = match self.source.as_mut() {
            Some(source) => source,
            None => return Ok(Chunk::new()),
        };

        let mut chunk = vec![0u8; CHUNK_BYTES];
        let mut filled = 0;

        loop {
            // Refill the compressed window once it is drained.
            if self.in_start == self.in_end && !self.source_eof {
                match source.read(&mut self.in_buf) {
                    Ok(0) => self.source_eof = true,
                    Ok(n) => {
                        self.in_start = 0;
                        self.in_end = n;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.pending = Some(Error::input("source read failed", e));
                        break;
                    }
                }
            }

            let before_in = self.decomp.total_in();
            let before_out = self.decomp.total_out();
            let status = match self
                .decomp
                .decompress(&self.in_buf[self.in_start..self.in_end], &mut chunk[filled..])
            {
                Ok(status) => status,
                Err(e) => {
                    if self.opening && self.speculative {
                        // The speculative follow-on stream never existed;
                        // the previous stream was the last one.
                        self.done = true;
                    } else {
                        self.pending = Some(Error::codec("bzip2", e.to_string()));
                    }
                    break;
                }
            };
            let consumed = (self.decomp.total_in() - before_in) as usize;
            let produced = (self.decomp.total_out() - before_out) as usize;
            self.in_start += consumed;
            filled += produced;
            if consumed > 0 || produced > 0 {
                self.opening = false;
            }

            match status {
                Status::StreamEnd => {
                    self.streams_done += 1;
                    if self.in_start == self.in_end && self.source_eof {
                        self.done = true;
                        break;
                    }
                    // Any leftover window bytes seed the next stream; with
                    // the window drained, the next refill decides whether a
                    // follow-on stream exists.
                    self.decomp = Decompress::new(false);
                    self.opening = true;
                    self.speculative = self.in_start == self.in_end;
                }
                Status::Ok => {}
                status => {
                    self.pending = Some(Error::codec(
                        "bzip2",
                        format!("unexpected decoder status: {status:?}"),
                    ));
                    break;
                }
            }

            if filled == chunk.len() {
                break;
            }

            // The codec wants more input and none is left anywhere.
            if consumed == 0
                && produced == 0
                && matches!(status, Status::Ok)
                && self.in_start == self.in_end
                && self.source_eof
            {
                if self.opening && self.speculative {
                    // Clean end: the last stream was followed by nothing.
                    self.done = true;
                } else {
                    self.pending = Some(Error::stream_integrity(
                        "source ended inside a bzip2 stream",
                    ));
                }
                break;
            }
        }

        self.offset = source.consumed();
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
        if let Some(source) = self.source.take() {
            self.offset = source.consumed();
            source.evict_all();
        }
        Ok(())
    }

    fn offset(&self) -> u64 {
        self.offset
    }
}

impl<R: ByteSource> Drop for Bzip2Decompressor<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Streaming bzip2 compressor producing a single stream.
pub struct Bzip2Compressor<W: Write + Send> {
    encoder: Option<BzEncoder<CountingWriter<W>>>,
    written: u64,
}

impl<W: Write + Send> Bzip2Compressor<W> {
    pub fn new(sink: W) -> Self {
        Self {
            encoder: Some(BzEncoder::new(
                CountingWriter::new(sink),
                Compression::default(),
            )),
            written: 0,
        }
    }
}

impl<W: Write + Send> Compressor for Bzip2Compressor<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| Error::codec("bzip2", "write after close"))?;
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
                .map_err(|e| Error::codec("bzip2", format!("finalize failed: {e}")))?;
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

impl<W: Write + Send> Drop for Bzip2Compressor<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("swallowed bzip2 compressor close failure: {e}");
        }
    }
}
