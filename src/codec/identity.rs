//! Identity codec: passes bytes through unchanged.
//!
//! Backs the `none` compression tag so consumers drive uncompressed files
//! through the same pipeline as compressed ones.

use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read, Write};

use crate::codec::source::{ByteSource, CountingWriter, TrackedSource};
use crate::codec::{Chunk, Compressor, Decompressor, CHUNK_BYTES};
use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Decompressor
// ---------------------------------------------------------------------------

/// Reads the source through in chunk-sized blocks.
///
/// A failure discovered after part of a chunk has been read is held back
/// until the partial chunk has been delivered.
pub struct IdentityDecompressor<R: ByteSource> {
    source: Option<TrackedSource<R>>,
    pending: Option<Error>,
    offset: u64,
    done: bool,
}

impl IdentityDecompressor<File> {
    /// Stream from an already-open file.
    pub fn new(file: File) -> Self {
        Self::from_source(file)
    }
}

impl IdentityDecompressor<Cursor<Vec<u8>>> {
    /// Stream from an owned in-memory buffer.
    pub fn from_buffer(data: Vec<u8>) -> Self {
        Self::from_source(Cursor::new(data))
    }
}

impl<R: ByteSource> IdentityDecompressor<R> {
    pub fn from_source(source: R) -> Self {
        Self {
            source: Some(TrackedSource::new(source)),
            pending: None,
            offset: 0,
            done: false,
        }
    }
}

impl<R: ByteSource> fmt::Debug for IdentityDecompressor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityDecompressor")
            .field("offset", &self.offset)
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}

impl<R: ByteSource> Decompressor for IdentityDecompressor<R> {
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
        while filled < chunk.len() {
            match source.read(&mut chunk[filled..]) {
                Ok(0) => {
                    self.done = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.pending = Some(Error::input("source read failed", e));
                    break;
                }
            }
        }
        self.offset = source.consumed();
        chunk.truncate(filled);
        match self.pending.take() {
            // Deliver the read prefix first; an empty prefix means the
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

impl<R: ByteSource> Drop for IdentityDecompressor<R> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Compressor
// ---------------------------------------------------------------------------

/// Writes payload bytes to the sink unchanged.
pub struct IdentityCompressor<W: Write + Send> {
    sink: Option<CountingWriter<W>>,
    written: u64,
}

impl<W: Write + Send> IdentityCompressor<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink: Some(CountingWriter::new(sink)),
            written: 0,
        }
    }
}

impl<W: Write + Send> Compressor for IdentityCompressor<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::codec("none", "write after close"))?;
        sink.write_all(data)
            .map_err(|e| Error::input("sink write failed", e))?;
        self.written = sink.written();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush().map_err(|e| Error::input("sink flush failed", e))?;
            self.written = sink.written();
        }
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

impl<W: Write + Send> Drop for IdentityCompressor<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("swallowed identity compressor close failure: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_source_through_unchanged() {
        let data: Vec<u8> = (0u8..=255).cycle().take(CHUNK_BYTES + 100).collect();
        let mut dec = IdentityDecompressor::from_buffer(data.clone());

        let first = dec.read().unwrap();
        assert_eq!(first.len(), CHUNK_BYTES);
        let second = dec.read().unwrap();
        assert_eq!(second.len(), 100);
        assert_eq!([first, second].concat(), data);
        assert!(dec.read().unwrap().is_empty());
    }

    #[test]
    fn eof_is_idempotent() {
        let mut dec = IdentityDecompressor::from_buffer(b"abc".to_vec());
        assert_eq!(dec.read().unwrap(), b"abc");
        for _ in 0..3 {
            assert!(dec.read().unwrap().is_empty());
        }
    }

    #[test]
    fn empty_source_yields_immediate_sentinel() {
        let mut dec = IdentityDecompressor::from_buffer(Vec::new());
        assert!(dec.read().unwrap().is_empty());
        assert!(dec.read().unwrap().is_empty());
    }

    #[test]
    fn offset_tracks_consumed_bytes() {
        let mut dec = IdentityDecompressor::from_buffer(vec![1u8; 500]);
        assert_eq!(dec.offset(), 0);
        dec.read().unwrap();
        assert_eq!(dec.offset(), 500);
    }

    #[test]
    fn close_is_idempotent() {
        let mut dec = IdentityDecompressor::from_buffer(b"xyz".to_vec());
        dec.close().unwrap();
        dec.close().unwrap();
        assert!(dec.read().unwrap().is_empty());
    }

    #[test]
    fn compressor_counts_written_bytes() {
        let mut comp = IdentityCompressor::new(Vec::new());
        comp.write(b"hello ").unwrap();
        comp.write(b"world").unwrap();
        comp.close().unwrap();
        assert_eq!(comp.bytes_written(), 11);
    }

    #[test]
    fn compressor_rejects_write_after_close() {
        let mut comp = IdentityCompressor::new(Vec::new());
        comp.close().unwrap();
        assert!(comp.write(b"late").is_err());
    }
}
