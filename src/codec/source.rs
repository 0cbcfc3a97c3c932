//! Byte-source layer shared by every codec variant.
//!
//! [`ByteSource`] abstracts the one open handle a decompressor owns: an
//! already-open [`File`] or an owned in-memory buffer behind a [`Cursor`].
//! [`TrackedSource`] wraps a source with consumed-byte accounting and issues
//! periodic page-cache eviction hints, so a pipeline streaming a very large
//! file does not grow the page cache behind itself. Eviction is a hint only;
//! failures are ignored and buffer sources take the no-op default.

use std::fs::File;
use std::io::{self, Cursor, Read, Write};

/// One open byte source. Consumed-page eviction is meaningful for
/// file-backed sources and a no-op for in-memory buffers.
pub trait ByteSource: Read + Send {
    /// Hint that the first `_consumed` bytes will not be read again.
    fn evict_consumed(&self, _consumed: u64) {}

    /// Hint that the whole source will not be read again.
    fn evict_all(&self) {}
}

impl ByteSource for File {
    #[cfg(unix)]
    fn evict_consumed(&self, consumed: u64) {
        use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
        let _ = posix_fadvise(
            self,
            0,
            consumed as nix::libc::off_t,
            PosixFadviseAdvice::POSIX_FADV_DONTNEED,
        );
    }

    #[cfg(unix)]
    fn evict_all(&self) {
        use nix::fcntl::{posix_fadvise, PosixFadviseAdvice};
        // len 0 covers the whole file.
        let _ = posix_fadvise(self, 0, 0, PosixFadviseAdvice::POSIX_FADV_DONTNEED);
    }
}

impl ByteSource for Cursor<Vec<u8>> {}

/// How many freshly consumed bytes accumulate before the next eviction hint.
const EVICT_INTERVAL_BYTES: u64 = 4 * 1024 * 1024;

// ---------------------------------------------------------------------------
// TrackedSource
// ---------------------------------------------------------------------------

/// A [`ByteSource`] with consumed-byte accounting and periodic page-cache
/// eviction. `consumed()` backs the `Decompressor::offset` bookkeeping.
pub struct TrackedSource<R: ByteSource> {
    inner: R,
    consumed: u64,
    evicted_to: u64,
}

impl<R: ByteSource> TrackedSource<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            consumed: 0,
            evicted_to: 0,
        }
    }

    /// Compressed bytes read from the source so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Final eviction hint, issued when the decompressor closes.
    pub fn evict_all(&self) {
        self.inner.evict_all();
    }
}

impl<R: ByteSource> Read for TrackedSource<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.consumed += n as u64;
        if self.consumed - self.evicted_to >= EVICT_INTERVAL_BYTES {
            self.inner.evict_consumed(self.consumed);
            self.evicted_to = self.consumed;
        }
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// CountingWriter
// ---------------------------------------------------------------------------

/// A write-through wrapper counting compressed bytes as they reach the sink.
/// Backs the `Compressor::bytes_written` accounting for every codec.
pub struct CountingWriter<W: Write> {
    inner: W,
    written: u64,
}

impl<W: Write> CountingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, written: 0 }
    }

    /// Bytes that reached the sink so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracked_source_counts_consumed_bytes() {
        let mut src = TrackedSource::new(Cursor::new(vec![7u8; 100]));
        let mut buf = [0u8; 64];
        let n = src.read(&mut buf).unwrap();
        assert_eq!(n, 64);
        assert_eq!(src.consumed(), 64);
        let n = src.read(&mut buf).unwrap();
        assert_eq!(n, 36);
        assert_eq!(src.consumed(), 100);
        assert_eq!(src.read(&mut buf).unwrap(), 0);
        assert_eq!(src.consumed(), 100);
    }

    #[test]
    fn counting_writer_counts_written_bytes() {
        let mut w = CountingWriter::new(Vec::new());
        w.write_all(b"0123456789").unwrap();
        w.write_all(b"abc").unwrap();
        assert_eq!(w.written(), 13);
        assert_eq!(w.inner, b"0123456789abc");
    }
}
