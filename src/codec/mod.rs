//! Codec abstraction: the pluggable compression layer of the read pipeline.
//!
//! Every codec supplies three roles, selected through the
//! [`registry::CodecRegistry`]:
//!
//! - a streaming [`Compressor`] writing to an open file,
//! - a streaming [`Decompressor`] reading from an open file,
//! - a buffer-backed [`Decompressor`] reading from owned bytes.
//!
//! A decompressor owns its byte source exclusively and is driven by exactly
//! one thread, strictly sequentially; the pipeline enforces this by moving
//! the boxed decompressor into the read thread.

use std::fmt;
use std::io;

use crate::error::{Error, Result};

pub mod bzip2;
pub mod gzip;
pub mod identity;
pub mod registry;
pub mod source;

/// Maximum size of a decoded output chunk. A `read` may return less; it
/// returns an empty chunk only at permanent end-of-stream.
pub const CHUNK_BYTES: usize = 64 * 1024;

/// Size of the compressed-input window refilled from the byte source.
pub const INPUT_BUFFER_BYTES: usize = 64 * 1024;

/// Unit of decoded output. The empty chunk is the reserved end-of-stream
/// sentinel and is never produced as real data.
pub type Chunk = Vec<u8>;

// ---------------------------------------------------------------------------
// Compression tags
// ---------------------------------------------------------------------------

/// Identifier tag selecting a codec in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionKind {
    /// No compression; bytes pass through unchanged.
    None,
    /// Gzip (RFC 1952), possibly several members back to back.
    Gzip,
    /// Bzip2, possibly several streams back to back.
    Bzip2,
}

impl CompressionKind {
    /// Stable lowercase name, used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Bzip2 => "bzip2",
        }
    }
}

impl fmt::Display for CompressionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Codec capability traits
// ---------------------------------------------------------------------------

/// Streaming decompressor over one open byte source.
///
/// Contract: `read` returns the next decoded block of at most
/// [`CHUNK_BYTES`]; it returns the empty chunk exactly once to mark
/// permanent end-of-stream, and every call after that returns empty
/// immediately without touching the source.
pub trait Decompressor: Send + fmt::Debug {
    /// Next decoded chunk, or the empty sentinel at end-of-stream.
    fn read(&mut self) -> Result<Chunk>;

    /// Release codec state and the source handle. Idempotent; a second call
    /// is a no-op. `Drop` implementations call this and swallow failures.
    fn close(&mut self) -> Result<()>;

    /// Compressed bytes consumed from the source so far.
    fn offset(&self) -> u64;
}

/// Streaming compressor writing to one open byte sink.
pub trait Compressor: Send {
    /// Compress and write one block of payload bytes.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Flush trailing codec state and release the sink. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Compressed bytes written to the sink so far.
    fn bytes_written(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Error classification
// ---------------------------------------------------------------------------

/// Split an `io::Error` surfaced by a codec wrapper into the pipeline
/// taxonomy. Codec wrappers report malformed data as `InvalidData` or
/// `InvalidInput`, and a stream cut short as `UnexpectedEof`; everything
/// else is genuine source I/O.
pub(crate) fn classify_read_error(codec: &'static str, err: io::Error) -> Error {
    match err.kind() {
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput => {
            Error::codec(codec, err.to_string())
        }
        io::ErrorKind::UnexpectedEof => Error::stream_integrity(err.to_string()),
        _ => Error::input("source read failed", err),
    }
}
