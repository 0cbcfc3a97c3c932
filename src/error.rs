//! Error types for the read pipeline.
//!
//! One enum covers the whole taxonomy so that failures can travel through
//! queue slots as a single `Send` type:
//!
//! - [`Error::Input`]: the underlying byte source failed
//! - [`Error::Codec`]: the compressed data or the codec itself failed
//! - [`Error::UnknownCodec`]: registry miss
//! - [`Error::StreamIntegrity`]: the source ended inside a logical stream

use std::io;

use thiserror::Error;

use crate::codec::CompressionKind;

/// Pipeline error. Worker-side failures are captured into queue slots and
/// re-raised on the consumer thread at pop time.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the underlying byte source. The platform error code,
    /// when present, is available through [`Error::raw_os_error`].
    #[error("input error: {message}")]
    Input {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Malformed compressed data, or a failed codec init/flush/finalization.
    #[error("{codec} codec error: {message}")]
    Codec {
        codec: &'static str,
        message: String,
    },

    /// The requested compression tag has no registered codec.
    #[error("unknown codec: {0}")]
    UnknownCodec(CompressionKind),

    /// Physical end-of-file inside a logical compressed stream, or a failed
    /// multi-stream reconstruction.
    #[error("stream integrity error: {message}")]
    StreamIntegrity { message: String },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Wrap a source I/O failure with context.
    pub fn input(message: impl Into<String>, source: io::Error) -> Self {
        Self::Input {
            message: message.into(),
            source,
        }
    }

    /// Codec-level failure, tagged with the codec name.
    pub fn codec(codec: &'static str, message: impl Into<String>) -> Self {
        Self::Codec {
            codec,
            message: message.into(),
        }
    }

    /// Source ended mid-stream or the stream chain could not be rebuilt.
    pub fn stream_integrity(message: impl Into<String>) -> Self {
        Self::StreamIntegrity {
            message: message.into(),
        }
    }

    /// Platform error code of the wrapped I/O failure, if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Input { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failing_layer() {
        let input = Error::input(
            "read failed",
            io::Error::new(io::ErrorKind::Other, "boom"),
        );
        assert_eq!(input.to_string(), "input error: read failed");

        let codec = Error::codec("bzip2", "bad block header");
        assert_eq!(codec.to_string(), "bzip2 codec error: bad block header");

        let unknown = Error::UnknownCodec(CompressionKind::Bzip2);
        assert_eq!(unknown.to_string(), "unknown codec: bzip2");

        let integrity = Error::stream_integrity("source ended mid-stream");
        assert_eq!(
            integrity.to_string(),
            "stream integrity error: source ended mid-stream"
        );
    }

    #[test]
    fn raw_os_error_passes_through_platform_code() {
        let err = Error::input("read failed", io::Error::from_raw_os_error(5));
        assert_eq!(err.raw_os_error(), Some(5));
    }

    #[test]
    fn raw_os_error_is_none_for_codec_failures() {
        assert_eq!(Error::codec("gzip", "bad crc").raw_os_error(), None);
    }

    #[test]
    fn input_error_preserves_the_io_source() {
        let err = Error::input(
            "read failed",
            io::Error::new(io::ErrorKind::UnexpectedEof, "cut short"),
        );
        let source = std::error::Error::source(&err).expect("source is attached");
        assert!(source.to_string().contains("cut short"));
    }
}
