//! Codec registry: binds compression tags to the three codec roles.
//!
//! The out-of-scope dispatch layer (format detection, CLI wiring) picks a
//! [`CompressionKind`] and hands this registry an already-open source; the
//! registry only resolves the tag to constructors. New codecs plug in
//! through [`CodecRegistry::register`] without touching consumer code.

use std::collections::HashMap;
use std::fs::File;

use crate::codec::bzip2::{Bzip2Compressor, Bzip2Decompressor};
use crate::codec::gzip::{GzipCompressor, GzipDecompressor};
use crate::codec::identity::{IdentityCompressor, IdentityDecompressor};
use crate::codec::{CompressionKind, Compressor, Decompressor};
use crate::error::{Error, Result};

/// Builds a streaming compressor over an open file sink.
pub type CompressorFactory = Box<dyn Fn(File) -> Result<Box<dyn Compressor>> + Send + Sync>;

/// Builds a streaming decompressor over an open file source.
pub type DecompressorFactory = Box<dyn Fn(File) -> Result<Box<dyn Decompressor>> + Send + Sync>;

/// Builds a decompressor over an owned in-memory buffer.
pub type BufferDecompressorFactory =
    Box<dyn Fn(Vec<u8>) -> Result<Box<dyn Decompressor>> + Send + Sync>;

struct CodecEntry {
    compressor: CompressorFactory,
    decompressor: DecompressorFactory,
    buffer_decompressor: BufferDecompressorFactory,
}

/// Maps a [`CompressionKind`] to constructors for the three codec roles.
pub struct CodecRegistry {
    codecs: HashMap<CompressionKind, CodecEntry>,
}

impl CodecRegistry {
    /// Empty registry; see [`CodecRegistry::builtin`] for the stock codecs.
    pub fn new() -> Self {
        Self {
            codecs: HashMap::new(),
        }
    }

    /// Registry pre-populated with the identity, gzip, and bzip2 codecs.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            CompressionKind::None,
            |file| Ok(Box::new(IdentityCompressor::new(file)) as Box<dyn Compressor>),
            |file| Ok(Box::new(IdentityDecompressor::new(file)) as Box<dyn Decompressor>),
            |data| Ok(Box::new(IdentityDecompressor::from_buffer(data)) as Box<dyn Decompressor>),
        );
        registry.register(
            CompressionKind::Gzip,
            |file| Ok(Box::new(GzipCompressor::new(file)) as Box<dyn Compressor>),
            |file| Ok(Box::new(GzipDecompressor::new(file)) as Box<dyn Decompressor>),
            |data| Ok(Box::new(GzipDecompressor::from_buffer(data)) as Box<dyn Decompressor>),
        );
        registry.register(
            CompressionKind::Bzip2,
            |file| Ok(Box::new(Bzip2Compressor::new(file)) as Box<dyn Compressor>),
            |file| Ok(Box::new(Bzip2Decompressor::new(file)) as Box<dyn Decompressor>),
            |data| Ok(Box::new(Bzip2Decompressor::from_buffer(data)) as Box<dyn Decompressor>),
        );
        registry
    }

    /// Bind one codec under `kind`. Re-registering a tag replaces the
    /// previous entry (last registration wins).
    pub fn register<C, D, B>(
        &mut self,
        kind: CompressionKind,
        compressor: C,
        decompressor: D,
        buffer_decompressor: B,
    ) where
        C: Fn(File) -> Result<Box<dyn Compressor>> + Send + Sync + 'static,
        D: Fn(File) -> Result<Box<dyn Decompressor>> + Send + Sync + 'static,
        B: Fn(Vec<u8>) -> Result<Box<dyn Decompressor>> + Send + Sync + 'static,
    {
        self.codecs.insert(
            kind,
            CodecEntry {
                compressor: Box::new(compressor),
                decompressor: Box::new(decompressor),
                buffer_decompressor: Box::new(buffer_decompressor),
            },
        );
    }

    pub fn is_registered(&self, kind: CompressionKind) -> bool {
        self.codecs.contains_key(&kind)
    }

    fn entry(&self, kind: CompressionKind) -> Result<&CodecEntry> {
        self.codecs.get(&kind).ok_or(Error::UnknownCodec(kind))
    }

    /// Streaming compressor for `kind` over an open file sink.
    pub fn create_compressor(&self, kind: CompressionKind, sink: File) -> Result<Box<dyn Compressor>> {
        (self.entry(kind)?.compressor)(sink)
    }

    /// Streaming decompressor for `kind` over an open file source.
    pub fn create_decompressor(
        &self,
        kind: CompressionKind,
        source: File,
    ) -> Result<Box<dyn Decompressor>> {
        (self.entry(kind)?.decompressor)(source)
    }

    /// Decompressor for `kind` over an owned in-memory buffer.
    pub fn create_buffer_decompressor(
        &self,
        kind: CompressionKind,
        data: Vec<u8>,
    ) -> Result<Box<dyn Decompressor>> {
        (self.entry(kind)?.buffer_decompressor)(data)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registers_all_stock_codecs() {
        let registry = CodecRegistry::builtin();
        assert!(registry.is_registered(CompressionKind::None));
        assert!(registry.is_registered(CompressionKind::Gzip));
        assert!(registry.is_registered(CompressionKind::Bzip2));
    }

    #[test]
    fn empty_registry_reports_unknown_codec() {
        let registry = CodecRegistry::new();
        let err = registry
            .create_buffer_decompressor(CompressionKind::Bzip2, Vec::new())
            .unwrap_err();
        assert!(matches!(err, Error::UnknownCodec(CompressionKind::Bzip2)));
    }

    #[test]
    fn builtin_buffer_decompressor_round_trips() {
        use std::io::Write as _;

        let mut compressed = Vec::new();
        {
            let mut encoder =
                bzip2::write::BzEncoder::new(&mut compressed, bzip2::Compression::default());
            encoder.write_all(b"registry payload").unwrap();
            encoder.finish().unwrap();
        }

        let registry = CodecRegistry::builtin();
        let mut dec = registry
            .create_buffer_decompressor(CompressionKind::Bzip2, compressed)
            .unwrap();
        assert_eq!(dec.read().unwrap(), b"registry payload");
        assert!(dec.read().unwrap().is_empty());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = CodecRegistry::new();
        registry.register(
            CompressionKind::None,
            |file| Ok(Box::new(IdentityCompressor::new(file)) as Box<dyn Compressor>),
            |file| Ok(Box::new(IdentityDecompressor::new(file)) as Box<dyn Decompressor>),
            |_| {
                Ok(Box::new(IdentityDecompressor::from_buffer(b"first".to_vec()))
                    as Box<dyn Decompressor>)
            },
        );
        registry.register(
            CompressionKind::None,
            |file| Ok(Box::new(IdentityCompressor::new(file)) as Box<dyn Compressor>),
            |file| Ok(Box::new(IdentityDecompressor::new(file)) as Box<dyn Decompressor>),
            |_| {
                Ok(Box::new(IdentityDecompressor::from_buffer(b"second".to_vec()))
                    as Box<dyn Decompressor>)
            },
        );

        let mut dec = registry
            .create_buffer_decompressor(CompressionKind::None, Vec::new())
            .unwrap();
        assert_eq!(dec.read().unwrap(), b"second");
    }
}
