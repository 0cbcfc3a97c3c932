//! E2E Test Suite: Round trips
//!
//! Compress through the registry's write role, decompress through its read
//! roles, and require byte-exact recovery for empty, small, and
//! multi-chunk payloads across every built-in codec.

use anyhow::Result;
use flatstream::{CodecRegistry, CompressionKind, Decompressor};
use std::fs;
use std::fs::File;
use tempfile::TempDir;

const ALL_KINDS: [CompressionKind; 3] = [
    CompressionKind::None,
    CompressionKind::Gzip,
    CompressionKind::Bzip2,
];

fn decode_all(dec: &mut Box<dyn Decompressor>) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let chunk = dec.read()?;
        if chunk.is_empty() {
            return Ok(out);
        }
        out.extend_from_slice(&chunk);
    }
}

fn round_trip(kind: CompressionKind, payload: &[u8]) -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("data.cmp");
    let registry = CodecRegistry::builtin();

    let mut comp = registry.create_compressor(kind, File::create(&path)?)?;
    comp.write(payload)?;
    comp.close()?;
    let on_disk = fs::metadata(&path)?.len();
    assert_eq!(
        comp.bytes_written(),
        on_disk,
        "{kind}: bytes_written must match the file"
    );

    // File-backed decode.
    let mut dec = registry.create_decompressor(kind, File::open(&path)?)?;
    assert_eq!(decode_all(&mut dec)?, payload, "{kind}: file-backed decode");
    assert_eq!(dec.offset(), on_disk, "{kind}: offset reaches source size");

    // Buffer-backed decode of the same bytes.
    let mut dec = registry.create_buffer_decompressor(kind, fs::read(&path)?)?;
    assert_eq!(decode_all(&mut dec)?, payload, "{kind}: buffer-backed decode");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Empty payload
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_payload_round_trips_for_every_codec() -> Result<()> {
    for kind in ALL_KINDS {
        round_trip(kind, b"")?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Small payload
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn small_payload_round_trips_for_every_codec() -> Result<()> {
    for kind in ALL_KINDS {
        round_trip(kind, b"a small but real payload\n")?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload spanning several chunk boundaries
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn multi_chunk_payload_round_trips_for_every_codec() -> Result<()> {
    let payload: Vec<u8> = (0u8..=255)
        .cycle()
        .take(flatstream::CHUNK_BYTES * 4 + 321)
        .collect();
    for kind in ALL_KINDS {
        round_trip(kind, &payload)?;
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Compressed formats actually compress a compressible payload
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn compressed_codecs_shrink_repetitive_data() -> Result<()> {
    let dir = TempDir::new()?;
    let payload = vec![b'x'; 1_000_000];
    let registry = CodecRegistry::builtin();

    for kind in [CompressionKind::Gzip, CompressionKind::Bzip2] {
        let path = dir.path().join(format!("data.{kind}"));
        let mut comp = registry.create_compressor(kind, File::create(&path)?)?;
        comp.write(&payload)?;
        comp.close()?;
        let on_disk = fs::metadata(&path)?.len();
        assert!(
            on_disk < payload.len() as u64 / 10,
            "{kind}: {on_disk} bytes is no real compression"
        );
    }
    Ok(())
}
