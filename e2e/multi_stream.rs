//! E2E Test Suite: Concatenated streams
//!
//! Archives are often several independently compressed streams packed back
//! to back. The pipeline must decode them as one continuous byte sequence
//! and report end-of-stream only after the last one.

use flatstream::{
    CodecRegistry, CompressionKind, Decompressor, QueueReader, ReadThreadManager, SlotQueue,
};
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn bz_stream(payload: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

fn gz_member(payload: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

fn decode_all(dec: &mut Box<dyn Decompressor>) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let chunk = dec.read().expect("clean stream");
        if chunk.is_empty() {
            return out;
        }
        out.extend_from_slice(&chunk);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Concrete scenario: 1000 x 'A' and 1000 x 'B', packed with no byte gap
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn two_bzip2_streams_of_a_then_b_decode_continuously() {
    let mut source = bz_stream(&vec![b'A'; 1000]);
    source.extend_from_slice(&bz_stream(&vec![b'B'; 1000]));

    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_buffer_decompressor(CompressionKind::Bzip2, source)
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    let mut reader = QueueReader::new(queue.clone());
    let mut decoded = Vec::new();
    let mut sentinels = 0;
    while !reader.is_done() {
        let chunk = reader.pop().expect("no failures expected");
        if chunk.is_empty() {
            sentinels += 1;
        } else {
            decoded.extend_from_slice(&chunk);
        }
    }
    manager.close();

    let mut expected = vec![b'A'; 1000];
    expected.extend(vec![b'B'; 1000]);
    assert_eq!(decoded, expected);
    assert_eq!(sentinels, 1, "exactly one terminal sentinel");
    assert!(queue.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Many bzip2 streams from a file, each larger than one chunk
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn many_bzip2_streams_from_file_decode_in_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multi.bz2");

    let parts: Vec<Vec<u8>> = (0u8..4)
        .map(|i| {
            (0..flatstream::CHUNK_BYTES + 999)
                .map(|j| i.wrapping_mul(37).wrapping_add(j as u8))
                .collect()
        })
        .collect();
    {
        let mut f = File::create(&path).unwrap();
        for part in &parts {
            f.write_all(&bz_stream(part)).unwrap();
        }
    }

    let registry = CodecRegistry::builtin();
    let mut dec = registry
        .create_decompressor(CompressionKind::Bzip2, File::open(&path).unwrap())
        .unwrap();
    assert_eq!(decode_all(&mut dec), parts.concat());
    assert!(dec.read().unwrap().is_empty(), "EOF stays EOF");
}

// ─────────────────────────────────────────────────────────────────────────────
// Gzip members concatenated in one file
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn concatenated_gzip_members_decode_continuously() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("multi.gz");
    {
        let mut f = File::create(&path).unwrap();
        f.write_all(&gz_member(b"alpha ")).unwrap();
        f.write_all(&gz_member(b"beta ")).unwrap();
        f.write_all(&gz_member(b"gamma")).unwrap();
    }

    let registry = CodecRegistry::builtin();
    let mut dec = registry
        .create_decompressor(CompressionKind::Gzip, File::open(&path).unwrap())
        .unwrap();
    assert_eq!(decode_all(&mut dec), b"alpha beta gamma");
}

// ─────────────────────────────────────────────────────────────────────────────
// An empty-payload stream sandwiched between data streams
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn empty_payload_stream_in_the_middle_is_transparent() {
    let mut source = bz_stream(b"head ");
    source.extend_from_slice(&bz_stream(b""));
    source.extend_from_slice(&bz_stream(b"tail"));

    let registry = CodecRegistry::builtin();
    let mut dec = registry
        .create_buffer_decompressor(CompressionKind::Bzip2, source)
        .unwrap();
    assert_eq!(decode_all(&mut dec), b"head tail");
}
