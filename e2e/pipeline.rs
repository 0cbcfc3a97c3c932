//! E2E Test Suite: Read pipeline
//!
//! Drives the whole pipeline (decompressor → read thread → queue → reader)
//! and validates ordering, cancellation, and teardown guarantees.

use flatstream::{
    CodecRegistry, CompressionKind, Decompressor, QueueReader, ReadThreadManager, SlotQueue,
};
use std::fs;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Collect every slot until the sentinel: decoded chunks and failures.
fn collect(queue: SlotQueue<Vec<u8>>) -> (Vec<Vec<u8>>, Vec<flatstream::Error>) {
    let mut reader = QueueReader::new(queue);
    let mut chunks = Vec::new();
    let mut failures = Vec::new();
    while !reader.is_done() {
        match reader.pop() {
            Ok(chunk) if chunk.is_empty() => {}
            Ok(chunk) => chunks.push(chunk),
            Err(e) => failures.push(e),
        }
    }
    (chunks, failures)
}

// ─────────────────────────────────────────────────────────────────────────────
// N chunks followed by natural EOF arrive in push order, then one sentinel
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn n_chunks_then_exactly_one_sentinel() {
    init_logging();
    // Chunk-sized stripes so the identity codec emits one chunk per stripe.
    let stripes = 5usize;
    let mut payload = Vec::new();
    for i in 0..stripes {
        payload.extend(std::iter::repeat(i as u8).take(flatstream::CHUNK_BYTES));
    }

    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_buffer_decompressor(CompressionKind::None, payload.clone())
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    let mut reader = QueueReader::new(queue.clone());
    let mut seen = Vec::new();
    loop {
        let chunk = reader.pop().expect("no failures expected");
        if chunk.is_empty() {
            break;
        }
        seen.push(chunk);
    }
    manager.close();

    assert_eq!(seen.len(), stripes, "one chunk per stripe, in order");
    for (i, chunk) in seen.iter().enumerate() {
        assert!(chunk.iter().all(|&b| b == i as u8), "stripe {i} out of order");
    }
    assert_eq!(seen.concat(), payload);
    assert!(queue.is_empty(), "nothing may follow the sentinel");
}

// ─────────────────────────────────────────────────────────────────────────────
// stop() after the stream already ended still leaves exactly one sentinel
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stop_after_natural_eof_is_harmless() {
    init_logging();
    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_buffer_decompressor(CompressionKind::None, vec![9u8; 1000])
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    // Race a stop request against the natural end of the stream.
    manager.stop();
    manager.close();

    let (chunks, failures) = collect(queue.clone());
    assert!(failures.is_empty());
    let total: usize = chunks.iter().map(Vec::len).sum();
    assert!(total <= 1000, "never more data than the source held");
    assert!(queue.is_empty(), "exactly one sentinel, nothing after it");
}

// ─────────────────────────────────────────────────────────────────────────────
// Cooperative cancellation of a long stream
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn stop_cancels_a_long_stream() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("large.raw");
    // Large enough that the worker cannot finish before the stop request.
    let payload = vec![7u8; 64 * 1024 * 1024];
    fs::write(&path, &payload).unwrap();

    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_decompressor(CompressionKind::None, File::open(&path).unwrap())
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    // Take one chunk, then cancel; close() proves the worker terminates.
    let first = queue.pop().expect("first chunk");
    assert!(!first.is_empty());
    manager.stop();
    manager.close();

    let (_, failures) = collect(queue);
    assert!(failures.is_empty(), "cancellation is not a failure");
}

// ─────────────────────────────────────────────────────────────────────────────
// Double close: manager
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn closing_a_manager_twice_neither_errs_nor_hangs() {
    init_logging();
    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_buffer_decompressor(CompressionKind::None, b"short".to_vec())
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();
    manager.close();
    manager.close();

    let (chunks, failures) = collect(queue);
    assert!(failures.is_empty());
    assert!(chunks.concat() == b"short" || chunks.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// Double close: decompressor whose source already failed
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn closing_a_failed_decompressor_twice_is_safe() {
    init_logging();
    let registry = CodecRegistry::builtin();
    let mut dec = registry
        .create_buffer_decompressor(CompressionKind::Bzip2, b"not a bzip2 stream".to_vec())
        .unwrap();
    assert!(dec.read().is_err());
    dec.close().expect("first close");
    dec.close().expect("second close");
}

// ─────────────────────────────────────────────────────────────────────────────
// Dropping an unread reader drains the queue without hanging
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn dropping_reader_mid_stream_drains_cleanly() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.raw");
    {
        let mut f = File::create(&path).unwrap();
        f.write_all(&vec![3u8; 300_000]).unwrap();
    }

    let registry = CodecRegistry::builtin();
    let dec = registry
        .create_decompressor(CompressionKind::None, File::open(&path).unwrap())
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    {
        let mut reader = QueueReader::new(queue.clone());
        let first = reader.pop().expect("first chunk");
        assert!(!first.is_empty());
        // Reader dropped here with slots still pending; Drop must drain.
    }

    manager.close();
    assert!(queue.is_empty());
}

// ─────────────────────────────────────────────────────────────────────────────
// The pipeline works end to end from a compressed file on disk
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn file_backed_bzip2_pipeline_end_to_end() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bz2");
    let payload: Vec<u8> = (0u8..=255).cycle().take(200_000).collect();

    let registry = CodecRegistry::builtin();
    {
        let mut comp = registry
            .create_compressor(CompressionKind::Bzip2, File::create(&path).unwrap())
            .unwrap();
        comp.write(&payload).expect("compress");
        comp.close().expect("finalize");
        assert!(comp.bytes_written() > 0);
    }

    let dec = registry
        .create_decompressor(CompressionKind::Bzip2, File::open(&path).unwrap())
        .unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    let (chunks, failures) = collect(queue);
    manager.close();

    assert!(failures.is_empty(), "clean stream must not fail");
    assert_eq!(chunks.concat(), payload);
}
