//! E2E Test Suite: Failure delivery
//!
//! Failures must arrive through the queue at the exact sequence position
//! where they occurred, exactly once, and always before the terminal
//! sentinel; teardown after a failure must stay silent.

use flatstream::{
    CodecRegistry, CompressionKind, Error, QueueReader, ReadThreadManager, SlotQueue,
};
use std::io::Write;
use tempfile::TempDir;

fn bz_stream(payload: &[u8]) -> Vec<u8> {
    let mut encoder = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    encoder.write_all(payload).unwrap();
    encoder.finish().unwrap()
}

/// Everything the consumer observed, in order.
#[derive(Debug)]
enum Observed {
    Chunk(Vec<u8>),
    Failure(Error),
    Sentinel,
}

fn run_pipeline(kind: CompressionKind, source: Vec<u8>) -> Vec<Observed> {
    let registry = CodecRegistry::builtin();
    let dec = registry.create_buffer_decompressor(kind, source).unwrap();
    let queue = SlotQueue::new();
    let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

    let mut observed = Vec::new();
    let mut reader = QueueReader::new(queue);
    while !reader.is_done() {
        match reader.pop() {
            Ok(chunk) if chunk.is_empty() => observed.push(Observed::Sentinel),
            Ok(chunk) => observed.push(Observed::Chunk(chunk)),
            Err(e) => observed.push(Observed::Failure(e)),
        }
    }
    manager.close();
    observed
}

// ─────────────────────────────────────────────────────────────────────────────
// Corruption: exactly one codec failure, strictly before the sentinel
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn corrupt_source_yields_one_codec_failure_before_the_sentinel() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(256 * 1024).collect();
    let mut source = bz_stream(&payload);
    let mid = source.len() / 2;
    source[mid] ^= 0xff;

    let observed = run_pipeline(CompressionKind::Bzip2, source);

    let failure_positions: Vec<usize> = observed
        .iter()
        .enumerate()
        .filter_map(|(i, o)| matches!(o, Observed::Failure(_)).then_some(i))
        .collect();
    let sentinel_positions: Vec<usize> = observed
        .iter()
        .enumerate()
        .filter_map(|(i, o)| matches!(o, Observed::Sentinel).then_some(i))
        .collect();

    assert_eq!(failure_positions.len(), 1, "exactly one failure");
    assert_eq!(sentinel_positions.len(), 1, "exactly one sentinel");
    assert!(
        failure_positions[0] < sentinel_positions[0],
        "failure must precede the sentinel"
    );
    match &observed[failure_positions[0]] {
        Observed::Failure(Error::Codec { codec, .. }) => assert_eq!(*codec, "bzip2"),
        other => panic!("expected a bzip2 codec failure, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Truncation: integrity failure, then the sentinel
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn truncated_source_yields_integrity_failure_then_sentinel() {
    let payload: Vec<u8> = (0u8..=255).cycle().take(256 * 1024).collect();
    let source = bz_stream(&payload);
    let cut = source.len() * 3 / 5;
    let observed = run_pipeline(CompressionKind::Bzip2, source[..cut].to_vec());

    let mut failures = 0;
    for o in &observed {
        if let Observed::Failure(e) = o {
            failures += 1;
            assert!(matches!(e, Error::StreamIntegrity { .. }), "got {e:?}");
        }
    }
    assert_eq!(failures, 1);
    assert!(matches!(observed.last(), Some(Observed::Sentinel)));
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry miss
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_codec_is_reported_at_creation_time() {
    let registry = CodecRegistry::new();
    let err = registry
        .create_buffer_decompressor(CompressionKind::Gzip, Vec::new())
        .unwrap_err();
    assert!(matches!(err, Error::UnknownCodec(CompressionKind::Gzip)));
    assert_eq!(err.to_string(), "unknown codec: gzip");
}

// ─────────────────────────────────────────────────────────────────────────────
// Input failures carry the platform error code
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn input_failures_expose_the_platform_code() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("plain.raw");
    std::fs::write(&path, b"payload").unwrap();

    // A file opened write-only fails reads with a real OS error.
    let file = std::fs::OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap();
    let registry = CodecRegistry::builtin();
    let mut dec = registry
        .create_decompressor(CompressionKind::None, file)
        .unwrap();

    match dec.read() {
        Err(err @ Error::Input { .. }) => {
            assert!(err.raw_os_error().is_some(), "platform code expected");
        }
        other => panic!("expected an input error, got {other:?}"),
    }
    dec.close().expect("close after failure");
}

// ─────────────────────────────────────────────────────────────────────────────
// A failure mid-file still delivers the chunks decoded before it
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn chunks_decoded_before_the_failure_are_delivered() {
    // First stream is intact; the second is corrupted mid-way.
    let mut source = bz_stream(&vec![b'G'; 100_000]);
    let mut second = bz_stream(&vec![b'H'; 100_000]);
    let mid = second.len() / 2;
    second[mid] ^= 0xff;
    source.extend_from_slice(&second);

    let observed = run_pipeline(CompressionKind::Bzip2, source);

    let mut expected = vec![b'G'; 100_000];
    expected.extend(vec![b'H'; 100_000]);
    let mut before_failure = Vec::new();
    for o in &observed {
        match o {
            Observed::Chunk(chunk) => before_failure.extend_from_slice(chunk),
            Observed::Failure(_) => break,
            Observed::Sentinel => panic!("sentinel before the failure"),
        }
    }
    assert!(!before_failure.is_empty(), "the intact prefix is delivered");
    assert_eq!(
        before_failure,
        expected[..before_failure.len()],
        "delivered chunks form an exact prefix of the decoded sequence"
    );
    assert!(matches!(observed.last(), Some(Observed::Sentinel)));
}
