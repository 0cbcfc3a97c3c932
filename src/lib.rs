//! flatstream: threaded streaming-decompression read pipeline.
//!
//! Streams large flat files (arbitrarily compressed) into a consumer
//! without blocking the consumer on disk I/O or codec work: a dedicated
//! read thread drains a [`Decompressor`] into a [`SlotQueue`], and the
//! consumer pops decoded chunks, captured failures, and finally the
//! terminal sentinel, all in decode order.
//!
//! ```no_run
//! use std::fs::File;
//! use flatstream::{
//!     CodecRegistry, CompressionKind, QueueReader, ReadThreadManager, SlotQueue,
//! };
//!
//! # fn main() -> flatstream::Result<()> {
//! let registry = CodecRegistry::builtin();
//! let file = File::open("big.log.bz2").map_err(|e| {
//!     flatstream::Error::input("open failed", e)
//! })?;
//! let decompressor = registry.create_decompressor(CompressionKind::Bzip2, file)?;
//!
//! let queue = SlotQueue::new();
//! let mut manager = ReadThreadManager::spawn(decompressor, queue.clone())?;
//! let mut reader = QueueReader::new(queue);
//! loop {
//!     let chunk = reader.pop()?;
//!     if chunk.is_empty() {
//!         break;
//!     }
//!     // hand the decoded bytes to the parser of your choice
//! }
//! manager.close();
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod error;
pub mod queue;
pub mod reader;

// ── Top-level re-exports ──────────────────────────────────────────────────────
pub use codec::registry::CodecRegistry;
pub use codec::{Chunk, CompressionKind, Compressor, Decompressor};
pub use codec::{CHUNK_BYTES, INPUT_BUFFER_BYTES};
pub use error::{Error, Result};
pub use queue::{QueueReader, Sentinel, Slot, SlotQueue};
pub use reader::ReadThreadManager;
