//! Background read thread: drains a decompressor into a slot queue.
//!
//! The manager owns the worker thread for one decompressor. The worker is
//! the only thread that ever touches the decompressor, so codec state needs
//! no locking; the queue is the only shared structure. Cancellation is
//! cooperative: the stop flag is checked between reads, never mid-decode,
//! so cancellation latency is bounded by one chunk's decode time.
//!
//! Every termination path (clean end-of-stream, captured failure, external
//! stop) pushes exactly one terminal sentinel last, so a consumer always
//! observes a definite end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::codec::{Chunk, Decompressor};
use crate::error::{Error, Result};
use crate::queue::{Sentinel, SlotQueue};

/// Owns one decompressor's worker thread; stop + join on `close`.
pub struct ReadThreadManager {
    stop_flag: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ReadThreadManager {
    /// Take ownership of the decompressor and start reading immediately.
    /// Chunks and captured failures arrive on `queue` in decode order.
    pub fn spawn(decompressor: Box<dyn Decompressor>, queue: SlotQueue<Chunk>) -> Result<Self> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let worker_flag = Arc::clone(&stop_flag);
        let handle = thread::Builder::new()
            .name("flatstream-read".into())
            .spawn(move || read_loop(decompressor, queue, worker_flag))
            .map_err(|e| Error::input("failed to spawn read thread", e))?;
        Ok(Self {
            stop_flag,
            handle: Some(handle),
        })
    }

    /// Request cooperative cancellation. The worker finishes the read in
    /// flight, then terminates without pushing further data; the terminal
    /// sentinel is still pushed.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    /// Stop and join the worker. Idempotent and safe from `Drop`; a worker
    /// panic is contained here and logged, never propagated.
    pub fn close(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("read thread panicked");
            }
        }
    }
}

impl Drop for ReadThreadManager {
    fn drop(&mut self) {
        self.close();
    }
}

fn read_loop(
    mut decompressor: Box<dyn Decompressor>,
    queue: SlotQueue<Chunk>,
    stop: Arc<AtomicBool>,
) {
    log::trace!("read thread started");

    while !stop.load(Ordering::Relaxed) {
        match decompressor.read() {
            Ok(chunk) => {
                if chunk.is_sentinel() {
                    break;
                }
                queue.push_value(chunk);
            }
            Err(err) => {
                queue.push_failure(err);
                if let Err(close_err) = decompressor.close() {
                    log::debug!("swallowed close failure after read error: {close_err}");
                }
                queue.push_value(Chunk::sentinel());
                log::trace!("read thread finished after failure");
                return;
            }
        }
    }

    if let Err(err) = decompressor.close() {
        queue.push_failure(err);
    }
    queue.push_value(Chunk::sentinel());
    log::trace!("read thread finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::identity::IdentityDecompressor;
    use crate::queue::QueueReader;
    use std::sync::atomic::AtomicUsize;

    /// Produces chunks forever; only a stop request can end the loop.
    #[derive(Debug)]
    struct EndlessDecompressor;

    impl Decompressor for EndlessDecompressor {
        fn read(&mut self) -> Result<Chunk> {
            Ok(vec![0xAB; 32])
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn offset(&self) -> u64 {
            0
        }
    }

    /// Yields `chunks` data chunks, then one failure, and records closes.
    #[derive(Debug)]
    struct FailingDecompressor {
        chunks: usize,
        closes: Arc<AtomicUsize>,
    }

    impl Decompressor for FailingDecompressor {
        fn read(&mut self) -> Result<Chunk> {
            if self.chunks > 0 {
                self.chunks -= 1;
                return Ok(vec![1; 8]);
            }
            Err(Error::codec("bzip2", "synthetic failure"))
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn offset(&self) -> u64 {
            0
        }
    }

    #[test]
    fn natural_eof_yields_values_then_one_sentinel() {
        let payload = vec![42u8; 100];
        let queue = SlotQueue::new();
        let dec = Box::new(IdentityDecompressor::from_buffer(payload.clone()));
        let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

        let mut reader = QueueReader::new(queue.clone());
        assert_eq!(reader.pop().unwrap(), payload);
        assert!(reader.pop().unwrap().is_sentinel());
        assert!(reader.is_done());

        manager.close();
        assert!(queue.is_empty());
    }

    #[test]
    fn stop_terminates_an_endless_stream() {
        let queue = SlotQueue::new();
        let mut manager =
            ReadThreadManager::spawn(Box::new(EndlessDecompressor), queue.clone()).unwrap();

        // Observe at least one chunk, then cancel.
        assert_eq!(queue.pop().unwrap(), vec![0xAB; 32]);
        manager.stop();
        manager.close(); // joins: proves the worker honored the stop flag

        let mut reader = QueueReader::new(queue);
        reader.drain();
        assert!(reader.is_done());
    }

    #[test]
    fn failure_is_followed_by_sentinel_and_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let queue = SlotQueue::new();
        let dec = Box::new(FailingDecompressor {
            chunks: 2,
            closes: Arc::clone(&closes),
        });
        let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();

        let mut failures = 0;
        let mut values = 0;
        let mut reader = QueueReader::new(queue);
        while !reader.is_done() {
            match reader.pop() {
                Ok(chunk) if chunk.is_sentinel() => {}
                Ok(_) => values += 1,
                Err(_) => failures += 1,
            }
        }
        manager.close();
        assert_eq!(values, 2);
        assert_eq!(failures, 1);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn close_is_idempotent() {
        let queue = SlotQueue::new();
        let dec = Box::new(IdentityDecompressor::from_buffer(Vec::new()));
        let mut manager = ReadThreadManager::spawn(dec, queue.clone()).unwrap();
        manager.close();
        manager.close();

        let mut reader = QueueReader::new(queue);
        assert!(reader.pop().unwrap().is_sentinel());
    }
}
