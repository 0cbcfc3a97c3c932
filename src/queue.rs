//! Ordered cross-thread hand-off of values and captured failures.
//!
//! [`SlotQueue`] is a FIFO channel of [`Slot`]s. A producer that hits a
//! failure records it as a failed slot instead of unwinding across the
//! thread boundary; the consumer re-raises it at pop time, at the exact
//! sequence position where it occurred. End-of-stream is an application
//! level sentinel value, not a channel close, so a stream can end while
//! producer handles are still alive.
//!
//! [`QueueReader`] is the consumer-side wrapper that latches on the
//! sentinel: after the terminal slot has been observed, further pops return
//! the sentinel again without touching the channel. That makes draining an
//! already-finished stream cheap and non-blocking, which destructors rely
//! on.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::{Error, Result};

/// One queue element: a value, or a failure captured on the producer side.
pub type Slot<T> = Result<T>;

/// Marker for the reserved terminal value of a slot stream.
pub trait Sentinel {
    /// The reserved terminal value.
    fn sentinel() -> Self;

    /// Whether this value is the terminal marker.
    fn is_sentinel(&self) -> bool;
}

/// Decoded chunks use the empty byte vector as their terminal marker; real
/// data chunks are never empty.
impl Sentinel for Vec<u8> {
    fn sentinel() -> Self {
        Vec::new()
    }

    fn is_sentinel(&self) -> bool {
        self.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SlotQueue
// ---------------------------------------------------------------------------

/// Thread-safe FIFO of deferred value-or-failure slots.
///
/// Clones share one channel: any number of producers feed one shared order,
/// and concurrent consumers each pop disjoint slots. Push never blocks; pop
/// blocks until a slot arrives.
pub struct SlotQueue<T> {
    tx: Sender<Slot<T>>,
    rx: Receiver<Slot<T>>,
}

impl<T> SlotQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx }
    }

    /// Append one slot.
    pub fn push(&self, slot: Slot<T>) {
        // Every handle holds both ends, so the channel cannot be
        // disconnected while a handle exists.
        self.tx.send(slot).expect("slot queue disconnected");
    }

    /// Append a resolved value.
    pub fn push_value(&self, value: T) {
        self.push(Ok(value));
    }

    /// Append a captured failure; it re-raises at the consumer's pop.
    pub fn push_failure(&self, error: Error) {
        self.push(Err(error));
    }

    /// Remove and return the oldest slot, blocking until one is available.
    pub fn pop(&self) -> Slot<T> {
        self.rx.recv().expect("slot queue disconnected")
    }

    /// Slots currently buffered.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Clone for SlotQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
        }
    }
}

impl<T> Default for SlotQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// QueueReader
// ---------------------------------------------------------------------------

/// Consumer-side wrapper that latches on the terminal sentinel.
pub struct QueueReader<T: Sentinel> {
    queue: SlotQueue<T>,
    done: bool,
}

impl<T: Sentinel> QueueReader<T> {
    pub fn new(queue: SlotQueue<T>) -> Self {
        Self { queue, done: false }
    }

    /// Next value in producer order. After the sentinel has been observed,
    /// returns the sentinel immediately without touching the channel.
    /// Failures captured by the producer re-raise here, in sequence.
    pub fn pop(&mut self) -> Result<T> {
        if self.done {
            return Ok(T::sentinel());
        }
        let value = self.queue.pop()?;
        if value.is_sentinel() {
            self.done = true;
        }
        Ok(value)
    }

    /// Whether the terminal sentinel has been observed.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Pop until the sentinel has been observed, discarding values and
    /// failures. Cheap and non-blocking once the stream has ended.
    pub fn drain(&mut self) {
        while !self.done {
            let _ = self.pop();
        }
    }
}

impl<T: Sentinel> Drop for QueueReader<T> {
    fn drop(&mut self) {
        self.drain();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn pops_in_push_order() {
        let queue = SlotQueue::new();
        for i in 0..10u32 {
            queue.push_value(vec![i as u8]);
        }
        for i in 0..10u32 {
            assert_eq!(queue.pop().unwrap(), vec![i as u8]);
        }
    }

    #[test]
    fn failure_slots_keep_their_sequence_position() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        queue.push_value(b"before".to_vec());
        queue.push_failure(Error::codec("bzip2", "bad block"));
        queue.push_value(b"after".to_vec());

        assert_eq!(queue.pop().unwrap(), b"before");
        assert!(queue.pop().is_err());
        assert_eq!(queue.pop().unwrap(), b"after");
    }

    #[test]
    fn pop_blocks_until_a_producer_pushes() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            producer.push_value(b"handoff".to_vec());
        });
        assert_eq!(queue.pop().unwrap(), b"handoff");
        handle.join().unwrap();
    }

    #[test]
    fn cross_thread_order_is_preserved() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        let producer = queue.clone();
        let handle = thread::spawn(move || {
            for i in 0..100u8 {
                producer.push_value(vec![i]);
            }
            producer.push_value(Vec::new());
        });

        let mut reader = QueueReader::new(queue);
        let mut seen = Vec::new();
        loop {
            let value = reader.pop().unwrap();
            if value.is_sentinel() {
                break;
            }
            seen.push(value[0]);
        }
        assert_eq!(seen, (0..100u8).collect::<Vec<_>>());
        handle.join().unwrap();
    }

    #[test]
    fn several_producers_feed_one_shared_order() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        let handles: Vec<_> = [1u8, 2]
            .into_iter()
            .map(|tag| {
                let producer = queue.clone();
                thread::spawn(move || {
                    for i in 0..50u8 {
                        producer.push_value(vec![tag, i]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        // All slots arrive, and each producer's slots keep their own order.
        let mut per_tag: [Vec<u8>; 3] = Default::default();
        for _ in 0..100 {
            let value = queue.pop().unwrap();
            per_tag[value[0] as usize].push(value[1]);
        }
        assert_eq!(per_tag[1], (0..50u8).collect::<Vec<_>>());
        assert_eq!(per_tag[2], (0..50u8).collect::<Vec<_>>());
    }

    #[test]
    fn reader_latches_after_sentinel() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        queue.push_value(b"data".to_vec());
        queue.push_value(Vec::new());

        let mut reader = QueueReader::new(queue.clone());
        assert_eq!(reader.pop().unwrap(), b"data");
        assert!(reader.pop().unwrap().is_sentinel());
        assert!(reader.is_done());

        // Push more after the sentinel; a latched reader must not see it.
        queue.push_value(b"late".to_vec());
        assert!(reader.pop().unwrap().is_sentinel());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn drain_swallows_failures_and_stops_at_sentinel() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        queue.push_value(b"data".to_vec());
        queue.push_failure(Error::stream_integrity("cut short"));
        queue.push_value(Vec::new());

        let mut reader = QueueReader::new(queue);
        reader.drain();
        assert!(reader.is_done());
    }

    #[test]
    fn dropping_a_reader_drains_pending_slots() {
        let queue: SlotQueue<Vec<u8>> = SlotQueue::new();
        queue.push_value(b"unread".to_vec());
        queue.push_value(Vec::new());
        {
            let _reader = QueueReader::new(queue.clone());
        }
        assert!(queue.is_empty());
    }
}
