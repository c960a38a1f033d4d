//! Lock-free SPSC hand-off queue
//!
//! The producer (transmit context) and the consumer (audio callback) each own
//! one cursor. Cursors are free-running and wrap via mask, so a full queue
//! (`write - read == N`) is distinct from an empty one (`write == read`).
//!
//! # Memory Ordering
//!
//! - Producer writes the slot, then publishes `write_cursor` with `Release`
//! - Consumer loads `write_cursor` with `Acquire` before reading the slot
//! - Consumer publishes `read_cursor` with `Release` after it is done with a
//!   slot; producer loads it with `Acquire` before reusing that slot

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{ModemError, Result};
use crate::QUEUE_CAPACITY;

/// Bounded ring of pending items, split into a [`Producer`] and a [`Consumer`].
pub struct TransferQueue<T, const N: usize = QUEUE_CAPACITY> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    write_cursor: AtomicUsize,
    read_cursor: AtomicUsize,
}

// SAFETY: Slots are only written by the single producer while outside the
// consumer's readable window, and only read by the single consumer while
// inside it. The cursor protocol above keeps those windows disjoint.
unsafe impl<T: Send, const N: usize> Sync for TransferQueue<T, N> {}
unsafe impl<T: Send, const N: usize> Send for TransferQueue<T, N> {}

impl<T: Copy, const N: usize> TransferQueue<T, N> {
    /// N must be a power of 2.
    const MASK: usize = {
        assert!(N.is_power_of_two(), "Queue capacity must be power of 2");
        N - 1
    };

    /// Allocate the queue and hand out its two ends.
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (Producer<T, N>, Consumer<T, N>) {
        let queue = Arc::new(Self {
            slots: std::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
            write_cursor: AtomicUsize::new(0),
            read_cursor: AtomicUsize::new(0),
        });
        (
            Producer {
                queue: Arc::clone(&queue),
            },
            Consumer { queue },
        )
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    /// True when every enqueued item has been acknowledged.
    #[inline]
    pub fn is_drained(&self) -> bool {
        self.write_cursor.load(Ordering::Acquire) == self.read_cursor.load(Ordering::Acquire)
    }

    /// Number of outstanding items
    #[inline]
    pub fn len(&self) -> usize {
        let write = self.write_cursor.load(Ordering::Acquire);
        let read = self.read_cursor.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    pub fn is_empty(&self) -> bool {
        self.is_drained()
    }
}

/// Writing end. Only one exists per queue.
pub struct Producer<T, const N: usize = QUEUE_CAPACITY> {
    queue: Arc<TransferQueue<T, N>>,
}

impl<T: Copy, const N: usize> Producer<T, N> {
    /// Store `item` and publish it to the consumer.
    ///
    /// Never overwrites an unconsumed slot: returns `QueueFull` instead.
    pub fn enqueue(&mut self, item: T) -> Result<()> {
        let q = &*self.queue;
        let write = q.write_cursor.load(Ordering::Relaxed);
        let read = q.read_cursor.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= N {
            return Err(ModemError::QueueFull);
        }

        // SAFETY: slot `write` is outside the consumer's window [read, write)
        unsafe {
            (*q.slots[write & TransferQueue::<T, N>::MASK].get()).write(item);
        }
        q.write_cursor.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    #[inline]
    pub fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.queue.len() >= N
    }
}

/// Reading end. Only one exists per queue.
pub struct Consumer<T, const N: usize = QUEUE_CAPACITY> {
    queue: Arc<TransferQueue<T, N>>,
}

impl<T: Copy, const N: usize> Consumer<T, N> {
    /// Item at the read cursor, without consuming it.
    #[inline]
    pub fn peek_next(&self) -> Option<T> {
        let q = &*self.queue;
        let read = q.read_cursor.load(Ordering::Relaxed);
        let write = q.write_cursor.load(Ordering::Acquire);

        if write == read {
            return None;
        }

        // SAFETY: `read` is inside [read, write), so the producer has
        // initialized it and will not touch it until we advance.
        Some(unsafe { (*q.slots[read & TransferQueue::<T, N>::MASK].get()).assume_init() })
    }

    /// Acknowledge the item returned by the last `peek_next`.
    ///
    /// No-op on an empty queue so the read cursor can never pass the writer.
    #[inline]
    pub fn advance_read(&mut self) {
        let q = &*self.queue;
        let read = q.read_cursor.load(Ordering::Relaxed);
        let write = q.write_cursor.load(Ordering::Acquire);

        if write != read {
            q.read_cursor.store(read.wrapping_add(1), Ordering::Release);
        }
    }

    #[inline]
    pub fn is_drained(&self) -> bool {
        self.queue.is_drained()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_queue() {
        let (producer, consumer) = TransferQueue::<u32>::new();
        assert!(producer.is_drained());
        assert!(consumer.is_drained());
        assert_eq!(consumer.peek_next(), None);
    }

    #[test]
    fn test_peek_is_non_destructive() {
        let (mut producer, mut consumer) = TransferQueue::<u32>::new();
        producer.enqueue(7).unwrap();
        assert_eq!(consumer.peek_next(), Some(7));
        assert_eq!(consumer.peek_next(), Some(7));
        assert!(!producer.is_drained());
        consumer.advance_read();
        assert!(producer.is_drained());
    }

    #[test]
    fn test_full_queue_rejects() {
        let (mut producer, mut consumer) = TransferQueue::<u32, 4>::new();
        for i in 0..4 {
            producer.enqueue(i).unwrap();
        }
        assert!(producer.is_full());
        assert!(matches!(producer.enqueue(99), Err(ModemError::QueueFull)));

        // the rejected item did not clobber the oldest one
        assert_eq!(consumer.peek_next(), Some(0));
        consumer.advance_read();
        producer.enqueue(4).unwrap();

        let mut seen = Vec::new();
        while let Some(v) = consumer.peek_next() {
            seen.push(v);
            consumer.advance_read();
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_advance_on_empty_is_noop() {
        let (mut producer, mut consumer) = TransferQueue::<u8>::new();
        consumer.advance_read();
        consumer.advance_read();
        assert!(consumer.is_drained());
        producer.enqueue(1).unwrap();
        assert_eq!(consumer.len(), 1);
        assert_eq!(consumer.peek_next(), Some(1));
    }

    #[test]
    fn test_cursor_wraparound() {
        let (mut producer, mut consumer) = TransferQueue::<usize>::new();
        for round in 0..10 {
            for i in 0..QUEUE_CAPACITY {
                producer.enqueue(round * 100 + i).unwrap();
            }
            for i in 0..QUEUE_CAPACITY {
                assert_eq!(consumer.peek_next(), Some(round * 100 + i));
                consumer.advance_read();
            }
            assert!(producer.is_drained());
        }
    }
}
