//! Bounded descriptor queue bridging the radio interrupt to the forwarding
//! task.
//!
//! ```text
//! radio ISR ──push_from_interrupt()──▶ [d0][d1]…[dK-1] ──pop()──▶ forwarder
//!            non-blocking, lossy         lock-free         single consumer
//! ```
//!
//! # Rules
//!
//! - Push never blocks and never allocates; a full queue drops the newest
//!   event. That bounds interrupt latency at the cost of completeness under
//!   sustained overload. Deliberate, not a bug.
//! - Pop returns descriptors strictly in arrival order; nothing is reordered
//!   or prioritized.
//! - Single producer (interrupt), single consumer (forwarding task).

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::capture::CaptureError;
use crate::packet::{PacketDescriptor, QUEUE_CAPACITY};

/// Lock-free SPSC FIFO of packet descriptors, capacity [`QUEUE_CAPACITY`].
///
/// # Memory Ordering
///
/// - Producer stores `write_idx` with `Release` after filling the entry, so
///   the consumer's `Acquire` load sees the descriptor (and the arena bytes
///   written before it) fully formed.
/// - Consumer stores `read_idx` with `Release` after copying the entry out,
///   so the producer's `Acquire` load never reuses a live entry.
pub struct HandoffQueue {
    entries: UnsafeCell<[PacketDescriptor; QUEUE_CAPACITY]>,
    write_idx: AtomicUsize,
    read_idx: AtomicUsize,
}

// SAFETY: single producer / single consumer, coordinated through the
// Acquire/Release pairs on write_idx and read_idx. Each side only touches
// entries it owns by index arithmetic.
unsafe impl Sync for HandoffQueue {}
unsafe impl Send for HandoffQueue {}

const EMPTY_DESCRIPTOR: PacketDescriptor = PacketDescriptor {
    timestamp_us: 0,
    len: 0,
    slot: crate::packet::SlotIndex::new(0),
};

impl HandoffQueue {
    const MASK: usize = QUEUE_CAPACITY - 1;

    pub const fn new() -> Self {
        Self {
            entries: UnsafeCell::new([EMPTY_DESCRIPTOR; QUEUE_CAPACITY]),
            write_idx: AtomicUsize::new(0),
            read_idx: AtomicUsize::new(0),
        }
    }

    /// Enqueue a descriptor from interrupt context.
    ///
    /// Returns [`CaptureError::QueueFull`] when [`QUEUE_CAPACITY`] descriptors
    /// are already pending; producer state is left untouched in that case.
    ///
    /// # Timing
    ///
    /// O(1), never blocks, never allocates. Interrupt-safe.
    #[inline]
    pub fn push_from_interrupt(&self, descriptor: PacketDescriptor) -> Result<(), CaptureError> {
        let write = self.write_idx.load(Ordering::Relaxed);
        let read = self.read_idx.load(Ordering::Acquire);

        if write.wrapping_sub(read) >= QUEUE_CAPACITY {
            return Err(CaptureError::QueueFull);
        }

        // SAFETY: single producer; room check above means this entry is not
        // visible to the consumer yet.
        unsafe {
            (*self.entries.get())[write & Self::MASK] = descriptor;
        }

        self.write_idx.store(write.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Dequeue the oldest descriptor, if any. Consumer side only.
    #[inline]
    pub fn pop(&self) -> Option<PacketDescriptor> {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);

        if read == write {
            return None;
        }

        // SAFETY: single consumer; entry was published by the producer's
        // Release store.
        let descriptor = unsafe { (*self.entries.get())[read & Self::MASK] };

        self.read_idx.store(read.wrapping_add(1), Ordering::Release);
        Some(descriptor)
    }

    /// Dequeue, waiting until a descriptor arrives.
    ///
    /// `idle` runs between attempts; the forwarding task passes a bounded
    /// FreeRTOS delay, host tests pass `yield_now`. The wait itself is
    /// unbounded: the consumer has no other work.
    #[inline]
    pub fn pop_blocking(&self, mut idle: impl FnMut()) -> PacketDescriptor {
        loop {
            if let Some(descriptor) = self.pop() {
                return descriptor;
            }
            idle();
        }
    }

    /// Number of descriptors currently pending.
    #[inline]
    pub fn len(&self) -> usize {
        let read = self.read_idx.load(Ordering::Relaxed);
        let write = self.write_idx.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn capacity(&self) -> usize {
        QUEUE_CAPACITY
    }
}

impl Default for HandoffQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SlotIndex;

    fn descriptor(timestamp_us: i64) -> PacketDescriptor {
        PacketDescriptor {
            timestamp_us,
            len: 4,
            slot: SlotIndex::new(timestamp_us as usize),
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = HandoffQueue::new();

        queue.push_from_interrupt(descriptor(1)).unwrap();
        queue.push_from_interrupt(descriptor(2)).unwrap();
        queue.push_from_interrupt(descriptor(3)).unwrap();

        assert_eq!(queue.pop().unwrap().timestamp_us, 1);
        assert_eq!(queue.pop().unwrap().timestamp_us, 2);
        assert_eq!(queue.pop().unwrap().timestamp_us, 3);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_full_queue_rejects_without_corruption() {
        let queue = HandoffQueue::new();

        for i in 0..QUEUE_CAPACITY {
            queue.push_from_interrupt(descriptor(i as i64)).unwrap();
        }
        assert_eq!(
            queue.push_from_interrupt(descriptor(999)),
            Err(CaptureError::QueueFull)
        );
        assert_eq!(queue.len(), QUEUE_CAPACITY);

        // Every queued descriptor still comes out intact and in order.
        for i in 0..QUEUE_CAPACITY {
            assert_eq!(queue.pop().unwrap().timestamp_us, i as i64);
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drain_reopens_queue() {
        let queue = HandoffQueue::new();

        for i in 0..QUEUE_CAPACITY {
            queue.push_from_interrupt(descriptor(i as i64)).unwrap();
        }
        queue.pop().unwrap();
        queue.push_from_interrupt(descriptor(100)).unwrap();
        assert_eq!(queue.len(), QUEUE_CAPACITY);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let queue = HandoffQueue::new();

        // Push/pop past the ring boundary several times over.
        for i in 0..(QUEUE_CAPACITY as i64 * 3) {
            queue.push_from_interrupt(descriptor(i)).unwrap();
            assert_eq!(queue.pop().unwrap().timestamp_us, i);
        }
    }

    #[test]
    fn test_pop_blocking_returns_when_item_arrives() {
        let queue = HandoffQueue::new();
        queue.push_from_interrupt(descriptor(42)).unwrap();

        let mut idles = 0;
        let got = queue.pop_blocking(|| idles += 1);
        assert_eq!(got.timestamp_us, 42);
        assert_eq!(idles, 0);
    }

    #[test]
    fn test_concurrent_producer_consumer() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(HandoffQueue::new());
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut sent = 0i64;
                while sent < 1000 {
                    if queue.push_from_interrupt(descriptor(sent)).is_ok() {
                        sent += 1;
                    } else {
                        thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0i64;
        while expected < 1000 {
            let got = queue.pop_blocking(std::thread::yield_now);
            assert_eq!(got.timestamp_us, expected);
            expected += 1;
        }
        producer.join().unwrap();
    }
}
