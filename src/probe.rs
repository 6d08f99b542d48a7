//! The probe context: capture arena, hand-off queue and drop counters as one
//! process-lifetime object.
//!
//! The binary holds a single `static ProbeContext`, shares it by reference
//! with the radio interrupt callback and the forwarding task, and never tears
//! it down. No other state crosses the interrupt/task boundary.

use core::sync::atomic::{AtomicU32, Ordering};

use crate::capture::{CaptureBuffer, CaptureError};
use crate::handoff::HandoffQueue;
use crate::packet::PacketDescriptor;

/// Atomic capture counters.
///
/// The interrupt path cannot log; these counters are its entire diagnostic
/// surface. The forwarding task reads them in task context and reports
/// movement at debug level.
pub struct CaptureStats {
    captured: AtomicU32,
    oversize_dropped: AtomicU32,
    queue_full_dropped: AtomicU32,
    forwarded: AtomicU32,
}

impl CaptureStats {
    pub const fn new() -> Self {
        Self {
            captured: AtomicU32::new(0),
            oversize_dropped: AtomicU32::new(0),
            queue_full_dropped: AtomicU32::new(0),
            forwarded: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn captured(&self) -> u32 {
        self.captured.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn oversize_dropped(&self) -> u32 {
        self.oversize_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn queue_full_dropped(&self) -> u32 {
        self.queue_full_dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn forwarded(&self) -> u32 {
        self.forwarded.load(Ordering::Relaxed)
    }

    /// Total events dropped on the producer path since boot.
    #[inline]
    pub fn dropped(&self) -> u32 {
        self.oversize_dropped()
            .wrapping_add(self.queue_full_dropped())
    }

    #[inline]
    pub(crate) fn note_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for CaptureStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the capture pipeline shares across contexts.
pub struct ProbeContext {
    buffer: CaptureBuffer,
    queue: HandoffQueue,
    stats: CaptureStats,
}

impl ProbeContext {
    pub const fn new() -> Self {
        Self {
            buffer: CaptureBuffer::new(),
            queue: HandoffQueue::new(),
            stats: CaptureStats::new(),
        }
    }

    /// Interrupt-side intake: timestamp an event, store it, queue it.
    ///
    /// The queue-room check runs before the arena write, so a rejected event
    /// leaves the producer cursor untouched and the arena's in-flight window
    /// intact. Errors are also counted here; callers in interrupt context
    /// just return.
    ///
    /// # Timing
    ///
    /// Bounded: one length check, one room check, one copy. No locks, no
    /// allocation, no blocking. This is the only producer entry point.
    #[inline]
    pub fn on_event(&self, timestamp_us: i64, bytes: &[u8]) -> Result<(), CaptureError> {
        if self.queue.len() >= self.queue.capacity() {
            self.stats.queue_full_dropped.fetch_add(1, Ordering::Relaxed);
            return Err(CaptureError::QueueFull);
        }

        let slot = match self.buffer.write(bytes) {
            Ok(slot) => slot,
            Err(err) => {
                self.stats.oversize_dropped.fetch_add(1, Ordering::Relaxed);
                return Err(err);
            }
        };

        let descriptor = PacketDescriptor {
            timestamp_us,
            len: bytes.len() as u16,
            slot,
        };

        match self.queue.push_from_interrupt(descriptor) {
            Ok(()) => {
                self.stats.captured.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                // Unreachable with a single producer (room was checked above);
                // count it anyway rather than lose the signal.
                self.stats.queue_full_dropped.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    /// Resolve a popped descriptor to its payload bytes.
    #[inline]
    pub fn payload(&self, descriptor: &PacketDescriptor) -> &[u8] {
        self.buffer.payload(descriptor.slot, descriptor.len)
    }

    #[inline]
    pub fn queue(&self) -> &HandoffQueue {
        &self.queue
    }

    #[inline]
    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }
}

impl Default for ProbeContext {
    fn default() -> Self {
        Self::new()
    }
}
