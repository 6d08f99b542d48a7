//! Module: packet
//!
//! Purpose: Capture sizing constants and the descriptor type that travels
//! from the radio interrupt to the forwarding task.
//!
//! Safety: Safe. No unsafe blocks. Copy types only.

/// Largest HCI event the controller can hand us:
/// 3-octet header + 255 bytes of parameters [Vol. 4, Part E, 5.4].
pub const MAX_EVENT_SIZE: usize = 3 + 255;

/// Hand-off queue bound. The original firmware used 10 and noted that 3
/// pending events were almost always enough; 16 keeps the same order of
/// magnitude and satisfies the power-of-two ring mask.
pub const QUEUE_CAPACITY: usize = 16;

/// Capture arena slot count.
///
/// Must be strictly larger than the maximum number of in-flight descriptors
/// (`QUEUE_CAPACITY` queued + 1 held by the consumer), or the producer could
/// cycle back onto a slot whose descriptor has not been forwarded yet.
pub const RING_SLOTS: usize = 32;

// Sizing is a boot-time safety property; a build that violates it must not
// exist.
const _: () = assert!(RING_SLOTS > QUEUE_CAPACITY + 1);
const _: () = assert!(RING_SLOTS.is_power_of_two());
const _: () = assert!(QUEUE_CAPACITY.is_power_of_two());
const _: () = assert!(MAX_EVENT_SIZE <= u16::MAX as usize);

/// Index of a slot in the capture arena.
///
/// Opaque on purpose: a descriptor resolves to payload bytes only through
/// the [`ProbeContext`](crate::probe::ProbeContext) that owns the arena.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotIndex(u8);

impl SlotIndex {
    pub(crate) const fn new(index: usize) -> Self {
        Self((index & (RING_SLOTS - 1)) as u8)
    }

    /// Raw arena index, always `< RING_SLOTS`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One captured advertising event, queued for forwarding.
///
/// Fixed-size value type, safe to construct in interrupt context. The payload
/// bytes live in the capture arena slot named by `slot`; the slot is not
/// reused until the arena cursor has cycled, which the sizing assertion above
/// guarantees cannot happen while this descriptor is in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketDescriptor {
    /// Microseconds since boot, taken at interrupt entry.
    pub timestamp_us: i64,
    /// Payload length in bytes, `<= MAX_EVENT_SIZE`.
    pub len: u16,
    /// Arena slot holding the payload.
    pub slot: SlotIndex,
}
