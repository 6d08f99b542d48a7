//! Outbound wire framing for captured events.
//!
//! One fixed-width frame per forwarded packet, no delimiters beyond the
//! declared lengths:
//!
//! ```text
//! offset 0..3   : literal tag "BLE:"             (4 bytes)
//! offset 4..11  : capture timestamp, i64 LE      (8 bytes)
//! offset 12..13 : payload length, u16 LE         (2 bytes)
//! offset 14..   : raw payload bytes
//! ```
//!
//! No checksum and no escaping: a single corrupted byte on the link
//! desynchronizes every following frame. Stream integrity is owned by the
//! receiver; [`decode`] exists for that side (and for tests), on-device code
//! only encodes.

use core::fmt;

use crate::packet::MAX_EVENT_SIZE;

/// Frame tag; the collector scans for these four bytes to (re)synchronize.
pub const FRAME_TAG: &[u8; 4] = b"BLE:";

/// Fixed header: tag + timestamp + length.
pub const HEADER_LEN: usize = 4 + 8 + 2;

/// Largest possible frame.
pub const FRAME_MAX: usize = HEADER_LEN + MAX_EVENT_SIZE;

/// Encode one frame into `buf`, returning the bytes used.
///
/// `payload` must fit [`MAX_EVENT_SIZE`]; the capture path guarantees it.
#[inline]
pub fn encode(buf: &mut [u8; FRAME_MAX], timestamp_us: i64, payload: &[u8]) -> usize {
    debug_assert!(payload.len() <= MAX_EVENT_SIZE);

    buf[0..4].copy_from_slice(FRAME_TAG);
    buf[4..12].copy_from_slice(&timestamp_us.to_le_bytes());
    buf[12..14].copy_from_slice(&(payload.len() as u16).to_le_bytes());
    buf[HEADER_LEN..HEADER_LEN + payload.len()].copy_from_slice(payload);

    HEADER_LEN + payload.len()
}

/// A decoded frame, borrowing its payload from the input.
#[derive(Debug, PartialEq, Eq)]
pub struct Frame<'a> {
    pub timestamp_us: i64,
    pub payload: &'a [u8],
}

/// Receiver-side decode failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// Input does not start with [`FRAME_TAG`].
    BadTag,
    /// Input ends before the declared payload length.
    Truncated,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadTag => write!(f, "frame does not start with BLE: tag"),
            Self::Truncated => write!(f, "frame shorter than declared length"),
        }
    }
}

/// Decode one frame from the start of `bytes`.
///
/// Fixed-width scheme only; callers that lost synchronization must scan for
/// the tag themselves, exactly as the collector does.
pub fn decode(bytes: &[u8]) -> Result<Frame<'_>, FrameError> {
    if bytes.len() < 4 || &bytes[0..4] != FRAME_TAG {
        return Err(FrameError::BadTag);
    }
    if bytes.len() < HEADER_LEN {
        return Err(FrameError::Truncated);
    }

    let mut ts = [0u8; 8];
    ts.copy_from_slice(&bytes[4..12]);
    let timestamp_us = i64::from_le_bytes(ts);

    let len = u16::from_le_bytes([bytes[12], bytes[13]]) as usize;
    if bytes.len() < HEADER_LEN + len {
        return Err(FrameError::Truncated);
    }

    Ok(Frame {
        timestamp_us,
        payload: &bytes[HEADER_LEN..HEADER_LEN + len],
    })
}
