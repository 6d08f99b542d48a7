//! The forwarding task: sole consumer of the hand-off queue.
//!
//! Pops descriptors, frames them, writes them to the serial link and waits
//! for physical transmission before continuing. That wait is the system's
//! only flow control: a slow link fills the queue, the interrupt path starts
//! dropping the newest events, and memory stays bounded while throughput
//! degrades.

use core::fmt;

use crate::frame::{self, FRAME_MAX};
use crate::probe::ProbeContext;

/// The serial collaborator as the forwarder sees it.
///
/// `write_all` hands bytes to the driver; `wait_tx_done` blocks until the
/// last byte physically left the wire. On ESP32 both map onto the UART
/// driver; host tests substitute a recording mock.
pub trait SerialLink {
    type Error: fmt::Debug;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
    fn wait_tx_done(&mut self) -> Result<(), Self::Error>;
}

/// Single long-lived consumer; its lifetime equals the process's.
pub struct Forwarder<'a, L: SerialLink> {
    ctx: &'a ProbeContext,
    link: L,
    frame_buf: [u8; FRAME_MAX],
    reported_drops: u32,
}

impl<'a, L: SerialLink> Forwarder<'a, L> {
    pub fn new(ctx: &'a ProbeContext, link: L) -> Self {
        Self {
            ctx,
            link,
            frame_buf: [0u8; FRAME_MAX],
            reported_drops: 0,
        }
    }

    /// One loop iteration: blocking pop, encode, write, wait for the wire.
    ///
    /// Returns the frame length written. `idle` runs between empty-queue
    /// polls (bounded FreeRTOS delay on device).
    pub fn forward_next(&mut self, idle: impl FnMut()) -> Result<usize, L::Error> {
        let descriptor = self.ctx.queue().pop_blocking(idle);

        let payload = self.ctx.payload(&descriptor);
        let used = frame::encode(&mut self.frame_buf, descriptor.timestamp_us, payload);

        self.link.write_all(&self.frame_buf[..used])?;
        self.link.wait_tx_done()?;

        self.ctx.stats().note_forwarded();
        self.report_drops();
        Ok(used)
    }

    /// Task body. Never terminates; serial errors are logged and the loop
    /// continues in degraded mode.
    pub fn run(&mut self, mut idle: impl FnMut()) -> ! {
        loop {
            if let Err(err) = self.forward_next(&mut idle) {
                log::warn!("serial write failed, packet lost: {:?}", err);
            }
        }
    }

    /// Producer-path drops can only be reported from task context; emit a
    /// line whenever the total has moved since the last report.
    fn report_drops(&mut self) {
        let dropped = self.ctx.stats().dropped();
        if dropped != self.reported_drops {
            log::debug!(
                "capture drops: {} oversize, {} queue-full",
                self.ctx.stats().oversize_dropped(),
                self.ctx.stats().queue_full_dropped(),
            );
            self.reported_drops = dropped;
        }
    }

    pub fn into_link(self) -> L {
        self.link
    }
}
