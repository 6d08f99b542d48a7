//! # ble-adv-probe
//!
//! Passive BLE advertisement capture probe firmware.
//!
//! ## Architecture
//!
//! ```text
//! radio ISR ──▶ ProbeContext ──▶ HandoffQueue ──▶ Forwarder ──▶ UART
//!               (arena write)    (lossy, bounded)  (framing)
//! ```
//!
//! The interrupt path only timestamps an event, copies it into the capture
//! arena and queues a descriptor; everything heavier happens in the single
//! forwarding task. Bring-up is a one-shot linear [`Sequencer`] that walks
//! the controller into passive scanning and pins it to one advertising
//! channel.
//!
//! Every module here is hardware-free and tested on the host; the ESP-IDF
//! wiring lives in the binary.

#![cfg_attr(not(test), no_std)]

pub mod packet;
pub mod capture;
pub mod handoff;
pub mod frame;
pub mod hci;
pub mod probe;
pub mod forward;
pub mod init;

pub use capture::{CaptureBuffer, CaptureError};
pub use forward::{Forwarder, SerialLink};
pub use handoff::HandoffQueue;
pub use init::{BringUpError, Controller, InitStep, ScanConfig, Sequencer, TaskSpawner};
pub use packet::{PacketDescriptor, MAX_EVENT_SIZE, QUEUE_CAPACITY, RING_SLOTS};
pub use probe::{CaptureStats, ProbeContext};
