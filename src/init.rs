//! One-shot bring-up sequencer for the radio controller.
//!
//! A linear, non-branching state machine: one step per readiness poll, each
//! step visited exactly once, `Done` terminal. It resets the controller,
//! masks everything but LE Meta events, configures a passive scan, pins the
//! scanner to one channel, starts the forwarding task, and finally enables
//! scanning.
//!
//! The sequencer never waits for a Command Complete event before advancing.
//! That is a deliberate simplification for a one-shot bring-up: a command the
//! controller silently rejects is neither detected nor retried here.

use core::fmt;

use crate::hci::{self, ScanParams, CMD_BUF_LEN, LE_META_ONLY_EVENT_MASK};

/// Bring-up steps, strictly ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InitStep {
    Reset,
    SetEventMask,
    SetScanParams,
    LockChannel,
    StartConsumer,
    EnableScan,
    Done,
}

impl InitStep {
    const fn next(self) -> Self {
        match self {
            Self::Reset => Self::SetEventMask,
            Self::SetEventMask => Self::SetScanParams,
            Self::SetScanParams => Self::LockChannel,
            Self::LockChannel => Self::StartConsumer,
            Self::StartConsumer => Self::EnableScan,
            Self::EnableScan | Self::Done => Self::Done,
        }
    }
}

/// Failures reported by the radio collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerError {
    /// The controller refused a command accepted for transmission.
    Rejected,
    /// The hardware does not offer the requested capability
    /// (e.g. single-channel lock on non-ESP32 targets).
    Unsupported,
}

impl fmt::Display for ControllerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected => write!(f, "controller rejected command"),
            Self::Unsupported => write!(f, "capability not supported by this hardware"),
        }
    }
}

/// Forwarding task could not be created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpawnError;

/// Fatal bring-up failures. No retry, no partial fallback: initialization
/// halts and the device stays inert until physically reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BringUpError {
    /// A controller call failed at the named step.
    Controller { step: InitStep, cause: ControllerError },
    /// The forwarding task could not be started.
    Spawn,
}

impl fmt::Display for BringUpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Controller { step, cause } => {
                write!(f, "controller bring-up failed at {:?}: {}", step, cause)
            }
            Self::Spawn => write!(f, "could not start forwarding task"),
        }
    }
}

/// Capabilities consumed from the radio collaborator.
///
/// After the receive callback is registered elsewhere, the collaborator
/// invokes it at unpredictable times, concurrently with everything else,
/// from a context that must not block or allocate. This trait covers only
/// the command-side surface the sequencer needs.
pub trait Controller {
    /// Whether the controller can accept a command right now.
    fn is_send_ready(&mut self) -> bool;

    /// Hand an H4-framed command to the controller.
    fn send_command(&mut self, packet: &[u8]) -> Result<(), ControllerError>;

    /// Pin the scanner to one advertising channel, bypassing channel hopping.
    ///
    /// Optional capability; hardware without it keeps the default.
    fn restrict_to_channel(&mut self, channel: u8) -> Result<(), ControllerError> {
        let _ = channel;
        Err(ControllerError::Unsupported)
    }
}

/// Capability consumed from the scheduler collaborator: create the forwarding
/// task (with fixed stack, priority and core affinity where supported).
pub trait TaskSpawner {
    fn start_forwarding(&mut self) -> Result<(), SpawnError>;
}

/// What to scan and where to listen.
#[derive(Clone, Copy, Debug)]
pub struct ScanConfig {
    /// Advertising channel to lock onto; `None` leaves channel hopping alone
    /// (for hardware without the lock capability).
    pub channel: Option<u8>,
    /// LE scan parameters sent during bring-up.
    pub scan: ScanParams,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            // Primary advertising channel 37 (2402 MHz).
            channel: Some(37),
            scan: ScanParams::default(),
        }
    }
}

/// The bring-up state machine.
///
/// Drive it with [`poll`](Self::poll) from a dedicated init task; the task
/// exits once `Done` is reached. Re-polling past `Done` is a no-op, so a
/// spurious extra wakeup cannot replay a step.
pub struct Sequencer<C: Controller, S: TaskSpawner> {
    step: InitStep,
    controller: C,
    spawner: S,
    config: ScanConfig,
    cmd_buf: [u8; CMD_BUF_LEN],
}

impl<C: Controller, S: TaskSpawner> Sequencer<C, S> {
    pub fn new(controller: C, spawner: S, config: ScanConfig) -> Self {
        Self {
            step: InitStep::Reset,
            controller,
            spawner,
            config,
            cmd_buf: [0u8; CMD_BUF_LEN],
        }
    }

    /// Execute at most one bring-up step.
    ///
    /// Returns the step now current: unchanged when the controller is not
    /// ready (caller sleeps a bounded interval and re-polls), advanced after
    /// an action was accepted for transmission, `Done` forever once terminal.
    pub fn poll(&mut self) -> Result<InitStep, BringUpError> {
        if self.step == InitStep::Done {
            return Ok(InitStep::Done);
        }
        if !self.controller.is_send_ready() {
            return Ok(self.step);
        }

        match self.step {
            InitStep::Reset => {
                log::info!("resetting Bluetooth controller");
                let n = hci::cmd_reset(&mut self.cmd_buf);
                self.send(n)?;
            }
            InitStep::SetEventMask => {
                log::info!("applying HCI event mask (LE Meta events only)");
                let n = hci::cmd_set_event_mask(&mut self.cmd_buf, &LE_META_ONLY_EVENT_MASK);
                self.send(n)?;
            }
            InitStep::SetScanParams => {
                log::info!("setting passive scan parameters");
                let scan = self.config.scan;
                let n = hci::cmd_le_set_scan_params(&mut self.cmd_buf, &scan);
                self.send(n)?;
            }
            InitStep::LockChannel => {
                if let Some(channel) = self.config.channel {
                    log::info!("locking scan to channel {}", channel);
                    self.controller
                        .restrict_to_channel(channel)
                        .map_err(|cause| BringUpError::Controller { step: self.step, cause })?;
                }
            }
            InitStep::StartConsumer => {
                log::info!("starting forwarding task");
                self.spawner
                    .start_forwarding()
                    .map_err(|_| BringUpError::Spawn)?;
            }
            InitStep::EnableScan => {
                log::info!("enabling BLE scanning");
                let n = hci::cmd_le_set_scan_enable(&mut self.cmd_buf, true, false);
                self.send(n)?;
            }
            InitStep::Done => return Ok(InitStep::Done),
        }

        self.step = self.step.next();
        Ok(self.step)
    }

    /// Poll until `Done`, sleeping via `delay` between polls.
    ///
    /// `delay` must be a bounded sleep (the init task uses a FreeRTOS tick
    /// delay) so the loop stays watchdog-safe without busy-spinning.
    pub fn run_to_completion(&mut self, mut delay: impl FnMut()) -> Result<(), BringUpError> {
        loop {
            if self.poll()? == InitStep::Done {
                return Ok(());
            }
            delay();
        }
    }

    fn send(&mut self, len: usize) -> Result<(), BringUpError> {
        let step = self.step;
        self.controller
            .send_command(&self.cmd_buf[..len])
            .map_err(|cause| BringUpError::Controller { step, cause })
    }

    pub fn step(&self) -> InitStep {
        self.step
    }

    pub fn is_done(&self) -> bool {
        self.step == InitStep::Done
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeController {
        ready: bool,
        commands: Vec<Vec<u8>>,
        locked_channel: Option<u8>,
        reject_commands: bool,
    }

    impl Controller for &mut FakeController {
        fn is_send_ready(&mut self) -> bool {
            self.ready
        }

        fn send_command(&mut self, packet: &[u8]) -> Result<(), ControllerError> {
            if self.reject_commands {
                return Err(ControllerError::Rejected);
            }
            self.commands.push(packet.to_vec());
            Ok(())
        }

        fn restrict_to_channel(&mut self, channel: u8) -> Result<(), ControllerError> {
            self.locked_channel = Some(channel);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeSpawner {
        started: usize,
    }

    impl TaskSpawner for &mut FakeSpawner {
        fn start_forwarding(&mut self) -> Result<(), SpawnError> {
            self.started += 1;
            Ok(())
        }
    }

    #[test]
    fn test_no_advance_until_ready() {
        let mut controller = FakeController::default();
        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(&mut controller, &mut spawner, ScanConfig::default());

        assert_eq!(seq.poll().unwrap(), InitStep::Reset);
        assert_eq!(seq.poll().unwrap(), InitStep::Reset);
        assert_eq!(seq.step(), InitStep::Reset);
        drop(seq);
        assert!(controller.commands.is_empty());
    }

    #[test]
    fn test_full_sequence_order_and_counts() {
        let mut controller = FakeController { ready: true, ..Default::default() };
        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(&mut controller, &mut spawner, ScanConfig::default());

        seq.run_to_completion(|| {}).unwrap();
        assert!(seq.is_done());
        drop(seq);

        // Four HCI commands, in bring-up order, each exactly once.
        assert_eq!(controller.commands.len(), 4);
        let opcodes: Vec<u16> = controller
            .commands
            .iter()
            .map(|c| u16::from_le_bytes([c[1], c[2]]))
            .collect();
        assert_eq!(
            opcodes,
            vec![
                hci::OPCODE_RESET,
                hci::OPCODE_SET_EVENT_MASK,
                hci::OPCODE_LE_SET_SCAN_PARAMS,
                hci::OPCODE_LE_SET_SCAN_ENABLE,
            ]
        );
        assert_eq!(controller.locked_channel, Some(37));
        assert_eq!(spawner.started, 1);
    }

    #[test]
    fn test_consumer_started_before_scan_enable() {
        let mut controller = FakeController { ready: true, ..Default::default() };
        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(&mut controller, &mut spawner, ScanConfig::default());

        // Step until the consumer starts.
        while seq.step() != InitStep::EnableScan {
            seq.poll().unwrap();
        }
        drop(seq);

        assert_eq!(spawner.started, 1);
        // Scan enable not yet sent.
        assert!(controller
            .commands
            .iter()
            .all(|c| u16::from_le_bytes([c[1], c[2]]) != hci::OPCODE_LE_SET_SCAN_ENABLE));
    }

    #[test]
    fn test_done_is_idempotent() {
        let mut controller = FakeController { ready: true, ..Default::default() };
        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(&mut controller, &mut spawner, ScanConfig::default());

        seq.run_to_completion(|| {}).unwrap();
        for _ in 0..3 {
            assert_eq!(seq.poll().unwrap(), InitStep::Done);
        }
        drop(seq);
        assert_eq!(controller.commands.len(), 4);
        assert_eq!(spawner.started, 1);
    }

    #[test]
    fn test_no_channel_lock_when_unconfigured() {
        let mut controller = FakeController { ready: true, ..Default::default() };
        let mut spawner = FakeSpawner::default();
        let config = ScanConfig { channel: None, ..ScanConfig::default() };
        let mut seq = Sequencer::new(&mut controller, &mut spawner, config);

        seq.run_to_completion(|| {}).unwrap();
        drop(seq);
        assert_eq!(controller.locked_channel, None);
        assert_eq!(controller.commands.len(), 4);
    }

    #[test]
    fn test_rejected_command_halts_bringup() {
        let mut controller = FakeController {
            ready: true,
            reject_commands: true,
            ..Default::default()
        };
        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(&mut controller, &mut spawner, ScanConfig::default());

        assert_eq!(
            seq.poll(),
            Err(BringUpError::Controller {
                step: InitStep::Reset,
                cause: ControllerError::Rejected,
            })
        );
        // Step did not advance past the failure.
        assert_eq!(seq.step(), InitStep::Reset);
    }

    #[test]
    fn test_missing_lock_capability_is_fatal_when_requested() {
        struct NoLockController;
        impl Controller for NoLockController {
            fn is_send_ready(&mut self) -> bool {
                true
            }
            fn send_command(&mut self, _packet: &[u8]) -> Result<(), ControllerError> {
                Ok(())
            }
            // restrict_to_channel keeps the Unsupported default
        }

        let mut spawner = FakeSpawner::default();
        let mut seq = Sequencer::new(NoLockController, &mut spawner, ScanConfig::default());

        assert_eq!(
            seq.run_to_completion(|| {}),
            Err(BringUpError::Controller {
                step: InitStep::LockChannel,
                cause: ControllerError::Unsupported,
            })
        );
    }
}
