//! HCI command encoding (H4 UART framing).
//!
//! The bring-up sequence talks to the controller with four commands, encoded
//! per Bluetooth Core Spec Vol. 4, Part E:
//!
//! ```text
//! [0x01, opcode_lo, opcode_hi, param_len, params…]
//! ```
//!
//! All multi-byte fields little-endian. Builders write into a caller buffer
//! and return the bytes used; nothing allocates.

/// H4 packet-type indicator for host → controller commands.
const H4_COMMAND: u8 = 0x01;

/// Command buffer size, comfortably above the longest command we send.
pub const CMD_BUF_LEN: usize = 64;

/// HCI_Reset — OGF=0x03 (Controller & Baseband), OCF=0x0003.
pub const OPCODE_RESET: u16 = 0x0C03;

/// HCI_Set_Event_Mask — OGF=0x03, OCF=0x0001.
pub const OPCODE_SET_EVENT_MASK: u16 = 0x0C01;

/// HCI_LE_Set_Scan_Parameters — OGF=0x08 (LE Controller), OCF=0x000B.
pub const OPCODE_LE_SET_SCAN_PARAMS: u16 = 0x200B;

/// HCI_LE_Set_Scan_Enable — OGF=0x08, OCF=0x000C.
pub const OPCODE_LE_SET_SCAN_ENABLE: u16 = 0x200C;

/// Event mask with only bit 61 (LE Meta event) set: advertising reports come
/// through, every other event class is suppressed.
pub const LE_META_ONLY_EVENT_MASK: [u8; 8] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20];

/// LE scan parameters as they appear on the wire.
///
/// Interval and window are in 625 µs slots. Defaults are the probe's
/// operating point: passive scan, 50 ms interval and window (continuous
/// within the window), public own address, no additional filtering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScanParams {
    /// 0x00 = passive (no scan requests transmitted).
    pub scan_type: u8,
    /// How often to scan, in 625 µs slots.
    pub interval_slots: u16,
    /// How long to scan per interval, in 625 µs slots.
    pub window_slots: u16,
    /// 0x00 = public device address.
    pub own_addr_type: u8,
    /// 0x00 = accept all advertising packets.
    pub filter_policy: u8,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            scan_type: 0x00,
            interval_slots: 0x0050,
            window_slots: 0x0050,
            own_addr_type: 0x00,
            filter_policy: 0x00,
        }
    }
}

#[inline]
fn put_header(buf: &mut [u8; CMD_BUF_LEN], opcode: u16, param_len: u8) -> usize {
    buf[0] = H4_COMMAND;
    buf[1] = (opcode & 0xFF) as u8;
    buf[2] = (opcode >> 8) as u8;
    buf[3] = param_len;
    4
}

/// Encode HCI_Reset.
pub fn cmd_reset(buf: &mut [u8; CMD_BUF_LEN]) -> usize {
    put_header(buf, OPCODE_RESET, 0)
}

/// Encode HCI_Set_Event_Mask with the given 8-byte mask.
pub fn cmd_set_event_mask(buf: &mut [u8; CMD_BUF_LEN], mask: &[u8; 8]) -> usize {
    let n = put_header(buf, OPCODE_SET_EVENT_MASK, 8);
    buf[n..n + 8].copy_from_slice(mask);
    n + 8
}

/// Encode HCI_LE_Set_Scan_Parameters.
pub fn cmd_le_set_scan_params(buf: &mut [u8; CMD_BUF_LEN], params: &ScanParams) -> usize {
    let n = put_header(buf, OPCODE_LE_SET_SCAN_PARAMS, 7);
    buf[n] = params.scan_type;
    buf[n + 1..n + 3].copy_from_slice(&params.interval_slots.to_le_bytes());
    buf[n + 3..n + 5].copy_from_slice(&params.window_slots.to_le_bytes());
    buf[n + 5] = params.own_addr_type;
    buf[n + 6] = params.filter_policy;
    n + 7
}

/// Encode HCI_LE_Set_Scan_Enable.
pub fn cmd_le_set_scan_enable(buf: &mut [u8; CMD_BUF_LEN], enable: bool, filter_duplicates: bool) -> usize {
    let n = put_header(buf, OPCODE_LE_SET_SCAN_ENABLE, 2);
    buf[n] = enable as u8;
    buf[n + 1] = filter_duplicates as u8;
    n + 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_bytes() {
        let mut buf = [0u8; CMD_BUF_LEN];
        let n = cmd_reset(&mut buf);
        // Opcode 0x0C03 little-endian, no parameters.
        assert_eq!(&buf[..n], &[0x01, 0x03, 0x0C, 0x00]);
    }

    #[test]
    fn test_event_mask_bytes() {
        let mut buf = [0u8; CMD_BUF_LEN];
        let n = cmd_set_event_mask(&mut buf, &LE_META_ONLY_EVENT_MASK);
        assert_eq!(
            &buf[..n],
            &[0x01, 0x01, 0x0C, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x20]
        );
    }

    #[test]
    fn test_scan_params_bytes() {
        let mut buf = [0u8; CMD_BUF_LEN];
        let n = cmd_le_set_scan_params(&mut buf, &ScanParams::default());
        assert_eq!(
            &buf[..n],
            &[0x01, 0x0B, 0x20, 0x07, 0x00, 0x50, 0x00, 0x50, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_scan_params_custom_window() {
        let params = ScanParams {
            interval_slots: 0x1234,
            window_slots: 0x0010,
            ..ScanParams::default()
        };
        let mut buf = [0u8; CMD_BUF_LEN];
        let n = cmd_le_set_scan_params(&mut buf, &params);
        assert_eq!(&buf[5..7], &[0x34, 0x12]);
        assert_eq!(&buf[7..9], &[0x10, 0x00]);
        assert_eq!(n, 11);
    }

    #[test]
    fn test_scan_enable_bytes() {
        let mut buf = [0u8; CMD_BUF_LEN];
        let n = cmd_le_set_scan_enable(&mut buf, true, false);
        // Enable scanning, duplicate filtering disabled.
        assert_eq!(&buf[..n], &[0x01, 0x0C, 0x20, 0x02, 0x01, 0x00]);
    }
}
