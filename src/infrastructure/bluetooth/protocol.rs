//! BLE device protocol definitions
//!
//! This module contains the UUIDs and payload encodings for the two
//! supported BLE device families: linear-motion devices speaking a compact
//! protobuf protocol, and UART bridge modules that accept framed text.

use crate::error::LinkError;
use crate::infrastructure::bluetooth::gatt::BleTarget;
use uuid::Uuid;

/// Linear-motion device BLE Service UUID
pub const LINEAR_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);

/// Command characteristic of the linear-motion service (confirmed writes)
pub const LINEAR_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);

/// UART bridge BLE Service UUID (TI/HM-10 style serial modules)
pub const UART_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ffe0_0000_1000_8000_00805f9b34fb);

/// UART bridge TX characteristic (write-without-response)
pub const UART_TX_CHAR_UUID: Uuid = Uuid::from_u128(0x0000ffe1_0000_1000_8000_00805f9b34fb);

/// Bluetooth Classic Serial Port Profile service class
pub const SPP_SERVICE_UUID: Uuid = Uuid::from_u128(0x00001101_0000_1000_8000_00805f9b34fb);

/// Durations below 1 ms or above 16 bits are meaningless to the devices.
pub const MIN_DURATION_MS: u32 = 1;
pub const MAX_DURATION_MS: u32 = 65535;

/// Client-chosen message id; the device echoes it in acknowledgements.
const MESSAGE_ID: u64 = 1;

/// Probe move used by the connection test: mid-stroke over 900 ms.
pub const PROBE_POSITION: f64 = 0.5;
pub const PROBE_DURATION_MS: u32 = 900;

/// Write target for a linear-motion device.
pub fn linear_target(address: &str) -> BleTarget {
    BleTarget {
        address: address.to_string(),
        service: LINEAR_SERVICE_UUID,
        characteristic: LINEAR_TX_CHAR_UUID,
    }
}

/// Write target for a UART bridge module.
pub fn uart_target(address: &str) -> BleTarget {
    BleTarget {
        address: address.to_string(),
        service: UART_SERVICE_UUID,
        characteristic: UART_TX_CHAR_UUID,
    }
}

/// Encode one linear move as the device's protobuf payload.
///
/// # Payload Structure
///
/// ```text
/// Payload              messages   = field 1 (repeated Message)
/// └─ Message           linear_cmd = field 6 (oneof member)
///    └─ LinearCmd      id = 1, device_index = 2, vectors = 3 (repeated)
///       └─ Vector      index = 1, duration = 2, position = 3 (double)
/// ```
///
/// Standard proto3 wiring: integers are varints, `position` is a
/// little-endian double, nested messages are length-delimited, and fields
/// holding their default value (zero) are omitted entirely. A single-vector
/// command for device 0 therefore carries no `index` or `device_index`
/// bytes, which is what the firmware expects.
///
/// `position` is a unit fraction (already range-mapped by the caller) and
/// is clamped to `[0.0, 1.0]`; `duration_ms` is clamped to
/// [`MIN_DURATION_MS`]..=[`MAX_DURATION_MS`].
pub fn encode_linear_move(position: f64, duration_ms: u32) -> Vec<u8> {
    let position = position.clamp(0.0, 1.0);
    let duration = u64::from(duration_ms.clamp(MIN_DURATION_MS, MAX_DURATION_MS));

    // Vector { index = 1, duration = 2, position = 3 }
    let mut vector = Vec::with_capacity(16);
    push_varint_field(&mut vector, 1, 0); // single-vector command, index 0
    push_varint_field(&mut vector, 2, duration);
    push_double_field(&mut vector, 3, position);

    // LinearCmd { id = 1, device_index = 2, vectors = 3 }
    let mut linear = Vec::with_capacity(vector.len() + 8);
    push_varint_field(&mut linear, 1, MESSAGE_ID);
    push_varint_field(&mut linear, 2, 0); // device_index 0
    push_message_field(&mut linear, 3, &vector);

    // Message { linear_cmd = 6 }
    let mut message = Vec::with_capacity(linear.len() + 4);
    push_message_field(&mut message, 6, &linear);

    // Payload { messages = 1 }
    let mut payload = Vec::with_capacity(message.len() + 4);
    push_message_field(&mut payload, 1, &message);
    payload
}

/// The connection-test payload for linear-motion devices.
pub fn encode_probe() -> Vec<u8> {
    encode_linear_move(PROBE_POSITION, PROBE_DURATION_MS)
}

fn push_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

fn push_varint_field(buf: &mut Vec<u8>, field: u64, value: u64) {
    if value == 0 {
        return; // proto3 omits default values
    }
    push_varint(buf, field << 3); // wire type 0
    push_varint(buf, value);
}

fn push_double_field(buf: &mut Vec<u8>, field: u64, value: f64) {
    if value == 0.0 {
        return;
    }
    push_varint(buf, (field << 3) | 1); // wire type 1, 64-bit
    buf.extend_from_slice(&value.to_le_bytes());
}

fn push_message_field(buf: &mut Vec<u8>, field: u64, body: &[u8]) {
    push_varint(buf, (field << 3) | 2); // wire type 2, length-delimited
    push_varint(buf, body.len() as u64);
    buf.extend_from_slice(body);
}

/// Parse a `AA:BB:CC:DD:EE:FF` style address into its 48-bit integer form.
/// `-` separators are accepted too.
pub fn parse_mac(address: &str) -> Result<u64, LinkError> {
    let parts: Vec<&str> = address.trim().split([':', '-']).collect();
    if parts.len() != 6 {
        return Err(LinkError::InvalidAddress(address.to_string()));
    }
    let mut value: u64 = 0;
    for part in parts {
        if part.len() != 2 {
            return Err(LinkError::InvalidAddress(address.to_string()));
        }
        let octet = u8::from_str_radix(part, 16)
            .map_err(|_| LinkError::InvalidAddress(address.to_string()))?;
        value = (value << 8) | u64::from(octet);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_payload_bytes() {
        // 900 ms varint = 84 07; 0.5 as little-endian double = .. E0 3F
        let expected = [
            0x0A, 0x12, // Payload.messages, 18 bytes
            0x32, 0x10, // Message.linear_cmd, 16 bytes
            0x08, 0x01, // LinearCmd.id = 1
            0x1A, 0x0C, // LinearCmd.vectors, 12 bytes
            0x10, 0x84, 0x07, // Vector.duration = 900
            0x19, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xE0, 0x3F, // Vector.position = 0.5
        ];
        assert_eq!(encode_probe(), expected);
    }

    #[test]
    fn test_duration_is_clamped() {
        assert_eq!(encode_linear_move(0.5, 0), encode_linear_move(0.5, 1));
        assert_eq!(
            encode_linear_move(0.5, 70_000),
            encode_linear_move(0.5, 65_535)
        );
        // 65535 as varint = FF FF 03
        let payload = encode_linear_move(0.5, 65_535);
        assert_eq!(&payload[8..12], &[0x10, 0xFF, 0xFF, 0x03]);
    }

    #[test]
    fn test_position_is_clamped() {
        assert_eq!(encode_linear_move(1.5, 900), encode_linear_move(1.0, 900));
        assert_eq!(encode_linear_move(-0.2, 900), encode_linear_move(0.0, 900));
    }

    #[test]
    fn test_zero_position_is_omitted() {
        // position 0.0 is a proto3 default, so the field disappears
        let expected = [
            0x0A, 0x09, 0x32, 0x07, 0x08, 0x01, 0x1A, 0x03, 0x10, 0xF4, 0x03,
        ];
        assert_eq!(encode_linear_move(0.0, 500), expected);
    }

    #[test]
    fn test_full_position_round_figure() {
        let payload = encode_linear_move(1.0, 65_535);
        // 1.0 as little-endian double
        assert_eq!(&payload[13..], &[0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xF0, 0x3F]);
    }

    #[test]
    fn test_parse_mac() {
        assert_eq!(parse_mac("AA:BB:CC:DD:EE:FF").unwrap(), 0xAABBCCDDEEFF);
        assert_eq!(parse_mac("00-11-22-33-44-55").unwrap(), 0x001122334455);
        assert_eq!(parse_mac(" aa:bb:cc:dd:ee:ff ").unwrap(), 0xAABBCCDDEEFF);
    }

    #[test]
    fn test_parse_mac_rejects_garbage() {
        assert!(parse_mac("").is_err());
        assert!(parse_mac("AA:BB:CC:DD:EE").is_err());
        assert!(parse_mac("AA:BB:CC:DD:EE:GG").is_err());
        assert!(parse_mac("AABBCCDDEEFF").is_err());
        assert!(parse_mac("A:BB:CC:DD:EE:FFF").is_err());
    }

    #[test]
    fn test_well_known_uuids() {
        assert_eq!(
            UART_SERVICE_UUID.to_string(),
            "0000ffe0-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(
            SPP_SERVICE_UUID.to_string(),
            "00001101-0000-1000-8000-00805f9b34fb"
        );
    }
}
