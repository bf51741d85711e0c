//! Byte protocol spoken with the host.
//!
//! Every message starts with one header byte; the payload length is implied by
//! the header, there is no framing or checksum. Multi-byte fields are
//! little-endian u16.
//!
//! | header | request payload             | response            |
//! |--------|-----------------------------|---------------------|
//! | `0x00` | 4x thruster us, 4x servo us | none                |
//! | `0x01` | none                        | flex1 flex2 cur vol |
//! | `0x02` | none                        | state byte          |
//! | `0xFE` | none                        | none                |
//! | `0xFF` | none                        | none                |

use crate::inputs::sensor::SNAPSHOT_LEN;
use crate::outputs::actuator::{PulseCommand, THRUSTER_NUM};

pub const WRITE_PAYLOAD_LEN: usize = THRUSTER_NUM * 2 * 2;
pub const STATE_RESPONSE_LEN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Header {
    Write = 0x00,
    ReadSensors = 0x01,
    ReadState = 0x02,
    Restart = 0xFE,
    Suspend = 0xFF,
}

impl Header {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(Header::Write),
            0x01 => Some(Header::ReadSensors),
            0x02 => Some(Header::ReadState),
            0xFE => Some(Header::Restart),
            0xFF => Some(Header::Suspend),
            _ => None,
        }
    }

    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Bytes that follow the header from the host.
    pub fn payload_len(&self) -> usize {
        match self {
            Header::Write => WRITE_PAYLOAD_LEN,
            _ => 0,
        }
    }

    /// Bytes the board sends back.
    pub fn response_len(&self) -> usize {
        match self {
            Header::ReadSensors => SNAPSHOT_LEN,
            Header::ReadState => STATE_RESPONSE_LEN,
            _ => 0,
        }
    }
}

/// Thruster words occupy the first half of the payload, servo words the second.
pub fn decode_write(payload: &[u8; WRITE_PAYLOAD_LEN]) -> PulseCommand {
    let word = |offset: usize| u16::from_le_bytes([payload[offset], payload[offset + 1]]);
    let servo_base = THRUSTER_NUM * 2;
    let mut pairs = [(0u16, 0u16); THRUSTER_NUM];
    for (i, pair) in pairs.iter_mut().enumerate() {
        *pair = (word(i * 2), word(servo_base + i * 2));
    }
    PulseCommand::new(pairs)
}

pub fn encode_write(cmd: &PulseCommand) -> [u8; WRITE_PAYLOAD_LEN] {
    let servo_base = THRUSTER_NUM * 2;
    let mut out = [0u8; WRITE_PAYLOAD_LEN];
    for (i, &(thruster, servo)) in cmd.pairs().iter().enumerate() {
        out[i * 2..i * 2 + 2].copy_from_slice(&thruster.to_le_bytes());
        out[servo_base + i * 2..servo_base + i * 2 + 2].copy_from_slice(&servo.to_le_bytes());
    }
    out
}

/// Complete host-side write request: header followed by the payload.
pub fn write_request(cmd: &PulseCommand) -> Vec<u8> {
    let mut frame = Vec::with_capacity(1 + WRITE_PAYLOAD_LEN);
    frame.push(Header::Write.as_byte());
    frame.extend_from_slice(&encode_write(cmd));
    frame
}
