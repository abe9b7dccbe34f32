//! The fixed 9-byte control command and 73-byte response, and the
//! in-process `Command` the control server hands to the acquisition
//! mailbox.

use thiserror::Error;

pub const COMMAND_LEN: usize = 9;
pub const RESPONSE_LEN: usize = 73;
const MESSAGE_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    SetFreq(f64),
    SetSampleRate(f64),
    SetGain(f64),
    SetBandwidth(f64),
    GetStatus,
    Ping,
    Stop,
}

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("command frame must be {COMMAND_LEN} bytes, got {0}")]
    BadLength(usize),
    #[error("unknown opcode {0}")]
    UnknownOpcode(u8),
}

impl Command {
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != COMMAND_LEN {
            return Err(ProtocolError::BadLength(buf.len()));
        }
        let opcode = buf[0];
        let value = f64::from_le_bytes(buf[1..9].try_into().unwrap());
        match opcode {
            0 => Ok(Command::SetFreq(value)),
            1 => Ok(Command::SetSampleRate(value)),
            2 => Ok(Command::SetGain(value)),
            3 => Ok(Command::SetBandwidth(value)),
            4 => Ok(Command::GetStatus),
            5 => Ok(Command::Ping),
            6 => Ok(Command::Stop),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }

    pub fn encode(&self) -> [u8; COMMAND_LEN] {
        let mut buf = [0u8; COMMAND_LEN];
        let (opcode, value) = match *self {
            Command::SetFreq(v) => (0u8, v),
            Command::SetSampleRate(v) => (1, v),
            Command::SetGain(v) => (2, v),
            Command::SetBandwidth(v) => (3, v),
            Command::GetStatus => (4, 0.0),
            Command::Ping => (5, 0.0),
            Command::Stop => (6, 0.0),
        };
        buf[0] = opcode;
        buf[1..9].copy_from_slice(&value.to_le_bytes());
        buf
    }
}

/// Response to a control command: success flag, the actual applied value
/// (device-quantized, not the request), and a short zero-padded message.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub success: bool,
    pub actual: f64,
    pub message: String,
}

impl Response {
    pub fn ok(actual: f64, message: impl Into<String>) -> Self {
        Response {
            success: true,
            actual,
            message: message.into(),
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Response {
            success: false,
            actual: 0.0,
            message: message.into(),
        }
    }

    pub fn encode(&self) -> [u8; RESPONSE_LEN] {
        let mut buf = [0u8; RESPONSE_LEN];
        buf[0] = self.success as u8;
        buf[1..9].copy_from_slice(&self.actual.to_le_bytes());
        let msg_bytes = self.message.as_bytes();
        let n = msg_bytes.len().min(MESSAGE_LEN);
        buf[9..9 + n].copy_from_slice(&msg_bytes[..n]);
        buf
    }

    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() != RESPONSE_LEN {
            return Err(ProtocolError::BadLength(buf.len()));
        }
        let success = buf[0] != 0;
        let actual = f64::from_le_bytes(buf[1..9].try_into().unwrap());
        let end = buf[9..].iter().position(|&b| b == 0).unwrap_or(MESSAGE_LEN);
        let message = String::from_utf8_lossy(&buf[9..9 + end]).into_owned();
        Ok(Response {
            success,
            actual,
            message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_freq_round_trips_through_the_wire() {
        let cmd = Command::SetFreq(100_500_000.0);
        let encoded = cmd.encode();
        assert_eq!(encoded.len(), COMMAND_LEN);
        assert_eq!(Command::decode(&encoded).unwrap(), cmd);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        let mut buf = [0u8; COMMAND_LEN];
        buf[0] = 200;
        assert_eq!(Command::decode(&buf), Err(ProtocolError::UnknownOpcode(200)));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert_eq!(Command::decode(&[0u8; 5]), Err(ProtocolError::BadLength(5)));
    }

    #[test]
    fn response_round_trips_message_and_value() {
        let resp = Response::ok(145_500_000.0, "pong");
        let encoded = resp.encode();
        assert_eq!(encoded.len(), RESPONSE_LEN);
        let back = Response::decode(&encoded).unwrap();
        assert_eq!(back, resp);
    }

    #[test]
    fn response_message_longer_than_field_is_truncated_not_panicking() {
        let resp = Response::ok(1.0, "x".repeat(200));
        let encoded = resp.encode();
        assert_eq!(encoded.len(), RESPONSE_LEN);
    }
}
