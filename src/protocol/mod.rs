//! Protocol module - Defines the CalcProtocol wire formats
//!
//! Two encodings are spoken over either transport:
//! - Text: newline-terminated ASCII lines
//! - Binary: fixed-size records, every field big-endian, no padding
//!
//! Control message (10 bytes): type, message, protocol, major, minor (all u16)
//!
//! Assignment record (26 bytes): type, major, minor (u16), id, arith (u32),
//! value1, value2, result (i32)

mod message;
mod codec;

pub use message::*;
pub use codec::*;

/// Protocol major version spoken by this client
pub const MAJOR_VERSION: u16 = 1;

/// Protocol minor version spoken by this client
pub const MINOR_VERSION: u16 = 1;

/// `type` field of every control message
pub const MSG_TYPE_CALC_MESSAGE: u16 = 22;

/// `type` field of every assignment record
pub const MSG_TYPE_CALC_PROTOCOL: u16 = 1;

/// Control message codes carried in the `message` field
pub mod message_codes {
    pub const HELLO: u16 = 0;
    pub const OK: u16 = 1;
    pub const NOT_OK: u16 = 2;
}

/// `protocol` field value identifying the datagram transport (IP protocol 17)
pub const PROTOCOL_UDP: u16 = 17;

/// Encoded size of a [`ControlMessage`]
pub const CONTROL_MESSAGE_SIZE: usize = 10;

/// Encoded size of an [`AssignmentRecord`]
pub const ASSIGNMENT_RECORD_SIZE: usize = 26;

/// Marks the end of the stream greeting block
pub const GREETING_TERMINATOR: &[u8] = b"\n\n";
