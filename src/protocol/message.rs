//! Protocol message definitions
//!
//! Binary records as they appear on the wire, plus the transport-agnostic
//! [`Assignment`] both encodings decode into.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{message_codes, MAJOR_VERSION, MINOR_VERSION, MSG_TYPE_CALC_MESSAGE, PROTOCOL_UDP};
use crate::arith;

/// Transport a session runs over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Connection-oriented stream
    Tcp,
    /// Connectionless datagrams
    Udp,
}

impl Transport {
    /// Token used in the text handshake lines
    pub fn token(&self) -> &'static str {
        match self {
            Transport::Tcp => "TCP",
            Transport::Udp => "UDP",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Message encoding a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    Text,
    Binary,
}

impl Encoding {
    /// Token used in the text handshake lines
    pub fn token(&self) -> &'static str {
        match self {
            Encoding::Text => "TEXT",
            Encoding::Binary => "BINARY",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Fixed-size control record, used for the datagram greeting and for verdicts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlMessage {
    pub msg_type: u16,
    /// 0 = hello, 1 = OK, 2 = NOT OK
    pub message: u16,
    pub protocol: u16,
    pub major_version: u16,
    pub minor_version: u16,
}

impl ControlMessage {
    /// The greeting a datagram/binary session opens with
    pub fn hello() -> Self {
        Self {
            msg_type: MSG_TYPE_CALC_MESSAGE,
            message: message_codes::HELLO,
            protocol: PROTOCOL_UDP,
            major_version: MAJOR_VERSION,
            minor_version: MINOR_VERSION,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.message == message_codes::OK
    }

    pub fn is_not_ok(&self) -> bool {
        self.message == message_codes::NOT_OK
    }
}

/// Fixed-size assignment record, sent by the server and echoed back with
/// `result` filled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub msg_type: u16,
    pub major_version: u16,
    pub minor_version: u16,
    pub id: u32,
    pub arith: u32,
    pub value1: i32,
    pub value2: i32,
    pub result: i32,
}

impl AssignmentRecord {
    /// The logical assignment carried by this record
    pub fn assignment(&self) -> Assignment {
        Assignment::new(self.arith, self.value1, self.value2)
    }

    /// Copy of this record with the result filled in
    pub fn with_result(self, result: i32) -> Self {
        Self { result, ..self }
    }
}

/// A parsed arithmetic assignment, independent of encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Assignment {
    /// Operation code, see [`crate::arith`]
    pub operation: u32,
    pub value1: i32,
    pub value2: i32,
}

impl Assignment {
    pub fn new(operation: u32, value1: i32, value2: i32) -> Self {
        Self {
            operation,
            value1,
            value2,
        }
    }

    /// Canonical lowercase operation name
    pub fn operation_name(&self) -> &'static str {
        arith::name_from_operation(self.operation)
    }

    /// Compute the answer to this assignment
    pub fn evaluate(&self) -> i32 {
        arith::calculate(self.operation, self.value1, self.value2)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.operation_name(), self.value1, self.value2)
    }
}
