//! Protocol codec for encoding/decoding messages
//!
//! All byte-order handling for binary records lives here. Decoders check the
//! buffer length only; header checks are separate so a caller can tell a
//! wrong-sized buffer from a well-formed record for the wrong protocol.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{
    Assignment, AssignmentRecord, ControlMessage, Encoding, Transport, ASSIGNMENT_RECORD_SIZE,
    CONTROL_MESSAGE_SIZE, MAJOR_VERSION, MINOR_VERSION, MSG_TYPE_CALC_MESSAGE,
    MSG_TYPE_CALC_PROTOCOL,
};
use crate::arith;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Wrong size: expected {expected} bytes, got {actual}")]
    Size { expected: usize, actual: usize },

    #[error("Protocol mismatch: {0}")]
    ProtocolMismatch(String),

    #[error("Malformed line: {0:?}")]
    Format(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

fn check_size(bytes: &[u8], expected: usize) -> CodecResult<()> {
    if bytes.len() != expected {
        return Err(CodecError::Size {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn check_version(major: u16, minor: u16) -> CodecResult<()> {
    if major != MAJOR_VERSION || minor != MINOR_VERSION {
        return Err(CodecError::ProtocolMismatch(format!(
            "version {}.{} (expected {}.{})",
            major, minor, MAJOR_VERSION, MINOR_VERSION
        )));
    }
    Ok(())
}

/// Append the wire form of a control message to `buf`
pub fn encode_control_message(msg: &ControlMessage, buf: &mut BytesMut) {
    buf.reserve(CONTROL_MESSAGE_SIZE);
    buf.put_u16(msg.msg_type);
    buf.put_u16(msg.message);
    buf.put_u16(msg.protocol);
    buf.put_u16(msg.major_version);
    buf.put_u16(msg.minor_version);
}

/// Decode a control message; `bytes` must be exactly one record
pub fn decode_control_message(bytes: &[u8]) -> CodecResult<ControlMessage> {
    check_size(bytes, CONTROL_MESSAGE_SIZE)?;
    let mut buf = bytes;
    Ok(ControlMessage {
        msg_type: buf.get_u16(),
        message: buf.get_u16(),
        protocol: buf.get_u16(),
        major_version: buf.get_u16(),
        minor_version: buf.get_u16(),
    })
}

/// Append the wire form of an assignment record to `buf`
pub fn encode_assignment_record(record: &AssignmentRecord, buf: &mut BytesMut) {
    buf.reserve(ASSIGNMENT_RECORD_SIZE);
    buf.put_u16(record.msg_type);
    buf.put_u16(record.major_version);
    buf.put_u16(record.minor_version);
    buf.put_u32(record.id);
    buf.put_u32(record.arith);
    buf.put_i32(record.value1);
    buf.put_i32(record.value2);
    buf.put_i32(record.result);
}

/// Decode an assignment record; `bytes` must be exactly one record
pub fn decode_assignment_record(bytes: &[u8]) -> CodecResult<AssignmentRecord> {
    check_size(bytes, ASSIGNMENT_RECORD_SIZE)?;
    let mut buf = bytes;
    Ok(AssignmentRecord {
        msg_type: buf.get_u16(),
        major_version: buf.get_u16(),
        minor_version: buf.get_u16(),
        id: buf.get_u32(),
        arith: buf.get_u32(),
        value1: buf.get_i32(),
        value2: buf.get_i32(),
        result: buf.get_i32(),
    })
}

/// Reject a control message with the wrong type or version
pub fn validate_control_message(msg: &ControlMessage) -> CodecResult<()> {
    if msg.msg_type != MSG_TYPE_CALC_MESSAGE {
        return Err(CodecError::ProtocolMismatch(format!(
            "control message type {} (expected {})",
            msg.msg_type, MSG_TYPE_CALC_MESSAGE
        )));
    }
    check_version(msg.major_version, msg.minor_version)
}

/// Reject an assignment record with the wrong type or version
pub fn validate_assignment_record(record: &AssignmentRecord) -> CodecResult<()> {
    if record.msg_type != MSG_TYPE_CALC_PROTOCOL {
        return Err(CodecError::ProtocolMismatch(format!(
            "assignment type {} (expected {})",
            record.msg_type, MSG_TYPE_CALC_PROTOCOL
        )));
    }
    check_version(record.major_version, record.minor_version)
}

/// Parse a text assignment of the form `<op> <v1> <v2>`
///
/// The operation name is case-insensitive; an unknown name is not an error
/// here and evaluates to 0 like any unknown operation code.
pub fn parse_text_assignment(line: &str) -> CodecResult<Assignment> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [op, v1, v2] = tokens.as_slice() else {
        return Err(CodecError::Format(line.to_string()));
    };

    let value1 = v1
        .parse::<i32>()
        .map_err(|_| CodecError::Format(line.to_string()))?;
    let value2 = v2
        .parse::<i32>()
        .map_err(|_| CodecError::Format(line.to_string()))?;

    Ok(Assignment::new(arith::operation_from_name(op), value1, value2))
}

/// Text form of a computed result
pub fn format_text_result(result: i32) -> String {
    format!("{}\n", result)
}

/// True iff the server's verdict line is exactly `OK`
pub fn parse_text_verdict(line: &str) -> bool {
    line.trim() == "OK"
}

/// The capability line a server must advertise, e.g. `TEXT TCP 1.1`
pub fn capability_line(encoding: Encoding, transport: Transport) -> String {
    format!(
        "{} {} {}.{}",
        encoding.token(),
        transport.token(),
        MAJOR_VERSION,
        MINOR_VERSION
    )
}

/// Acceptance sent after a matching stream greeting, e.g. `TEXT TCP 1.1 OK\n`
pub fn acceptance_line(encoding: Encoding, transport: Transport) -> String {
    format!("{} OK\n", capability_line(encoding, transport))
}

/// Opening line of a datagram/text session, e.g. `TEXT UDP 1.1\n`
pub fn hello_line(encoding: Encoding, transport: Transport) -> String {
    format!("{}\n", capability_line(encoding, transport))
}

/// Check a stream greeting block for the capability line we speak
pub fn greeting_supports(greeting: &str, encoding: Encoding, transport: Transport) -> bool {
    let wanted = capability_line(encoding, transport);
    greeting.lines().any(|line| line == wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arith::{ARITH_ADD, ARITH_DIV, ARITH_MUL, ARITH_UNKNOWN};

    fn sample_record() -> AssignmentRecord {
        AssignmentRecord {
            msg_type: MSG_TYPE_CALC_PROTOCOL,
            major_version: 1,
            minor_version: 1,
            id: 0xDEADBEEF,
            arith: ARITH_MUL,
            value1: -4,
            value2: 3,
            result: -12,
        }
    }

    #[test]
    fn test_control_message_layout() {
        let mut buf = BytesMut::new();
        encode_control_message(&ControlMessage::hello(), &mut buf);
        assert_eq!(&buf[..], &[0, 22, 0, 0, 0, 17, 0, 1, 0, 1]);

        let decoded = decode_control_message(&buf).unwrap();
        assert_eq!(decoded, ControlMessage::hello());
    }

    #[test]
    fn test_assignment_record_layout() {
        let mut buf = BytesMut::new();
        encode_assignment_record(&sample_record(), &mut buf);
        assert_eq!(buf.len(), ASSIGNMENT_RECORD_SIZE);
        assert_eq!(
            &buf[..],
            &[
                0, 1, 0, 1, 0, 1, // type, major, minor
                0xDE, 0xAD, 0xBE, 0xEF, // id
                0, 0, 0, 3, // arith
                0xFF, 0xFF, 0xFF, 0xFC, // -4
                0, 0, 0, 3, // 3
                0xFF, 0xFF, 0xFF, 0xF4, // -12
            ]
        );

        let decoded = decode_assignment_record(&buf).unwrap();
        assert_eq!(decoded, sample_record());
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        assert_eq!(
            decode_control_message(&[0u8; 9]),
            Err(CodecError::Size { expected: 10, actual: 9 })
        );
        assert_eq!(
            decode_control_message(&[0u8; 26]),
            Err(CodecError::Size { expected: 10, actual: 26 })
        );
        assert_eq!(
            decode_assignment_record(&[0u8; 22]),
            Err(CodecError::Size { expected: 26, actual: 22 })
        );
        assert!(matches!(
            decode_assignment_record(&[]),
            Err(CodecError::Size { .. })
        ));
    }

    #[test]
    fn test_every_other_length_is_a_size_error() {
        for len in 0..=64 {
            let buf = vec![0xFFu8; len];
            if len != CONTROL_MESSAGE_SIZE {
                assert_eq!(
                    decode_control_message(&buf),
                    Err(CodecError::Size { expected: CONTROL_MESSAGE_SIZE, actual: len })
                );
            }
            if len != ASSIGNMENT_RECORD_SIZE {
                assert_eq!(
                    decode_assignment_record(&buf),
                    Err(CodecError::Size { expected: ASSIGNMENT_RECORD_SIZE, actual: len })
                );
            }
        }
    }

    #[test]
    fn test_control_message_extremes_roundtrip() {
        let cases = [
            ControlMessage {
                msg_type: 0,
                message: 0,
                protocol: 0,
                major_version: 0,
                minor_version: 0,
            },
            ControlMessage {
                msg_type: u16::MAX,
                message: u16::MAX,
                protocol: u16::MAX,
                major_version: u16::MAX,
                minor_version: u16::MAX,
            },
            ControlMessage {
                msg_type: 0x8000,
                message: 0x00FF,
                protocol: 0xFF00,
                major_version: 1,
                minor_version: 0x7FFF,
            },
        ];

        for msg in cases {
            let mut buf = BytesMut::new();
            encode_control_message(&msg, &mut buf);
            assert_eq!(buf.len(), CONTROL_MESSAGE_SIZE);
            assert_eq!(decode_control_message(&buf), Ok(msg));
        }
    }

    #[test]
    fn test_assignment_record_extremes_roundtrip() {
        let cases = [
            AssignmentRecord {
                msg_type: u16::MAX,
                major_version: u16::MAX,
                minor_version: u16::MAX,
                id: u32::MAX,
                arith: u32::MAX,
                value1: i32::MIN,
                value2: i32::MAX,
                result: i32::MIN,
            },
            AssignmentRecord {
                msg_type: 0,
                major_version: 0,
                minor_version: 0,
                id: 0,
                arith: ARITH_UNKNOWN,
                value1: i32::MAX,
                value2: i32::MIN,
                result: i32::MAX,
            },
            AssignmentRecord {
                value1: -1,
                value2: 0,
                result: -1,
                ..sample_record()
            },
        ];

        for record in cases {
            let mut buf = BytesMut::new();
            encode_assignment_record(&record, &mut buf);
            assert_eq!(buf.len(), ASSIGNMENT_RECORD_SIZE);
            assert_eq!(decode_assignment_record(&buf), Ok(record));
        }

        let mut buf = BytesMut::new();
        encode_assignment_record(&cases[0], &mut buf);
        assert_eq!(&buf[14..18], &[0x80, 0, 0, 0]);
        assert_eq!(&buf[18..22], &[0x7F, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_header_validation() {
        assert!(validate_assignment_record(&sample_record()).is_ok());

        let wrong_type = AssignmentRecord { msg_type: 22, ..sample_record() };
        assert!(matches!(
            validate_assignment_record(&wrong_type),
            Err(CodecError::ProtocolMismatch(_))
        ));

        let wrong_minor = AssignmentRecord { minor_version: 2, ..sample_record() };
        assert!(matches!(
            validate_assignment_record(&wrong_minor),
            Err(CodecError::ProtocolMismatch(_))
        ));

        assert!(validate_control_message(&ControlMessage::hello()).is_ok());
        let wrong_major = ControlMessage { major_version: 2, ..ControlMessage::hello() };
        assert!(matches!(
            validate_control_message(&wrong_major),
            Err(CodecError::ProtocolMismatch(_))
        ));
    }

    #[test]
    fn test_parse_text_assignment() {
        assert_eq!(
            parse_text_assignment("add 5 3\n").unwrap(),
            Assignment::new(ARITH_ADD, 5, 3)
        );
        assert_eq!(
            parse_text_assignment("  DIV   -10\t0 ").unwrap(),
            Assignment::new(ARITH_DIV, -10, 0)
        );
        assert_eq!(
            parse_text_assignment("pow 2 3").unwrap(),
            Assignment::new(ARITH_UNKNOWN, 2, 3)
        );
    }

    #[test]
    fn test_parse_text_assignment_errors() {
        for line in ["", "add", "add 5", "add 5 3 1", "add five 3", "add 5 99999999999"] {
            assert!(
                matches!(parse_text_assignment(line), Err(CodecError::Format(_))),
                "expected format error for {:?}",
                line
            );
        }
    }

    #[test]
    fn test_parse_text_verdict() {
        assert!(parse_text_verdict("OK\n"));
        assert!(parse_text_verdict("OK"));
        assert!(!parse_text_verdict("ok\n"));
        assert!(!parse_text_verdict("ERROR\n"));
        assert!(!parse_text_verdict(""));
    }

    #[test]
    fn test_handshake_lines() {
        assert_eq!(acceptance_line(Encoding::Text, Transport::Tcp), "TEXT TCP 1.1 OK\n");
        assert_eq!(acceptance_line(Encoding::Binary, Transport::Tcp), "BINARY TCP 1.1 OK\n");
        assert_eq!(hello_line(Encoding::Text, Transport::Udp), "TEXT UDP 1.1\n");
        assert_eq!(format_text_result(-12), "-12\n");
    }

    #[test]
    fn test_greeting_supports() {
        let greeting = "TEXT TCP 1.0\nTEXT TCP 1.1\nBINARY TCP 1.1\n\n";
        assert!(greeting_supports(greeting, Encoding::Text, Transport::Tcp));
        assert!(greeting_supports(greeting, Encoding::Binary, Transport::Tcp));
        assert!(!greeting_supports("TEXT TCP 1.0\n\n", Encoding::Text, Transport::Tcp));
        assert!(!greeting_supports("TEXT TCP 1.1 EXTRA\n\n", Encoding::Text, Transport::Tcp));
    }
}
