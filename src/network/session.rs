//! Negotiation session
//!
//! Runs one CalcProtocol handshake over one channel:
//!
//! ```text
//! TCP: AwaitGreeting -> SendAccept -> AwaitAssignment -> Compute -> SendResult -> AwaitVerdict -> Done
//! UDP: SendHello                   -> AwaitAssignment -> Compute -> SendResult -> AwaitVerdict -> Done
//! ```
//!
//! Any error moves the session to `Failed` (or `Rejected` for an explicit
//! NOT OK). Nothing is retried, and the channel is closed whatever the result.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::fmt;

use super::{Channel, ChannelError, SessionConfig};
use crate::protocol::{
    self, Assignment, AssignmentRecord, CodecError, ControlMessage, Encoding, Transport,
    CONTROL_MESSAGE_SIZE, GREETING_TERMINATOR, MSG_TYPE_CALC_MESSAGE,
};

/// Largest greeting block accepted before giving up on the terminator
const MAX_GREETING_SIZE: usize = 8 * 1024;

/// Handshake states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    AwaitGreeting,
    SendAccept,
    SendHello,
    AwaitAssignment,
    Compute,
    SendResult,
    AwaitVerdict,
    Done,
    Rejected,
    Failed,
}

/// Why a session did not end in `Done`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureCause {
    IoError,
    SizeMismatch,
    ProtocolMismatch,
    FormatError,
    Timeout,
    Rejected,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::IoError => "I/O error",
            Self::SizeMismatch => "wrong size",
            Self::ProtocolMismatch => "protocol mismatch",
            Self::FormatError => "malformed message",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Terminal value of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Server confirmed the result
    Accepted { result: i32 },
    /// Server answered NOT OK
    Rejected { reason: String },
    /// Transport error, malformed input, or timeout
    Failed { cause: FailureCause, reason: String },
}

impl Outcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Failure tag, `None` when accepted
    pub fn cause(&self) -> Option<FailureCause> {
        match self {
            Self::Accepted { .. } => None,
            Self::Rejected { .. } => Some(FailureCause::Rejected),
            Self::Failed { cause, .. } => Some(*cause),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { result } => write!(f, "accepted (result {})", result),
            Self::Rejected { reason } => write!(f, "rejected: {}", reason),
            Self::Failed { cause, reason } => write!(f, "{}: {}", cause, reason),
        }
    }
}

/// What one session did, for display and for the selector
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub transport: Transport,
    pub encoding: Encoding,
    /// Assignment received, if the session got that far
    pub assignment: Option<Assignment>,
    /// Result computed, if the session got that far
    pub result: Option<i32>,
    pub final_state: SessionState,
    pub outcome: Outcome,
}

impl SessionReport {
    /// Report for an attempt whose channel could not be opened
    pub fn unopened(transport: Transport, encoding: Encoding, error: &ChannelError) -> Self {
        Self {
            transport,
            encoding,
            assignment: None,
            result: None,
            final_state: SessionState::Failed,
            outcome: Outcome::Failed {
                cause: Failure::from_channel(error).cause,
                reason: format!("CANT CONNECT: {}", error),
            },
        }
    }
}

#[derive(Debug)]
struct Failure {
    cause: FailureCause,
    reason: String,
}

impl Failure {
    fn new(cause: FailureCause, reason: impl Into<String>) -> Self {
        Self {
            cause,
            reason: reason.into(),
        }
    }

    fn from_channel(error: &ChannelError) -> Self {
        let cause = match error {
            ChannelError::Timeout(_) => FailureCause::Timeout,
            _ => FailureCause::IoError,
        };
        Self::new(cause, error.to_string())
    }
}

impl From<ChannelError> for Failure {
    fn from(error: ChannelError) -> Self {
        Self::from_channel(&error)
    }
}

impl From<CodecError> for Failure {
    fn from(error: CodecError) -> Self {
        let cause = match error {
            CodecError::Size { .. } => FailureCause::SizeMismatch,
            CodecError::ProtocolMismatch(_) => FailureCause::ProtocolMismatch,
            CodecError::Format(_) => FailureCause::FormatError,
        };
        Self::new(cause, error.to_string())
    }
}

/// The assignment as it arrived, kept so the reply echoes the same shape
#[derive(Debug, Clone, Copy)]
enum Received {
    Line(Assignment),
    Record(AssignmentRecord),
}

impl Received {
    fn assignment(&self) -> Assignment {
        match self {
            Self::Line(assignment) => *assignment,
            Self::Record(record) => record.assignment(),
        }
    }
}

/// One handshake over one exclusively owned channel
pub struct Session {
    channel: Box<dyn Channel>,
    transport: Transport,
    config: SessionConfig,
    state: SessionState,
    /// Bytes read past the greeting terminator
    carry: BytesMut,
    received: Option<Received>,
    result: Option<i32>,
}

impl Session {
    pub fn new(channel: Box<dyn Channel>, config: SessionConfig) -> Self {
        let transport = channel.transport();
        let state = match transport {
            Transport::Tcp => SessionState::AwaitGreeting,
            Transport::Udp => SessionState::SendHello,
        };
        Self {
            channel,
            transport,
            config,
            state,
            carry: BytesMut::new(),
            received: None,
            result: None,
        }
    }

    fn encoding(&self) -> Encoding {
        self.config.encoding
    }

    /// Run the handshake to a terminal state and close the channel
    pub async fn run(mut self) -> SessionReport {
        tracing::info!(
            "Starting {} {} session",
            self.encoding(),
            self.transport
        );

        let outcome = match self.drive().await {
            Ok(result) => {
                self.state = SessionState::Done;
                tracing::info!("Server accepted result {}", result);
                Outcome::Accepted { result }
            }
            Err(failure) if failure.cause == FailureCause::Rejected => {
                self.state = SessionState::Rejected;
                tracing::warn!("Server rejected result: {}", failure.reason);
                Outcome::Rejected {
                    reason: failure.reason,
                }
            }
            Err(failure) => {
                tracing::warn!(
                    "{} session failed in {:?}: {}",
                    self.transport,
                    self.state,
                    failure.reason
                );
                self.state = SessionState::Failed;
                Outcome::Failed {
                    cause: failure.cause,
                    reason: failure.reason,
                }
            }
        };

        if let Err(e) = self.channel.close().await {
            tracing::debug!("Error closing {} channel: {}", self.transport, e);
        }

        SessionReport {
            transport: self.transport,
            encoding: self.encoding(),
            assignment: self.received.map(|r| r.assignment()),
            result: self.result,
            final_state: self.state,
            outcome,
        }
    }

    async fn drive(&mut self) -> Result<i32, Failure> {
        loop {
            tracing::debug!("Session state: {:?}", self.state);
            let next = match self.state {
                SessionState::AwaitGreeting => {
                    self.await_greeting().await?;
                    SessionState::SendAccept
                }
                SessionState::SendAccept => {
                    let line = protocol::acceptance_line(self.encoding(), self.transport);
                    self.channel.send(line.as_bytes()).await?;
                    SessionState::AwaitAssignment
                }
                SessionState::SendHello => {
                    self.send_hello().await?;
                    SessionState::AwaitAssignment
                }
                SessionState::AwaitAssignment => {
                    self.received = Some(self.await_assignment().await?);
                    SessionState::Compute
                }
                SessionState::Compute => {
                    let assignment = self.expect_received()?.assignment();
                    let result = assignment.evaluate();
                    tracing::debug!("Calculated the result to {}", result);
                    self.result = Some(result);
                    SessionState::SendResult
                }
                SessionState::SendResult => {
                    self.send_result().await?;
                    SessionState::AwaitVerdict
                }
                SessionState::AwaitVerdict => {
                    self.await_verdict().await?;
                    SessionState::Done
                }
                SessionState::Done => {
                    return self
                        .result
                        .ok_or_else(|| Failure::new(FailureCause::IoError, "no result computed"));
                }
                SessionState::Rejected | SessionState::Failed => {
                    return Err(Failure::new(
                        FailureCause::IoError,
                        "session already finished",
                    ));
                }
            };
            self.state = next;
        }
    }

    fn expect_received(&self) -> Result<Received, Failure> {
        self.received
            .ok_or_else(|| Failure::new(FailureCause::FormatError, "no assignment received"))
    }

    /// Next message; bytes left over from the greeting count as one
    async fn receive(&mut self) -> Result<Bytes, Failure> {
        if !self.carry.is_empty() {
            return Ok(self.carry.split().freeze());
        }
        let timeout = self.config.receive_timeout(self.transport);
        let bytes = self
            .channel
            .receive(self.config.max_message_size, timeout)
            .await?;
        Ok(bytes)
    }

    async fn receive_line(&mut self) -> Result<String, Failure> {
        let bytes = self.receive().await?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| CodecError::Format(String::from_utf8_lossy(&bytes).into_owned()))?;
        Ok(text.strip_suffix('\n').unwrap_or(text).to_string())
    }

    async fn await_greeting(&mut self) -> Result<(), Failure> {
        let timeout = self.config.receive_timeout(self.transport);
        let mut greeting = BytesMut::new();

        let end = loop {
            let chunk = self
                .channel
                .receive(self.config.max_message_size, timeout)
                .await?;
            greeting.extend_from_slice(&chunk);

            if let Some(pos) = greeting
                .windows(GREETING_TERMINATOR.len())
                .position(|w| w == GREETING_TERMINATOR)
            {
                break pos + GREETING_TERMINATOR.len();
            }
            if greeting.len() > MAX_GREETING_SIZE {
                return Err(Failure::new(
                    FailureCause::FormatError,
                    format!("greeting exceeds {} bytes without terminator", MAX_GREETING_SIZE),
                ));
            }
        };

        self.carry = greeting.split_off(end);
        let text = String::from_utf8_lossy(&greeting);
        tracing::debug!("Server greeting: {:?}", text);

        if !protocol::greeting_supports(&text, self.encoding(), self.transport) {
            return Err(Failure::new(
                FailureCause::ProtocolMismatch,
                format!(
                    "MISSMATCH PROTOCOL: server does not offer {}",
                    protocol::capability_line(self.encoding(), self.transport)
                ),
            ));
        }
        Ok(())
    }

    async fn send_hello(&mut self) -> Result<(), Failure> {
        match self.encoding() {
            Encoding::Text => {
                let line = protocol::hello_line(self.encoding(), self.transport);
                self.channel.send(line.as_bytes()).await?;
            }
            Encoding::Binary => {
                let mut buf = BytesMut::new();
                protocol::encode_control_message(&ControlMessage::hello(), &mut buf);
                self.channel.send(&buf).await?;
            }
        }
        Ok(())
    }

    async fn await_assignment(&mut self) -> Result<Received, Failure> {
        let received = match self.encoding() {
            Encoding::Text => {
                let line = self.receive_line().await?;
                Received::Line(protocol::parse_text_assignment(&line)?)
            }
            Encoding::Binary => {
                let bytes = self.receive().await?;
                if self.transport == Transport::Udp && bytes.len() == CONTROL_MESSAGE_SIZE {
                    let msg = protocol::decode_control_message(&bytes)?;
                    if msg.msg_type == MSG_TYPE_CALC_MESSAGE && msg.is_not_ok() {
                        return Err(Failure::new(
                            FailureCause::Rejected,
                            "Server sent NOT OK message",
                        ));
                    }
                }
                let record = protocol::decode_assignment_record(&bytes)?;
                protocol::validate_assignment_record(&record)?;
                Received::Record(record)
            }
        };
        tracing::debug!("ASSIGNMENT: {}", received.assignment());
        Ok(received)
    }

    async fn send_result(&mut self) -> Result<(), Failure> {
        let received = self.expect_received()?;
        let result = self
            .result
            .ok_or_else(|| Failure::new(FailureCause::FormatError, "no result computed"))?;

        match received {
            Received::Line(_) => {
                let line = protocol::format_text_result(result);
                self.channel.send(line.as_bytes()).await?;
            }
            Received::Record(record) => {
                let mut buf = BytesMut::new();
                protocol::encode_assignment_record(&record.with_result(result), &mut buf);
                self.channel.send(&buf).await?;
            }
        }
        Ok(())
    }

    async fn await_verdict(&mut self) -> Result<(), Failure> {
        match self.encoding() {
            Encoding::Text => {
                let line = self.receive_line().await?;
                if protocol::parse_text_verdict(&line) {
                    Ok(())
                } else {
                    Err(Failure::new(FailureCause::Rejected, line.trim()))
                }
            }
            Encoding::Binary => {
                let bytes = self.receive().await?;
                let msg = protocol::decode_control_message(&bytes)?;
                protocol::validate_control_message(&msg)?;
                if msg.is_ok() {
                    Ok(())
                } else if msg.is_not_ok() {
                    Err(Failure::new(FailureCause::Rejected, "Server sent NOT OK message"))
                } else {
                    Err(Failure::new(
                        FailureCause::ProtocolMismatch,
                        format!("Invalid server response: message code {}", msg.message),
                    ))
                }
            }
        }
    }
}
