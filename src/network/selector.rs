//! Transport selection
//!
//! `Tcp` and `Udp` modes run a single session. `Any` runs a complete UDP
//! session first and, only if that does not end in `Accepted`, a complete
//! TCP session on a fresh channel. Nothing carries over between the two.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ChannelFactory, Outcome, Session, SessionConfig, SessionReport};
use crate::protocol::Transport;

/// Which transport(s) the caller asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    Tcp,
    Udp,
    /// UDP first, TCP if UDP does not succeed
    Any,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Any => "any",
        };
        f.write_str(s)
    }
}

/// Result of a full negotiation
#[derive(Debug, Clone, Serialize)]
pub struct Negotiation {
    pub mode: TransportMode,
    /// Outcome of the last attempt
    pub outcome: Outcome,
    /// Transport that produced `Accepted`, if any
    pub transport: Option<Transport>,
    /// Every session that was attempted, in order
    pub attempts: Vec<SessionReport>,
}

impl Negotiation {
    fn from_attempts(mode: TransportMode, attempts: Vec<SessionReport>) -> Self {
        let (outcome, transport) = match attempts.last() {
            Some(last) => {
                let transport = last.outcome.is_accepted().then_some(last.transport);
                (last.outcome.clone(), transport)
            }
            None => (
                Outcome::Failed {
                    cause: super::FailureCause::IoError,
                    reason: "no session attempted".to_string(),
                },
                None,
            ),
        };
        Self {
            mode,
            outcome,
            transport,
            attempts,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.outcome.is_accepted()
    }
}

/// Open a channel over `transport` and run one session on it
pub async fn attempt(
    transport: Transport,
    factory: &dyn ChannelFactory,
    config: &SessionConfig,
) -> SessionReport {
    match factory.open(transport).await {
        Ok(channel) => Session::new(channel, config.clone()).run().await,
        Err(e) => {
            tracing::warn!("Could not open {} channel: {}", transport, e);
            SessionReport::unopened(transport, config.encoding, &e)
        }
    }
}

/// Negotiate one assignment according to `mode`
pub async fn negotiate(
    mode: TransportMode,
    factory: &dyn ChannelFactory,
    config: &SessionConfig,
) -> Negotiation {
    let attempts = match mode {
        TransportMode::Tcp => vec![attempt(Transport::Tcp, factory, config).await],
        TransportMode::Udp => vec![attempt(Transport::Udp, factory, config).await],
        TransportMode::Any => {
            let udp = attempt(Transport::Udp, factory, config).await;
            if udp.outcome.is_accepted() {
                vec![udp]
            } else {
                tracing::info!("UDP attempt ended with {}; falling back to TCP", udp.outcome);
                let tcp = attempt(Transport::Tcp, factory, config).await;
                vec![udp, tcp]
            }
        }
    };

    let negotiation = Negotiation::from_attempts(mode, attempts);
    if let Some(transport) = negotiation.transport {
        tracing::info!("Negotiation succeeded over {}", transport);
    }
    negotiation
}
