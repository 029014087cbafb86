//! Network module - Drives CalcProtocol handshakes over TCP or UDP
//!
//! Provides:
//! - Channels: byte-level send/receive over a stream or datagram socket
//! - Session: one complete handshake over one channel
//! - Selector: picks the transport and runs the UDP-then-TCP fallback

mod channel;
mod selector;
mod session;

#[cfg(test)]
mod mock;

pub use channel::*;
pub use selector::*;
pub use session::*;

use std::net::SocketAddr;
use std::time::Duration;

use crate::protocol::{Encoding, Transport};

/// Default receive timeout on datagram channels
pub const DEFAULT_DATAGRAM_TIMEOUT: Duration = Duration::from_secs(2);

/// Default per-receive buffer ceiling
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 1024;

/// Configuration shared by every session of one negotiation
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Encoding spoken on the channel
    pub encoding: Encoding,
    /// Receive timeout applied to every wait on a datagram channel
    pub datagram_timeout: Duration,
    /// Largest message accepted in a single receive
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encoding: Encoding::Text,
            datagram_timeout: DEFAULT_DATAGRAM_TIMEOUT,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl SessionConfig {
    pub fn new(encoding: Encoding) -> Self {
        Self {
            encoding,
            ..Default::default()
        }
    }

    pub fn with_datagram_timeout(mut self, timeout: Duration) -> Self {
        self.datagram_timeout = timeout;
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Receive timeout for a given transport; streams wait indefinitely
    pub fn receive_timeout(&self, transport: Transport) -> Option<Duration> {
        match transport {
            Transport::Tcp => None,
            Transport::Udp => Some(self.datagram_timeout),
        }
    }
}

/// Resolve a hostname to a socket address, preferring IPv4 when `prefer_v4`
pub async fn resolve_host(host: &str, port: u16, prefer_v4: bool) -> std::io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addrs: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();

    let chosen = if prefer_v4 {
        addrs
            .iter()
            .find(|addr| addr.is_ipv4())
            .or_else(|| addrs.first())
    } else {
        addrs.first()
    };

    chosen.copied().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
