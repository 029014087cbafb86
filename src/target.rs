//! Target address parsing
//!
//! A target looks like `PROTOCOL://host:port/api`, where PROTOCOL is one of
//! `tcp`, `udp` or `any` and api is `text` or `binary`, both case-insensitive.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::network::TransportMode;
use crate::protocol::Encoding;

/// Target parse errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("Missing \"://\" separator")]
    MissingScheme,

    #[error("Unknown protocol: {0} (expected tcp, udp or any)")]
    UnknownProtocol(String),

    #[error("Unknown api: {0} (expected text or binary)")]
    UnknownApi(String),

    #[error("Missing host")]
    MissingHost,

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Expected host:port/api, got {0:?}")]
    Malformed(String),
}

/// Where and how to negotiate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub mode: TransportMode,
    pub host: String,
    pub port: u16,
    pub encoding: Encoding,
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = s.split_once("://").ok_or(TargetError::MissingScheme)?;

        let mode = match scheme.to_ascii_lowercase().as_str() {
            "tcp" => TransportMode::Tcp,
            "udp" => TransportMode::Udp,
            "any" => TransportMode::Any,
            _ => return Err(TargetError::UnknownProtocol(scheme.to_string())),
        };

        let (authority, api) = rest
            .split_once('/')
            .ok_or_else(|| TargetError::Malformed(rest.to_string()))?;

        let encoding = match api.to_ascii_lowercase().as_str() {
            "text" => Encoding::Text,
            "binary" => Encoding::Binary,
            _ => return Err(TargetError::UnknownApi(api.to_string())),
        };

        let (host, port) = authority
            .split_once(':')
            .ok_or_else(|| TargetError::Malformed(rest.to_string()))?;

        if host.is_empty() {
            return Err(TargetError::MissingHost);
        }

        if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TargetError::InvalidPort(port.to_string()));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| TargetError::InvalidPort(port.to_string()))?;

        Ok(Self {
            mode,
            host: host.to_string(),
            port,
            encoding,
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Protocol: {}, Host {}, port {} and path {}.",
            self.mode,
            self.host,
            self.port,
            self.encoding.token().to_ascii_lowercase()
        )
    }
}
