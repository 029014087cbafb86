//! CalcClient - CalcProtocol negotiation client
//!
//! Fetches an arithmetic assignment from a CalcProtocol server over TCP or
//! UDP, in text or binary encoding, answers it, and reports the verdict.

pub mod arith;
pub mod config;
pub mod network;
pub mod protocol;
pub mod target;

pub use network::{negotiate, Negotiation, Outcome, SessionConfig, TransportMode};
pub use target::Target;
