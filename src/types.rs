//! Core types used throughout Razcep.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a logical flow (one remote peer) in the weight tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlowId(pub u16);

impl FlowId {
    pub fn new(n: u16) -> Self {
        Self(n)
    }

    /// Table row for this flow.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "flow{}", self.0)
    }
}

/// Index of a tunnel slot within a flow's pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TunnelId(pub u16);

impl TunnelId {
    pub fn new(n: u16) -> Self {
        Self(n)
    }

    /// Table column for this tunnel.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TunnelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tunnel{}", self.0)
    }
}

/// Which way a captured packet is headed, relative to this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Leaving this host: canonical port expands to a tunnel port.
    Outbound,
    /// Arriving from the network: tunnel port collapses to the canonical port.
    Inbound,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Outbound => write!(f, "outbound"),
            Self::Inbound => write!(f, "inbound"),
        }
    }
}

/// Counters for the packet-mangling path.
#[derive(Debug, Clone, Copy, Default)]
pub struct MangleStats {
    /// Packets delivered by the queue.
    pub packets_seen: u64,
    /// Packets accepted with a rewritten source port.
    pub packets_rewritten: u64,
    /// Packets accepted unmodified.
    pub packets_passed: u64,
    /// Packets passed because a header failed to parse.
    pub parse_failures: u64,
}

impl fmt::Display for MangleStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} rewritten={} passed={} parse_failures={}",
            self.packets_seen, self.packets_rewritten, self.packets_passed, self.parse_failures
        )
    }
}
