//! Error types for Razcep.

use std::io;

use thiserror::Error;

/// Result type alias for Razcep operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Razcep.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Weight specification errors
    #[error("weight specification error: {0}")]
    Weights(#[from] WeightError),

    // Packet errors
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    // Queue transport errors
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Weight specification parse errors.
///
/// These are fatal: a controller writing a malformed table is a
/// configuration error the daemon must not paper over.
#[derive(Error, Debug)]
pub enum WeightError {
    #[error("too many lines in weight file: got {got}, table holds {max} flows")]
    TooManyFlows { got: usize, max: usize },

    #[error("too many weights on line {line}: got {got}, flow holds {max} tunnels")]
    TooManyTunnels { line: usize, got: usize, max: usize },
}

/// Packet parsing errors.
///
/// Always recoverable at the queue: the packet is forwarded unmodified.
#[derive(Error, Debug)]
pub enum PacketError {
    #[error("packet truncated: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("not an IPv4 packet (version {0})")]
    NotIpv4(u8),

    #[error("malformed IPv4 header: {0}")]
    MalformedHeader(&'static str),

    #[error("transport protocol {0} is not mangled")]
    UnsupportedProtocol(u8),
}

/// Queue transport errors.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("failed to bind NFQUEUE {queue}: {reason}")]
    BindFailed { queue: u16, reason: String },

    #[error("receive failed: {0}")]
    ReceiveFailed(String),
}

impl Error {
    /// Check whether an error may be survived by forwarding the packet
    /// unmodified and moving on to the next one.
    pub fn is_per_packet(&self) -> bool {
        matches!(self, Error::Packet(_))
    }
}
