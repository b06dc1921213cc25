//! Multi-path traffic splitting.
//!
//! The scheduler decides which tunnel slot carries the next outbound
//! packet of a flow; the port translator encodes that decision into the
//! packet's source port and decodes it back out of inbound packets.

mod ports;
mod scheduler;

pub use ports::{PortLayout, PortTranslator};
pub use scheduler::TunnelScheduler;
