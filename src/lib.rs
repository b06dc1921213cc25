//! # Razcep
//!
//! In-path weighted tunnel splitter.
//!
//! Razcep sits on an NFQUEUE hook and turns a single logical flow endpoint
//! (one source port per remote peer) into a pool of underlying tunnel ports,
//! spreading outbound traffic across the pool according to live weights
//! written by an external controller. Applications on both ends keep talking
//! to one canonical port; the network in between sees per-tunnel ports.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Weight file (controller)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │          Weight watcher (poll / parse / consume)            │
//! ├─────────────────────────────────────────────────────────────┤
//! │        Snapshot mailbox (all-or-nothing hand-off)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Tunnel scheduler (weighted fair interleave over debts)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │    Port translator (canonical / per-tunnel encoding)        │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Packet mangler (IPv4/TCP/UDP source-port rewrite + csum)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │              NFQUEUE (recv / verdict transport)             │
//! └─────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::cast_possible_truncation)] // Port arithmetic is range-checked
#![allow(clippy::cast_precision_loss)]      // Acceptable for weight math
#![allow(clippy::doc_markdown)]             // ASCII diagrams in docs

pub mod cli;
pub mod config;
pub mod error;
pub mod mangle;
pub mod multipath;
pub mod packet;
pub mod queue;
pub mod types;
pub mod weights;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of flow slots (one per remote peer) in the weight tables.
pub const MAX_FLOWS: usize = 128;

/// Number of tunnel slots per flow in the weight tables.
pub const MAX_TUNNELS_PER_FLOW: usize = 16;

/// Width of the managed send-port range.
pub const SEND_RANGE_WIDTH: usize = MAX_FLOWS * MAX_TUNNELS_PER_FLOW;
