//! Translation between canonical and tunnel ports.
//!
//! The source-port space doubles as the tunnel addressing scheme. Each
//! remote peer N owns one canonical port and a block of tunnel ports:
//!
//! ```text
//! send_base + N                      canonical port (what applications use)
//! send_base + N*16 + t               tunnel port t of peer N (on the wire)
//! recv_base + N                      receiver-side port of peer N (never rewritten)
//! ```
//!
//! With `send_base = 10000` and 8 tunnels per flow, peer 1's traffic leaves
//! the application on port 10001 and hits the wire on 10008..=10015; the
//! receiving host collapses any of those back to 10001. Only source ports
//! inside the send range are ever touched.

use std::net::Ipv4Addr;

use tracing::{debug, trace};

use crate::multipath::TunnelScheduler;
use crate::types::{Direction, FlowId, TunnelId};
use crate::{MAX_FLOWS, MAX_TUNNELS_PER_FLOW, SEND_RANGE_WIDTH};

/// The two port ranges the splitter operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortLayout {
    recv_base: u16,
    send_base: u16,
}

impl PortLayout {
    /// Create a layout. Bounds are enforced at configuration validation.
    pub fn new(recv_base: u16, send_base: u16) -> Self {
        Self {
            recv_base,
            send_base,
        }
    }

    pub fn recv_base(&self) -> u16 {
        self.recv_base
    }

    pub fn send_base(&self) -> u16 {
        self.send_base
    }

    /// Whether a port falls inside the managed send range.
    pub fn manages(&self, port: u16) -> bool {
        let port = usize::from(port);
        let base = usize::from(self.send_base);
        port >= base && port < base + SEND_RANGE_WIDTH
    }

    /// Collapse a wire port to its flow's canonical port.
    ///
    /// Pure inverse of [`PortLayout::expand`] for any tunnel index.
    pub fn collapse(&self, port: u16) -> u16 {
        self.send_base + (port - self.send_base) / MAX_TUNNELS_PER_FLOW as u16
    }

    /// The flow whose canonical port this is, if it names a table row.
    pub fn canonical_flow(&self, port: u16) -> Option<FlowId> {
        let offset = port.checked_sub(self.send_base)?;
        (usize::from(offset) < MAX_FLOWS).then_some(FlowId(offset))
    }

    /// Wire port for one tunnel of a flow.
    pub fn expand(&self, flow: FlowId, tunnel: TunnelId) -> u16 {
        self.send_base + flow.0 * MAX_TUNNELS_PER_FLOW as u16 + tunnel.0
    }

    /// Canonical port of a flow.
    pub fn canonical(&self, flow: FlowId) -> u16 {
        self.send_base + flow.0
    }
}

/// Bidirectional source-port translator.
///
/// Outbound packets consult the scheduler to expand the canonical port into
/// a tunnel port; inbound packets collapse statelessly. Destination ports
/// and addresses are never modified.
pub struct PortTranslator {
    layout: PortLayout,
    self_addr: Ipv4Addr,
    scheduler: TunnelScheduler,
}

impl PortTranslator {
    pub fn new(layout: PortLayout, self_addr: Ipv4Addr, scheduler: TunnelScheduler) -> Self {
        Self {
            layout,
            self_addr,
            scheduler,
        }
    }

    pub fn layout(&self) -> &PortLayout {
        &self.layout
    }

    /// Which way a packet is headed, judged solely by its source address.
    ///
    /// The single direction predicate of the whole pipeline; swap this out
    /// to change how direction is detected.
    pub fn direction_of(&self, src_addr: Ipv4Addr) -> Direction {
        if src_addr == self.self_addr {
            Direction::Outbound
        } else {
            Direction::Inbound
        }
    }

    /// Compute the rewritten source port for a packet.
    ///
    /// Returns the port unchanged for anything outside the managed range,
    /// for flows with no usable tunnel, and for outbound ports past the
    /// flow table.
    pub fn translate(&mut self, src_port: u16, src_addr: Ipv4Addr) -> u16 {
        if !self.layout.manages(src_port) {
            return src_port;
        }

        match self.direction_of(src_addr) {
            Direction::Inbound => self.layout.collapse(src_port),
            Direction::Outbound => {
                let Some(flow) = self.layout.canonical_flow(src_port) else {
                    // Outbound port deep in the expanded span names no flow
                    // row; nothing to schedule.
                    trace!(src_port, "Outbound port beyond canonical range");
                    return src_port;
                };
                match self.scheduler.pick(flow) {
                    Some(tunnel) => self.layout.expand(flow, tunnel),
                    None => {
                        debug!(%flow, "All tunnels have zero weight");
                        src_port
                    }
                }
            }
        }
    }
}
