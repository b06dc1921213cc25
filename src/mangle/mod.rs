//! Per-packet mangling decisions.
//!
//! One captured packet in, one verdict out. A packet that cannot be parsed
//! is never dropped: every failure mode degrades to forwarding the bytes
//! untouched.

use tracing::{debug, trace};

use crate::error::PacketError;
use crate::multipath::PortTranslator;
use crate::packet::{
    set_source_port, write_transport_checksum, zero_transport_checksum, Ipv4Packet,
};
use crate::types::MangleStats;

/// Fate of one captured packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MangleOutcome {
    /// Accept the packet as delivered.
    Pass,
    /// Accept the packet with these replacement bytes.
    Rewrite(Vec<u8>),
}

/// The packet-mutation pipeline: parse, translate, rewrite.
pub struct Mangler {
    translator: PortTranslator,
    compute_checksums: bool,
    stats: MangleStats,
}

impl Mangler {
    pub fn new(translator: PortTranslator, compute_checksums: bool) -> Self {
        Self {
            translator,
            compute_checksums,
            stats: MangleStats::default(),
        }
    }

    pub fn stats(&self) -> MangleStats {
        self.stats
    }

    /// Decide the fate of one captured IPv4 packet.
    pub fn mangle(&mut self, payload: &[u8]) -> MangleOutcome {
        self.stats.packets_seen += 1;

        match self.try_rewrite(payload) {
            Ok(Some(bytes)) => {
                self.stats.packets_rewritten += 1;
                MangleOutcome::Rewrite(bytes)
            }
            Ok(None) => {
                self.stats.packets_passed += 1;
                trace!("Source port unchanged, accepting packet");
                MangleOutcome::Pass
            }
            Err(PacketError::UnsupportedProtocol(proto)) => {
                self.stats.packets_passed += 1;
                trace!(proto, "Protocol not mangled, accepting packet");
                MangleOutcome::Pass
            }
            Err(e) => {
                self.stats.packets_passed += 1;
                self.stats.parse_failures += 1;
                debug!(error = %e, "Parse failed, accepting packet unmodified");
                MangleOutcome::Pass
            }
        }
    }

    fn try_rewrite(&mut self, payload: &[u8]) -> Result<Option<Vec<u8>>, PacketError> {
        let packet = Ipv4Packet::parse(payload)?;
        let src_port = packet.source_port()?;

        let new_port = self.translator.translate(src_port, packet.src_addr);
        if new_port == src_port {
            return Ok(None);
        }

        debug!(
            protocol = ?packet.protocol,
            src = %packet.src_addr,
            src_port,
            new_port,
            "Rewriting source port"
        );

        let (header_len, protocol) = (packet.header_len, packet.protocol);
        let (src_addr, dst_addr) = (packet.src_addr, packet.dst_addr);

        let mut bytes = payload.to_vec();
        set_source_port(&mut bytes, header_len, new_port);
        zero_transport_checksum(&mut bytes, header_len, protocol);
        if self.compute_checksums {
            write_transport_checksum(&mut bytes, header_len, protocol, src_addr, dst_addr);
        }

        Ok(Some(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multipath::{PortLayout, TunnelScheduler};
    use crate::types::{FlowId, TunnelId};
    use crate::weights::{Mailbox, WeightSnapshot};
    use std::net::Ipv4Addr;

    const SELF: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);

    fn mangler(compute_checksums: bool) -> Mangler {
        let mut snapshot = WeightSnapshot::zeroed();
        snapshot.set(FlowId(3), TunnelId(0), 1.0);
        snapshot.set(FlowId(3), TunnelId(2), 1.0);
        let mut scheduler = TunnelScheduler::new(Mailbox::new());
        scheduler.adopt(snapshot);
        let translator = PortTranslator::new(PortLayout::new(10000, 20000), SELF, scheduler);
        Mangler::new(translator, compute_checksums)
    }

    // Outbound UDP packet from flow 3's canonical port.
    fn udp_packet(src_port: u16) -> Vec<u8> {
        let mut packet = vec![
            0x45, 0x00, 0x00, 0x21, // Total length 33
            0x00, 0x00, 0x40, 0x00, //
            0x40, 0x11, 0x00, 0x00, // UDP
            10, 0, 0, 1, // src 10.0.0.1
            10, 0, 0, 2, // dst 10.0.0.2
            0, 0, // src port (patched below)
            0x27, 0x13, // dst port 10003
            0x00, 0x0d, // length 13
            0xab, 0xcd, // checksum (stale)
        ];
        packet[20..22].copy_from_slice(&src_port.to_be_bytes());
        packet.extend_from_slice(&[1, 2, 3, 4, 5]);
        packet
    }

    fn source_port_of(bytes: &[u8]) -> u16 {
        u16::from_be_bytes([bytes[20], bytes[21]])
    }

    #[test]
    fn test_outbound_udp_rewritten() {
        let mut mangler = mangler(false);
        let outcome = mangler.mangle(&udp_packet(20003));

        let MangleOutcome::Rewrite(bytes) = outcome else {
            panic!("expected rewrite");
        };
        assert_eq!(source_port_of(&bytes), 20048);
        // Checksum zeroed, destination port untouched
        assert_eq!(&bytes[26..28], &[0, 0]);
        assert_eq!(&bytes[22..24], &[0x27, 0x13]);
        assert_eq!(mangler.stats().packets_rewritten, 1);
    }

    #[test]
    fn test_alternating_tunnels() {
        let mut mangler = mangler(false);
        let mut ports = Vec::new();
        for _ in 0..4 {
            match mangler.mangle(&udp_packet(20003)) {
                MangleOutcome::Rewrite(bytes) => ports.push(source_port_of(&bytes)),
                MangleOutcome::Pass => panic!("expected rewrite"),
            }
        }
        assert_eq!(ports, vec![20048, 20050, 20048, 20050]);
    }

    #[test]
    fn test_checksum_enabled_writes_valid_sum() {
        let mut mangler = mangler(true);
        let MangleOutcome::Rewrite(bytes) = mangler.mangle(&udp_packet(20003)) else {
            panic!("expected rewrite");
        };
        assert_ne!(&bytes[26..28], &[0, 0]);

        // Ones'-complement sum over pseudo-header + segment folds to 0xffff.
        let segment = &bytes[20..];
        let mut sum: u32 = [10u8, 0, 0, 1, 10, 0, 0, 2]
            .chunks(2)
            .map(|c| u32::from(u16::from_be_bytes([c[0], c[1]])))
            .sum();
        sum += 17 + segment.len() as u32;
        for chunk in segment.chunks(2) {
            let word = if chunk.len() == 2 {
                u16::from_be_bytes([chunk[0], chunk[1]])
            } else {
                u16::from_be_bytes([chunk[0], 0])
            };
            sum += u32::from(word);
        }
        while sum >> 16 != 0 {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        assert_eq!(sum, 0xffff);
    }

    #[test]
    fn test_unrelated_port_passes() {
        let mut mangler = mangler(false);
        assert_eq!(mangler.mangle(&udp_packet(12345)), MangleOutcome::Pass);
        assert_eq!(mangler.stats().packets_passed, 1);
    }

    #[test]
    fn test_icmp_passes() {
        let mut mangler = mangler(false);
        let mut bytes = udp_packet(20003);
        bytes[9] = 1; // ICMP
        assert_eq!(mangler.mangle(&bytes), MangleOutcome::Pass);
        assert_eq!(mangler.stats().parse_failures, 0);
    }

    #[test]
    fn test_garbage_passes() {
        let mut mangler = mangler(false);
        assert_eq!(mangler.mangle(&[0x00, 0x01, 0x02]), MangleOutcome::Pass);
        assert_eq!(mangler.stats().parse_failures, 1);
    }

    #[test]
    fn test_truncated_transport_passes() {
        let mut mangler = mangler(false);
        let bytes = udp_packet(20003);
        assert_eq!(mangler.mangle(&bytes[..24]), MangleOutcome::Pass);
        assert_eq!(mangler.stats().parse_failures, 1);
    }
}
