//! Port-encoding properties of the bidirectional translator.

use std::net::Ipv4Addr;

use razcep::multipath::{PortLayout, PortTranslator, TunnelScheduler};
use razcep::types::{FlowId, TunnelId};
use razcep::weights::{parse_spec, Mailbox, WeightSnapshot};
use razcep::{MAX_FLOWS, MAX_TUNNELS_PER_FLOW, SEND_RANGE_WIDTH};

const SELF: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const PEER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 9);

fn translator(snapshot: WeightSnapshot) -> PortTranslator {
    let mut scheduler = TunnelScheduler::new(Mailbox::new());
    scheduler.adopt(snapshot);
    PortTranslator::new(PortLayout::new(10000, 20000), SELF, scheduler)
}

#[test]
fn outbound_round_trips_through_inbound() {
    let mut snapshot = WeightSnapshot::zeroed();
    for flow in 0..MAX_FLOWS as u16 {
        for tunnel in 0..MAX_TUNNELS_PER_FLOW as u16 {
            snapshot.set(FlowId(flow), TunnelId(tunnel), 1.0);
        }
    }
    let mut translator = translator(snapshot);

    // Flow 0 is excluded: its canonical port coincides with its tunnel-0
    // wire port, which first_and_last_flow_edges covers.
    for flow in [1u16, 3, 64, 127] {
        let canonical = 20000 + flow;
        for _ in 0..(2 * MAX_TUNNELS_PER_FLOW) {
            let wire = translator.translate(canonical, SELF);
            assert_ne!(wire, canonical, "flow {flow} should be expanded");
            // Feeding the wire port back as inbound recovers the canonical port.
            assert_eq!(translator.translate(wire, PEER), canonical);
        }
    }
}

#[test]
fn ports_outside_managed_range_untouched() {
    let mut translator = translator(WeightSnapshot::zeroed());

    let below = [1u16, 80, 9_999, 19_999];
    let above = [(20_000 + SEND_RANGE_WIDTH) as u16, 63_000, 65_535];
    for port in below.into_iter().chain(above) {
        assert_eq!(translator.translate(port, SELF), port);
        assert_eq!(translator.translate(port, PEER), port);
    }
}

#[test]
fn example_scenario_flow3_tunnels_0_and_2() {
    // Flow 3 weighted "1,0,1": lines 0..2 blank, line 3 carries the row.
    let snapshot = parse_spec("\n\n\n1,0,1\n").unwrap();
    let mut translator = translator(snapshot);

    let mut seen = Vec::new();
    for _ in 0..10 {
        seen.push(translator.translate(20003, SELF));
    }

    // 3 * 16 = 48: tunnels 0 and 2 alternate as ports 20048 and 20050.
    assert_eq!(seen[..4], [20048, 20050, 20048, 20050]);
    assert!(seen.iter().all(|p| *p == 20048 || *p == 20050));
}

#[test]
fn inbound_collapse_ignores_weights() {
    // No weights published at all: inbound must still collapse.
    let mut translator = translator(WeightSnapshot::zeroed());

    for tunnel in 0..MAX_TUNNELS_PER_FLOW as u16 {
        assert_eq!(translator.translate(20048 + tunnel, PEER), 20003);
    }
}

#[test]
fn no_usable_tunnel_degrades_to_no_splitting() {
    let mut translator = translator(WeightSnapshot::zeroed());

    for _ in 0..10 {
        assert_eq!(translator.translate(20003, SELF), 20003);
    }
}

#[test]
fn first_and_last_flow_edges() {
    let mut snapshot = WeightSnapshot::zeroed();
    snapshot.set(FlowId(0), TunnelId(0), 1.0);
    snapshot.set(FlowId((MAX_FLOWS - 1) as u16), TunnelId(15), 1.0);
    let mut translator = translator(snapshot);

    // Flow 0, tunnel 0 happens to map onto its own canonical port; the
    // rewrite is then a no-op by arithmetic, not by a special case.
    assert_eq!(translator.translate(20000, SELF), 20000);

    // Last flow expands to the top of the managed range.
    let last_canonical = 20000 + (MAX_FLOWS - 1) as u16;
    let expanded = translator.translate(last_canonical, SELF);
    assert_eq!(
        expanded,
        20000 + ((MAX_FLOWS - 1) * MAX_TUNNELS_PER_FLOW + 15) as u16
    );
    assert_eq!(translator.translate(expanded, PEER), last_canonical);
}
