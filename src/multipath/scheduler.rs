//! Weighted fair-interleaving tunnel scheduler.
//!
//! Each flow carries a debt counter per tunnel. Selection takes the
//! lowest-debt tunnel among those with positive weight, then taxes it by
//! the inverse of its weight, so a tunnel with twice the weight becomes
//! eligible again twice as fast. Over many selections each tunnel's share
//! converges to `w_i / Σw`.

use tracing::debug;

use crate::types::{FlowId, TunnelId};
use crate::weights::{Mailbox, WeightSnapshot};
use crate::{MAX_FLOWS, MAX_TUNNELS_PER_FLOW};

/// Per-flow weighted tunnel selector.
///
/// The packet path is the sole owner: selection mutates debts in place and
/// adopts pending weight snapshots from the mailbox at the top of every
/// call, so the ingestion task never touches the live tables.
pub struct TunnelScheduler {
    weights: WeightSnapshot,
    debts: Vec<[f64; MAX_TUNNELS_PER_FLOW]>,
    mailbox: Mailbox,
}

impl TunnelScheduler {
    /// Create a scheduler with an all-zero table (no usable tunnels) that
    /// adopts snapshots from `mailbox`.
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            weights: WeightSnapshot::zeroed(),
            debts: vec![[0.0; MAX_TUNNELS_PER_FLOW]; MAX_FLOWS],
            mailbox,
        }
    }

    /// Replace the weight table wholesale and reset every debt.
    ///
    /// Old debts are meaningless under new weights; each adopted snapshot
    /// starts the proportional share fresh.
    pub fn adopt(&mut self, snapshot: WeightSnapshot) {
        self.weights = snapshot;
        for row in &mut self.debts {
            *row = [0.0; MAX_TUNNELS_PER_FLOW];
        }
        debug!("Adopted weight snapshot, debts reset");
    }

    /// Pick the tunnel to carry the next packet of `flow`.
    ///
    /// Returns `None` when every tunnel of the flow has zero weight; the
    /// caller degrades to "no splitting" by leaving the port alone.
    pub fn pick(&mut self, flow: FlowId) -> Option<TunnelId> {
        if let Some(snapshot) = self.mailbox.take() {
            self.adopt(snapshot);
        }

        let weights = *self.weights.row(flow);
        let debts = &mut self.debts[flow.index()];

        let mut chosen = None;
        let mut min_debt = f64::INFINITY;
        for (t, debt) in debts.iter().enumerate() {
            if weights[t] > 0.0 && *debt < min_debt {
                chosen = Some(t);
                min_debt = *debt;
            }
        }
        let t = chosen?;

        // Rebase on the winner's debt so magnitudes stay bounded over long
        // runs while relative order is preserved.
        for debt in debts.iter_mut() {
            *debt -= min_debt;
        }
        debts[t] += 1.0 / weights[t];

        Some(TunnelId(t as u16))
    }

    /// The currently active weights.
    pub fn weights(&self) -> &WeightSnapshot {
        &self.weights
    }
}
