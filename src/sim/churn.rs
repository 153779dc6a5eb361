//! Seeded member departures and scheduled rejoins.

use std::collections::BTreeMap;

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::grid::NodeId;

/// Decides which members leave on a tick and when they come back.
#[derive(Debug, Clone)]
pub struct Churn {
    leave_probability: f64,
    rejoin_after: u64,
    rng: StdRng,
    /// Rejoin tick to nodes due then.
    schedule: BTreeMap<u64, Vec<NodeId>>,
}

impl Churn {
    pub fn new(leave_probability: f64, rejoin_after: u64, seed: u64) -> Self {
        Self {
            leave_probability: leave_probability.clamp(0.0, 1.0),
            rejoin_after: rejoin_after.max(1),
            rng: StdRng::seed_from_u64(seed),
            schedule: BTreeMap::new(),
        }
    }

    /// Samples departures among `candidates` and schedules their return.
    pub fn departures(
        &mut self,
        tick: u64,
        candidates: impl IntoIterator<Item = NodeId>,
    ) -> Vec<NodeId> {
        if self.leave_probability <= 0.0 {
            return Vec::new();
        }
        let leaving: Vec<NodeId> = candidates
            .into_iter()
            .filter(|_| self.rng.random::<f64>() < self.leave_probability)
            .collect();
        for &node in &leaving {
            self.schedule_rejoin(tick, node);
        }
        leaving
    }

    /// Schedules `node`, which left at `tick`, to come back later.
    pub fn schedule_rejoin(&mut self, tick: u64, node: NodeId) {
        self.schedule
            .entry(tick + self.rejoin_after)
            .or_default()
            .push(node);
    }

    /// Removes and returns every node due back at or before `tick`.
    pub fn rejoins(&mut self, tick: u64) -> Vec<NodeId> {
        let later = self.schedule.split_off(&(tick + 1));
        let due = std::mem::replace(&mut self.schedule, later);
        due.into_values().flatten().collect()
    }

    /// Nodes currently away.
    pub fn away(&self) -> usize {
        self.schedule.values().map(Vec::len).sum()
    }

    pub fn is_away(&self, node: NodeId) -> bool {
        self.schedule.values().any(|nodes| nodes.contains(&node))
    }
}
