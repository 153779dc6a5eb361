//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use energy_grid::grid::{
    Actionable, Amount, EnergyGrid, EnergyWatcher, GridNode, NodeId, PassContext, PowerFlow,
    PowerSnapshot, PowerStorage, WatcherHost,
};

/// Plain storage with an optional per-call input limit.
///
/// `accept_limit` lets a tank report free space it will not actually take.
#[derive(Debug)]
pub struct Tank {
    pub current: Amount,
    pub max: Amount,
    pub flow: PowerFlow,
    pub accept_limit: Amount,
    /// Amounts offered to `inject_power`, in call order.
    pub offers: Vec<Amount>,
}

impl Tank {
    pub fn new(current: Amount, max: Amount, flow: PowerFlow) -> Self {
        Self {
            current,
            max,
            flow,
            accept_limit: Amount::INFINITY,
            offers: Vec::new(),
        }
    }

    pub fn shared(current: Amount, max: Amount, flow: PowerFlow) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(current, max, flow)))
    }
}

impl PowerStorage for Tank {
    fn current_power(&self) -> Amount {
        self.current
    }

    fn max_power(&self) -> Amount {
        self.max
    }

    fn power_flow(&self) -> PowerFlow {
        self.flow
    }

    fn inject_power(&mut self, amount: Amount, mode: Actionable, _: &mut PassContext) -> Amount {
        let accepted = amount.min(self.max - self.current).min(self.accept_limit);
        if mode == Actionable::Modulate {
            self.offers.push(amount);
            self.current += accepted;
        }
        amount - accepted
    }

    fn extract_power(&mut self, amount: Amount, mode: Actionable, _: &mut PassContext) -> Amount {
        let released = amount.min(self.current);
        if mode == Actionable::Modulate {
            self.current -= released;
        }
        released
    }
}

/// Watcher host that records every threshold it is told about.
#[derive(Debug, Default)]
pub struct Gauge {
    pub levels: Vec<Amount>,
    pub passes: Vec<Amount>,
}

impl Gauge {
    pub fn shared(levels: &[Amount]) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            levels: levels.to_vec(),
            passes: Vec::new(),
        }))
    }
}

impl WatcherHost for Gauge {
    fn update_watcher(&mut self, watcher: &mut EnergyWatcher) {
        for &level in &self.levels {
            watcher.add(level);
        }
    }

    fn on_threshold_pass(&mut self, threshold: Amount, _: &PowerSnapshot) {
        self.passes.push(threshold);
    }
}

/// Storage-only node with no idle draw.
pub fn storage_node<S: PowerStorage + 'static>(id: u64, storage: &Rc<RefCell<S>>) -> GridNode {
    GridNode::new(NodeId(id), 0.0).with_storage(storage.clone())
}

/// Joins `node`, failing the test on a lifecycle error.
pub fn join(grid: &mut EnergyGrid, node: GridNode) {
    let id = node.id;
    grid.on_node_joined(node)
        .unwrap_or_else(|e| panic!("{id} should join: {e}"));
}

/// Sum of the stored power of `tanks`.
pub fn physical_total(tanks: &[&Rc<RefCell<Tank>>]) -> Amount {
    tanks.iter().map(|t| t.borrow().current).sum()
}
