//! Watcher hosts and the level set they stage at join time.

use std::cell::RefCell;
use std::rc::Rc;

use super::types::{Amount, NodeId, PowerSnapshot};

/// A node that wants to hear about the pool crossing energy levels.
pub trait WatcherHost {
    /// Called once when the node joins; the host adds its levels.
    fn update_watcher(&mut self, watcher: &mut EnergyWatcher);

    /// Called when the pool moved across `threshold` during a tick.
    fn on_threshold_pass(&mut self, threshold: Amount, snapshot: &PowerSnapshot);

    /// Called when the node leaves and its thresholds are dropped.
    fn reset_watcher(&mut self) {}
}

pub type WatcherHandle = Rc<RefCell<dyn WatcherHost>>;

/// Levels a watcher host asked to be notified about.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyWatcher {
    node: NodeId,
    levels: Vec<Amount>,
}

impl EnergyWatcher {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            levels: Vec::new(),
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Stages `level`. Returns `false` for NaN or an already staged level.
    pub fn add(&mut self, level: Amount) -> bool {
        if level.is_nan() || self.levels.iter().any(|l| *l == level) {
            return false;
        }
        self.levels.push(level);
        true
    }

    pub fn remove(&mut self, level: Amount) -> bool {
        let before = self.levels.len();
        self.levels.retain(|l| *l != level);
        before != self.levels.len()
    }

    pub fn levels(&self) -> &[Amount] {
        &self.levels
    }

    pub fn clear(&mut self) {
        self.levels.clear();
    }
}
