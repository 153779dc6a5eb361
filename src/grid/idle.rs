//! Running total of the passive draw of member nodes.

use std::collections::HashMap;

use super::storage::non_negative;
use super::types::{Amount, NodeId};

#[derive(Debug, Clone, Default)]
pub struct IdleDraw {
    per_node: HashMap<NodeId, Amount>,
    total: Amount,
}

impl IdleDraw {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `node` with `draw`. A node already tracked is updated.
    pub fn join(&mut self, node: NodeId, draw: Amount) {
        self.update(node, draw);
    }

    /// Stops tracking `node`; returns the draw it contributed.
    pub fn leave(&mut self, node: NodeId) -> Amount {
        let draw = self.per_node.remove(&node).unwrap_or(0.0);
        self.total -= draw;
        self.settle();
        draw
    }

    /// Replaces the draw of `node` and applies the delta to the total.
    pub fn update(&mut self, node: NodeId, draw: Amount) {
        let draw = non_negative(draw);
        let previous = self.per_node.insert(node, draw).unwrap_or(0.0);
        self.total += draw - previous;
        self.settle();
    }

    pub fn total(&self) -> Amount {
        self.total
    }

    pub fn of(&self, node: NodeId) -> Option<Amount> {
        self.per_node.get(&node).copied()
    }

    pub fn len(&self) -> usize {
        self.per_node.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_node.is_empty()
    }

    // float drift must not leave a phantom draw behind
    fn settle(&mut self) {
        if self.per_node.is_empty() || self.total < 0.0 {
            self.total = if self.per_node.is_empty() {
                0.0
            } else {
                self.per_node.values().sum()
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_leave_and_update() {
        let mut idle = IdleDraw::new();
        idle.join(NodeId(1), 2.5);
        idle.join(NodeId(2), 1.0);
        assert_eq!(idle.total(), 3.5);
        idle.update(NodeId(1), 0.5);
        assert_eq!(idle.total(), 1.5);
        assert_eq!(idle.leave(NodeId(2)), 1.0);
        assert_eq!(idle.total(), 0.5);
        assert_eq!(idle.leave(NodeId(9)), 0.0);
    }

    #[test]
    fn invalid_draws_count_as_zero() {
        let mut idle = IdleDraw::new();
        idle.join(NodeId(1), -4.0);
        idle.join(NodeId(2), f64::INFINITY);
        assert_eq!(idle.total(), 0.0);
        assert_eq!(idle.of(NodeId(1)), Some(0.0));
    }

    #[test]
    fn total_is_exactly_zero_once_empty() {
        let mut idle = IdleDraw::new();
        idle.join(NodeId(1), 0.1);
        idle.join(NodeId(2), 0.2);
        idle.update(NodeId(1), 0.7);
        idle.leave(NodeId(1));
        idle.leave(NodeId(2));
        assert_eq!(idle.total(), 0.0);
        assert!(idle.is_empty());
    }
}
