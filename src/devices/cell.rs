use crate::grid::{Actionable, Amount, NodeId, PassContext, PowerEventKind, PowerFlow, PowerStorage};

/// An energy cell: the storage members of the simulated grid.
///
/// `EnergyCell` holds up to `capacity` units and moves at most `max_input`
/// in and `max_output` out per call. After every applied exchange it tells
/// the grid which roles it can play again, so a cell dropped from a role
/// because it was rate limited comes back on the next pass.
///
/// An optional breaker makes the cell leave the grid once it is full.
#[derive(Debug, Clone)]
pub struct EnergyCell {
    node: NodeId,
    /// Capacity in grid units.
    pub capacity: Amount,
    stored: Amount,
    /// Direction the cell lets energy flow.
    pub flow: PowerFlow,
    /// Maximum accepted per inject call.
    pub max_input: Amount,
    /// Maximum released per extract call.
    pub max_output: Amount,
    /// Leave the grid when full.
    pub detach_when_full: bool,
    tripped: bool,
}

impl EnergyCell {
    /// Creates a cell without rate limits.
    ///
    /// # Arguments
    ///
    /// * `node` - Node the cell is hosted on
    /// * `capacity` - Capacity in grid units (must be > 0)
    /// * `initial_fill` - Initial fill as a fraction (0.0 to 1.0)
    /// * `flow` - Allowed flow direction
    ///
    /// # Panics
    ///
    /// Panics if capacity is not positive or the fill is out of range.
    pub fn new(node: NodeId, capacity: Amount, initial_fill: f64, flow: PowerFlow) -> Self {
        assert!(capacity > 0.0);
        assert!((0.0..=1.0).contains(&initial_fill));

        Self {
            node,
            capacity,
            stored: capacity * initial_fill,
            flow,
            max_input: Amount::INFINITY,
            max_output: Amount::INFINITY,
            detach_when_full: false,
            tripped: false,
        }
    }

    /// Caps the amount moved per call. Negative limits become 0.
    pub fn with_rate_limits(mut self, max_input: Amount, max_output: Amount) -> Self {
        self.max_input = max_input.max(0.0);
        self.max_output = max_output.max(0.0);
        self
    }

    pub fn with_breaker(mut self, detach_when_full: bool) -> Self {
        self.detach_when_full = detach_when_full;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn stored(&self) -> Amount {
        self.stored
    }

    /// Fill level as a fraction of capacity.
    pub fn fill(&self) -> f64 {
        self.stored / self.capacity
    }

    /// Returns `true` after the breaker has detached the cell.
    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    /// Re-arms the breaker before the cell rejoins.
    pub fn reset_breaker(&mut self) {
        self.tripped = false;
    }

    fn announce(&mut self, ctx: &mut PassContext) {
        if self.stored < self.capacity && self.flow.can_consume() {
            ctx.storage_changed(self.node, PowerEventKind::RequestPower);
        }
        if self.stored > 0.0 && self.flow.can_provide() {
            ctx.storage_changed(self.node, PowerEventKind::ProvidePower);
        }
        if self.detach_when_full && !self.tripped && self.stored >= self.capacity {
            tracing::debug!(node = %self.node, "cell full, breaker open");
            self.tripped = true;
            ctx.leave(self.node);
        }
    }
}

impl PowerStorage for EnergyCell {
    fn current_power(&self) -> Amount {
        self.stored
    }

    fn max_power(&self) -> Amount {
        self.capacity
    }

    fn power_flow(&self) -> PowerFlow {
        self.flow
    }

    fn inject_power(&mut self, amount: Amount, mode: Actionable, ctx: &mut PassContext) -> Amount {
        if !self.flow.can_consume() || amount <= 0.0 {
            return amount.max(0.0);
        }
        let accepted = amount
            .min(self.capacity - self.stored)
            .min(self.max_input)
            .max(0.0);
        if mode == Actionable::Modulate && accepted > 0.0 {
            self.stored = (self.stored + accepted).min(self.capacity);
            self.announce(ctx);
        }
        amount - accepted
    }

    fn extract_power(&mut self, amount: Amount, mode: Actionable, ctx: &mut PassContext) -> Amount {
        if !self.flow.can_provide() || amount <= 0.0 {
            return 0.0;
        }
        let released = amount.min(self.stored).min(self.max_output).max(0.0);
        if mode == Actionable::Modulate && released > 0.0 {
            self.stored = (self.stored - released).max(0.0);
            self.announce(ctx);
        }
        released
    }
}
