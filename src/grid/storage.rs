//! Power storage capability and the context handed to its callbacks.

use std::cell::RefCell;
use std::rc::Rc;

use super::types::{Actionable, Amount, GridNode, NodeId, PowerEventKind, PowerFlow};

/// An external energy store that can take part in distribution.
///
/// The grid only ever talks to a storage through these calls. Reported levels
/// are not trusted: they are clamped before they reach the ledger.
pub trait PowerStorage {
    /// Energy currently held.
    fn current_power(&self) -> Amount;

    /// Capacity.
    fn max_power(&self) -> Amount;

    fn power_flow(&self) -> PowerFlow;

    /// Private storages refuse to be charged or drained by the grid.
    fn is_public(&self) -> bool {
        true
    }

    /// Offers `amount` to the storage and returns what it could not absorb.
    fn inject_power(&mut self, amount: Amount, mode: Actionable, ctx: &mut PassContext) -> Amount;

    /// Requests `amount` from the storage and returns what it released.
    fn extract_power(&mut self, amount: Amount, mode: Actionable, ctx: &mut PassContext)
    -> Amount;
}

/// Shared, non-owning handle to a storage held by its host node.
pub type StorageHandle = Rc<RefCell<dyn PowerStorage>>;

/// A lifecycle request raised from inside a storage callback.
#[derive(Debug, Clone)]
pub enum NodeCommand {
    Join(GridNode),
    Leave(NodeId),
    StorageChanged(NodeId, PowerEventKind),
    IdlePowerChanged(NodeId, Amount),
}

/// Collects the requests a storage makes while the grid is calling it.
///
/// The grid applies them as soon as the callback returns, so membership
/// changes for a role that is being iterated land in the pending buffers.
#[derive(Debug, Default)]
pub struct PassContext {
    commands: Vec<NodeCommand>,
}

impl PassContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&mut self, node: GridNode) {
        self.commands.push(NodeCommand::Join(node));
    }

    pub fn leave(&mut self, node: NodeId) {
        self.commands.push(NodeCommand::Leave(node));
    }

    pub fn storage_changed(&mut self, node: NodeId, kind: PowerEventKind) {
        self.commands.push(NodeCommand::StorageChanged(node, kind));
    }

    pub fn idle_power_changed(&mut self, node: NodeId, draw: Amount) {
        self.commands.push(NodeCommand::IdlePowerChanged(node, draw));
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[NodeCommand] {
        &self.commands
    }

    pub(crate) fn into_commands(self) -> Vec<NodeCommand> {
        self.commands
    }
}

/// Storage levels after clamping into a consistent range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportedLevels {
    pub current: Amount,
    pub max: Amount,
    /// The raw report had to be corrected.
    pub malformed: bool,
}

impl ReportedLevels {
    /// Reads and sanitizes the levels of `storage`.
    pub fn of(storage: &dyn PowerStorage) -> Self {
        Self::from_raw(storage.current_power(), storage.max_power())
    }

    pub fn from_raw(current: Amount, max: Amount) -> Self {
        let clean_max = non_negative(max);
        let clean_current = non_negative(current).min(clean_max);
        Self {
            current: clean_current,
            max: clean_max,
            malformed: clean_max != max || clean_current != current,
        }
    }

    pub fn free(&self) -> Amount {
        self.max - self.current
    }
}

/// Clamps a reported amount to a finite, non-negative value.
pub(crate) fn non_negative(amount: Amount) -> Amount {
    if amount.is_finite() { amount.max(0.0) } else { 0.0 }
}
