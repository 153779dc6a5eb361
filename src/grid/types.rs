//! Common types shared by the grid components.

use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use super::storage::StorageHandle;
use super::watcher::WatcherHandle;

/// Quantity of energy, in grid units.
pub type Amount = f64;

/// Whether a level-changing call is a dry run or applies its effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Actionable {
    /// Compute the result without mutating anything.
    Simulate,
    /// Apply the mutation.
    Modulate,
}

/// Direction in which a storage lets energy flow.
///
/// Named from the storage's point of view: a `Read` storage can only be read
/// from (it provides), a `Write` storage can only be written to (it consumes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerFlow {
    /// Bidirectional.
    #[default]
    ReadWrite,
    /// Provide-only.
    Read,
    /// Consume-only.
    Write,
    /// Withdrawn from both roles.
    NoAccess,
}

impl PowerFlow {
    /// Returns `true` if the storage may act as a provider.
    pub fn can_provide(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Read)
    }

    /// Returns `true` if the storage may act as a consumer.
    pub fn can_consume(self) -> bool {
        matches!(self, Self::ReadWrite | Self::Write)
    }
}

/// Conversion factor between caller units and grid units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerMultiplier {
    factor: f64,
}

impl PowerMultiplier {
    /// Identity conversion.
    pub const ONE: Self = Self { factor: 1.0 };

    /// Creates a multiplier. Non-positive or non-finite factors fall back to 1.
    pub fn new(factor: f64) -> Self {
        if factor.is_finite() && factor > 0.0 {
            Self { factor }
        } else {
            Self::ONE
        }
    }

    /// Caller units to grid units.
    pub fn multiply(self, amount: Amount) -> Amount {
        amount * self.factor
    }

    /// Grid units to caller units.
    pub fn divide(self, amount: Amount) -> Amount {
        amount / self.factor
    }

    pub fn factor(self) -> f64 {
        self.factor
    }
}

/// Identifier of a grid member node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Registry role of a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Releases stored energy into the pool.
    Provider,
    /// Absorbs energy from the pool.
    Consumer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provider => f.write_str("provider"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Capabilities a node may offer when it joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    PowerStorage,
    WatcherHost,
}

/// Storage re-announcement raised by a participant whose level changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PowerEventKind {
    /// The storage holds energy again and can provide.
    ProvidePower,
    /// The storage has free space again and can consume.
    RequestPower,
}

/// Capability set of a joining node.
#[derive(Clone, Default)]
pub struct NodeCapabilities {
    pub storage: Option<StorageHandle>,
    pub watcher: Option<WatcherHandle>,
}

impl NodeCapabilities {
    /// A node with neither storage nor watcher role.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_storage(mut self, storage: StorageHandle) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_watcher(mut self, watcher: WatcherHandle) -> Self {
        self.watcher = Some(watcher);
        self
    }

    /// Returns `true` if the node offers `capability`.
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::PowerStorage => self.storage.is_some(),
            Capability::WatcherHost => self.watcher.is_some(),
        }
    }
}

impl fmt::Debug for NodeCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeCapabilities")
            .field("storage", &self.storage.is_some())
            .field("watcher", &self.watcher.is_some())
            .finish()
    }
}

/// A node joining the grid.
#[derive(Debug, Clone)]
pub struct GridNode {
    pub id: NodeId,
    /// Passive consumption per tick.
    pub idle_power_usage: Amount,
    pub capabilities: NodeCapabilities,
}

impl GridNode {
    /// Creates a node with no capabilities.
    pub fn new(id: NodeId, idle_power_usage: Amount) -> Self {
        Self {
            id,
            idle_power_usage,
            capabilities: NodeCapabilities::none(),
        }
    }

    pub fn with_storage(mut self, storage: StorageHandle) -> Self {
        self.capabilities = self.capabilities.with_storage(storage);
        self
    }

    pub fn with_watcher(mut self, watcher: WatcherHandle) -> Self {
        self.capabilities = self.capabilities.with_watcher(watcher);
        self
    }
}

/// Events the grid publishes to the outside world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridEvent {
    /// The debounced network-powered flag changed.
    PowerStatusChanged { powered: bool },
}

/// Event dispatch capability provided by the host network.
pub trait EventBus {
    /// Delivers `event` to every node of the network.
    fn broadcast(&mut self, event: GridEvent);

    /// Delivers `event` to a single node.
    fn post_to(&mut self, node: NodeId, event: GridEvent);
}

/// One event handed to an [`EventLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    /// `None` for broadcasts.
    pub target: Option<NodeId>,
    pub event: GridEvent,
}

/// Event bus that records every delivery in order.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub deliveries: Vec<Delivery>,
}

impl EventLog {
    /// Broadcast deliveries only.
    pub fn broadcasts(&self) -> impl Iterator<Item = &GridEvent> + '_ {
        self.deliveries
            .iter()
            .filter(|d| d.target.is_none())
            .map(|d| &d.event)
    }
}

impl EventBus for EventLog {
    fn broadcast(&mut self, event: GridEvent) {
        self.deliveries.push(Delivery {
            target: None,
            event,
        });
    }

    fn post_to(&mut self, node: NodeId, event: GridEvent) {
        self.deliveries.push(Delivery {
            target: Some(node),
            event,
        });
    }
}

impl<B: EventBus + ?Sized> EventBus for Rc<std::cell::RefCell<B>> {
    fn broadcast(&mut self, event: GridEvent) {
        self.borrow_mut().broadcast(event);
    }

    fn post_to(&mut self, node: NodeId, event: GridEvent) {
        self.borrow_mut().post_to(node, event);
    }
}

/// Read-only view of the pool handed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PowerSnapshot {
    pub tick: u64,
    pub stored: Amount,
    pub max: Amount,
    pub demand: Amount,
    pub avg_usage: Amount,
    pub avg_injection: Amount,
    pub idle_usage: Amount,
    pub powered: bool,
}
