//! Energy grid core.
//!
//! An [`EnergyGrid`] keeps one aggregate pool over every public storage of
//! its member nodes. Energy is accounted for in the [`ledger`] first and
//! written through to the storages lazily, once per tick or whenever the pool
//! hits empty or full.

mod distribution;
pub mod energy;
pub mod idle;
pub mod ledger;
pub mod registry;
pub mod status;
pub mod storage;
pub mod threshold;
pub mod types;
pub mod watcher;

pub use distribution::REMAINDER_EPSILON;
pub use energy::{Diagnostics, EnergyGrid, GridSettings, TickOutcome};
pub use registry::{Membership, Participant, Registry, Visit};
pub use status::{PowerState, PowerStatus};
pub use storage::{NodeCommand, PassContext, PowerStorage, ReportedLevels, StorageHandle};
pub use threshold::{EnergyThreshold, ThresholdIndex, ThresholdKey};
pub use types::{
    Actionable, Amount, Capability, Delivery, EventBus, EventLog, GridEvent, GridNode,
    NodeCapabilities, NodeId, PowerEventKind, PowerFlow, PowerMultiplier, PowerSnapshot, Role,
};
pub use watcher::{EnergyWatcher, WatcherHandle, WatcherHost};
