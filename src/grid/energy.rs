//! The energy grid: one bounded pool shared by every member node.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{GridError, Result};

use super::idle::IdleDraw;
use super::ledger::{DEFAULT_AVERAGE_WINDOW, Ledger, Settlement};
use super::registry::{Participant, Registry};
use super::status::{DEFAULT_DWELL_TICKS, PowerStatus};
use super::storage::{NodeCommand, ReportedLevels, StorageHandle};
use super::threshold::{EnergyThreshold, ThresholdIndex, ThresholdKey};
use super::types::{
    Actionable, Amount, EventBus, EventLog, GridEvent, GridNode, NodeId, PowerEventKind,
    PowerMultiplier, PowerSnapshot, Role,
};
use super::watcher::{EnergyWatcher, WatcherHandle};

/// Tunables of a grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSettings {
    /// Moving-average window, in ticks.
    pub average_window: f64,
    /// Consecutive powered ticks to exceed before power is published.
    pub dwell_ticks: u32,
    /// Dry-run extraction used as the probe when nothing draws idle power.
    pub probe_amount: Amount,
    /// Idle draw at or below this counts as no draw.
    pub idle_epsilon: Amount,
    /// Shortfall tolerated when paying the idle draw.
    pub drain_tolerance: Amount,
    /// Conversion applied to the idle-draw probe.
    pub power_multiplier: PowerMultiplier,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            average_window: DEFAULT_AVERAGE_WINDOW,
            dwell_ticks: DEFAULT_DWELL_TICKS,
            probe_amount: 0.1,
            idle_epsilon: 0.0001,
            drain_tolerance: 0.001,
            power_multiplier: PowerMultiplier::ONE,
        }
    }
}

/// Counters for the non-fatal conditions the grid absorbs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    /// Passes that ended with energy left over.
    pub accounting_anomalies: u64,
    /// Sum of those leftovers.
    pub unresolved_energy: Amount,
    /// Storage reports that had to be clamped.
    pub malformed_reports: u64,
    /// Non-public storages refused at join.
    pub rejected_storages: u64,
    /// Passes refused because one was already running for the role.
    pub rejected_passes: u64,
    /// Requests from storage callbacks that failed.
    pub rejected_requests: u64,
}

/// What happened during one [`EnergyGrid::on_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickOutcome {
    pub tick: u64,
    pub stored: Amount,
    pub max: Amount,
    /// Thresholds delivered this tick.
    pub notified: usize,
    /// Probe result before hysteresis.
    pub raw_powered: bool,
    /// Published flag after hysteresis.
    pub powered: bool,
    pub capped: bool,
    pub status_changed: bool,
}

#[derive(Clone)]
pub(super) struct MemberStorage {
    pub(super) handle: StorageHandle,
    /// Counted into capacity at join.
    pub(super) provides: bool,
    pub(super) recorded_max: Amount,
}

#[derive(Clone, Default)]
pub(super) struct Member {
    pub(super) storage: Option<MemberStorage>,
    pub(super) watcher: Option<WatcherHandle>,
}

/// Everything except the registry, so a pass can borrow both at once.
pub(super) struct GridState<B> {
    pub(super) settings: GridSettings,
    pub(super) ledger: Ledger,
    pub(super) status: PowerStatus,
    pub(super) idle: IdleDraw,
    pub(super) thresholds: ThresholdIndex<NodeId>,
    pub(super) members: BTreeMap<NodeId, Member>,
    pub(super) diagnostics: Diagnostics,
    pub(super) bus: B,
    pub(super) tick: u64,
    pub(super) last_stored: Amount,
}

fn tiebreak(node: NodeId) -> i64 {
    i64::try_from(node.0).unwrap_or(i64::MAX)
}

impl<B: EventBus> GridState<B> {
    fn new(settings: GridSettings, bus: B) -> Self {
        Self {
            settings,
            ledger: Ledger::new(settings.average_window),
            status: PowerStatus::new(settings.dwell_ticks),
            idle: IdleDraw::new(),
            thresholds: ThresholdIndex::new(),
            members: BTreeMap::new(),
            diagnostics: Diagnostics::default(),
            bus,
            tick: 0,
            last_stored: 0.0,
        }
    }

    fn levels(&mut self, node: NodeId, handle: &StorageHandle) -> Option<(ReportedLevels, bool)> {
        let Ok(storage) = handle.try_borrow() else {
            tracing::warn!(%node, "storage is busy");
            return None;
        };
        let levels = ReportedLevels::of(&*storage);
        if levels.malformed {
            tracing::debug!(
                %node,
                current = storage.current_power(),
                max = storage.max_power(),
                "malformed storage report clamped"
            );
            self.diagnostics.malformed_reports += 1;
        }
        Some((levels, storage.is_public()))
    }

    pub(super) fn join(&mut self, registry: &mut Registry, node: GridNode) -> Result<()> {
        if self.members.contains_key(&node.id) {
            return Err(GridError::NodeAlreadyJoined(node.id));
        }
        let id = node.id;
        self.idle.join(id, node.idle_power_usage);

        let mut member = Member::default();
        if let Some(handle) = node.capabilities.storage {
            member.storage = self.join_storage(registry, id, handle);
        }
        if let Some(handle) = node.capabilities.watcher {
            self.join_watcher(id, &handle);
            member.watcher = Some(handle);
        }
        self.members.insert(id, member);

        tracing::debug!(node = %id, idle = node.idle_power_usage, "node joined");
        let powered = self.status.is_powered();
        self.bus
            .post_to(id, GridEvent::PowerStatusChanged { powered });
        Ok(())
    }

    fn join_storage(
        &mut self,
        registry: &mut Registry,
        id: NodeId,
        handle: StorageHandle,
    ) -> Option<MemberStorage> {
        let (levels, public) = self.levels(id, &handle)?;
        if !public {
            tracing::warn!(node = %id, "refusing non-public storage");
            self.diagnostics.rejected_storages += 1;
            return None;
        }
        let flow = handle.try_borrow().map(|s| s.power_flow()).ok()?;

        let provides = flow.can_provide();
        if provides {
            self.ledger.add_provider(levels.max, levels.current);
            if levels.current > 0.0 {
                registry.add(Role::Provider, Participant::new(id, handle.clone()));
            }
        } else {
            self.ledger.membership_changed();
        }
        if levels.current < levels.max && flow.can_consume() {
            registry.add(Role::Consumer, Participant::new(id, handle.clone()));
        }
        Some(MemberStorage {
            handle,
            provides,
            recorded_max: levels.max,
        })
    }

    fn join_watcher(&mut self, id: NodeId, handle: &WatcherHandle) {
        let mut watcher = EnergyWatcher::new(id);
        match handle.try_borrow_mut() {
            Ok(mut host) => host.update_watcher(&mut watcher),
            Err(_) => {
                tracing::warn!(node = %id, "watcher host is busy");
                return;
            }
        }
        for &level in watcher.levels() {
            if let Some(threshold) = EnergyThreshold::new(level, tiebreak(id), id) {
                self.thresholds.register(threshold);
            }
        }
    }

    pub(super) fn leave(&mut self, registry: &mut Registry, node: NodeId) -> Result<()> {
        let member = self
            .members
            .remove(&node)
            .ok_or(GridError::UnknownNode(node))?;
        self.idle.leave(node);

        if let Some(storage) = member.storage {
            registry.remove(Role::Provider, node);
            registry.remove(Role::Consumer, node);
            if storage.provides {
                let current = self
                    .levels(node, &storage.handle)
                    .map_or(0.0, |(levels, _)| levels.current.min(storage.recorded_max));
                self.ledger.remove_provider(storage.recorded_max, current);
            } else {
                self.ledger.membership_changed();
            }
        }
        if let Some(handle) = member.watcher {
            self.thresholds.retain_observers(|owner| *owner != node);
            if let Ok(mut host) = handle.try_borrow_mut() {
                host.reset_watcher();
            }
        }
        tracing::debug!(%node, "node left");
        Ok(())
    }

    pub(super) fn storage_changed(
        &mut self,
        registry: &mut Registry,
        node: NodeId,
        kind: PowerEventKind,
    ) -> Result<()> {
        let storage = self
            .members
            .get(&node)
            .ok_or(GridError::UnknownNode(node))?
            .storage
            .as_ref()
            .map(|s| s.handle.clone());
        let Some(handle) = storage else {
            tracing::warn!(%node, "power event from a node without public storage");
            return Ok(());
        };
        let Ok(flow) = handle.try_borrow().map(|s| s.power_flow()) else {
            tracing::warn!(%node, "storage is busy");
            return Ok(());
        };
        match kind {
            PowerEventKind::ProvidePower if flow.can_provide() => {
                registry.add(Role::Provider, Participant::new(node, handle));
            }
            PowerEventKind::RequestPower if flow.can_consume() => {
                registry.add(Role::Consumer, Participant::new(node, handle));
            }
            _ => {}
        }
        Ok(())
    }

    pub(super) fn idle_power_changed(&mut self, node: NodeId, draw: Amount) -> Result<()> {
        if !self.members.contains_key(&node) {
            return Err(GridError::UnknownNode(node));
        }
        self.idle.update(node, draw);
        Ok(())
    }

    pub(super) fn apply_commands(&mut self, registry: &mut Registry, commands: Vec<NodeCommand>) {
        for command in commands {
            let result = match command {
                NodeCommand::Join(node) => self.join(registry, node),
                NodeCommand::Leave(node) => self.leave(registry, node),
                NodeCommand::StorageChanged(node, kind) => {
                    self.storage_changed(registry, node, kind)
                }
                NodeCommand::IdlePowerChanged(node, draw) => self.idle_power_changed(node, draw),
            };
            if let Err(err) = result {
                tracing::warn!(%err, "request from storage callback rejected");
                self.diagnostics.rejected_requests += 1;
            }
        }
    }

    fn settle(&mut self, registry: &mut Registry, settlement: Settlement) -> Amount {
        if let Some(delta) = settlement.sync {
            self.write_to_world(registry, delta);
        }
        settlement.amount
    }

    pub(super) fn extract(&mut self, registry: &mut Registry, amount: Amount, mode: Actionable) -> Amount {
        let settlement = self.ledger.extract(amount, mode);
        self.settle(registry, settlement)
    }

    pub(super) fn inject(&mut self, registry: &mut Registry, amount: Amount, mode: Actionable) -> Amount {
        let settlement = self.ledger.inject(amount, mode);
        self.settle(registry, settlement)
    }

    pub(super) fn extract_with(
        &mut self,
        registry: &mut Registry,
        amount: Amount,
        mode: Actionable,
        multiplier: PowerMultiplier,
    ) -> Amount {
        let extracted = self.extract(registry, multiplier.multiply(amount), mode);
        multiplier.divide(extracted)
    }

    pub(super) fn snapshot(&self) -> PowerSnapshot {
        PowerSnapshot {
            tick: self.tick,
            stored: self.ledger.stored(),
            max: self.ledger.max(),
            demand: self.ledger.demand(),
            avg_usage: self.ledger.avg_drain(),
            avg_injection: self.ledger.avg_injection(),
            idle_usage: self.idle.total(),
            powered: self.status.is_powered(),
        }
    }

    fn notify_thresholds(&mut self) -> usize {
        let now = self.ledger.stored();
        let old = std::mem::replace(&mut self.last_stored, now);
        if self.thresholds.is_empty() {
            return 0;
        }
        let mut crossed = Vec::new();
        self.thresholds
            .notify_range(old, now, |key, owner| crossed.push((key.value(), *owner)));

        let snapshot = self.snapshot();
        for &(value, owner) in &crossed {
            let Some(handle) = self.members.get(&owner).and_then(|m| m.watcher.clone()) else {
                continue;
            };
            match handle.try_borrow_mut() {
                Ok(mut host) => host.on_threshold_pass(value, &snapshot),
                Err(_) => tracing::warn!(node = %owner, "watcher host is busy"),
            };
        }
        crossed.len()
    }

    fn probe(&mut self, registry: &mut Registry) -> bool {
        let draw = self.idle.total();
        let multiplier = self.settings.power_multiplier;
        if draw > self.settings.idle_epsilon {
            let drained = self.extract_with(registry, draw, Actionable::Modulate, multiplier);
            drained >= draw - self.settings.drain_tolerance
        } else {
            let probe = self.settings.probe_amount;
            self.extract_with(registry, probe, Actionable::Simulate, multiplier) > 0.0
        }
    }

    pub(super) fn on_tick(&mut self, registry: &mut Registry) -> TickOutcome {
        self.tick += 1;
        if let Some(delta) = self.ledger.pending_sync() {
            self.write_to_world(registry, delta);
        }
        self.ledger.begin_tick();
        let notified = self.notify_thresholds();
        self.ledger.update_averages();

        let raw_powered = self.probe(registry);
        let change = self.status.observe(raw_powered);
        if let Some(powered) = change {
            tracing::info!(tick = self.tick, powered, "network power status changed");
            self.bus
                .broadcast(GridEvent::PowerStatusChanged { powered });
        }

        TickOutcome {
            tick: self.tick,
            stored: self.ledger.stored(),
            max: self.ledger.max(),
            notified,
            raw_powered,
            powered: self.status.is_powered(),
            capped: self.ledger.was_capped() || self.ledger.is_capped(),
            status_changed: change.is_some(),
        }
    }
}

/// A shared energy pool over a changing set of storages.
///
/// The grid is driven from outside: node lifecycle calls as members come and
/// go, `extract`/`inject` from whoever consumes or produces, and `on_tick`
/// once per tick. Storage callbacks may raise lifecycle requests through
/// their [`PassContext`](super::storage::PassContext); those are applied
/// while the triggering pass is still running.
pub struct EnergyGrid<B = EventLog> {
    registry: Registry,
    state: GridState<B>,
}

impl Default for EnergyGrid<EventLog> {
    fn default() -> Self {
        Self::new(GridSettings::default())
    }
}

impl EnergyGrid<EventLog> {
    /// Creates an empty grid that records its events in an [`EventLog`].
    pub fn new(settings: GridSettings) -> Self {
        Self::with_bus(settings, EventLog::default())
    }
}

impl<B: EventBus> EnergyGrid<B> {
    pub fn with_bus(settings: GridSettings, bus: B) -> Self {
        Self {
            registry: Registry::new(),
            state: GridState::new(settings, bus),
        }
    }

    /// Adds a node and whatever capabilities it brings.
    ///
    /// # Errors
    ///
    /// Returns `GridError::NodeAlreadyJoined` if the node is a member already.
    pub fn on_node_joined(&mut self, node: GridNode) -> Result<()> {
        self.state.join(&mut self.registry, node)
    }

    /// Removes a node, its capacity and its thresholds.
    ///
    /// # Errors
    ///
    /// Returns `GridError::UnknownNode` if the node is not a member.
    pub fn on_node_left(&mut self, node: NodeId) -> Result<()> {
        self.state.leave(&mut self.registry, node)
    }

    /// Re-admits a member's storage to the role named by `kind`.
    ///
    /// # Errors
    ///
    /// Returns `GridError::UnknownNode` if the node is not a member.
    pub fn on_storage_changed(&mut self, node: NodeId, kind: PowerEventKind) -> Result<()> {
        self.state.storage_changed(&mut self.registry, node, kind)
    }

    /// # Errors
    ///
    /// Returns `GridError::UnknownNode` if the node is not a member.
    pub fn on_idle_power_changed(&mut self, node: NodeId, draw: Amount) -> Result<()> {
        self.state.idle_power_changed(node, draw)
    }

    /// Takes up to `amount` from the pool and returns what was taken.
    pub fn extract(&mut self, amount: Amount, mode: Actionable) -> Amount {
        self.state.extract(&mut self.registry, amount, mode)
    }

    /// Like [`extract`](Self::extract) with `amount` and the result expressed
    /// in the units of `multiplier`.
    pub fn extract_with(
        &mut self,
        amount: Amount,
        mode: Actionable,
        multiplier: PowerMultiplier,
    ) -> Amount {
        self.state
            .extract_with(&mut self.registry, amount, mode, multiplier)
    }

    /// Puts up to `amount` into the pool and returns the leftover.
    pub fn inject(&mut self, amount: Amount, mode: Actionable) -> Amount {
        self.state.inject(&mut self.registry, amount, mode)
    }

    pub fn demand(&self) -> Amount {
        self.state.ledger.demand()
    }

    pub fn stored_power(&self) -> Amount {
        self.state.ledger.stored()
    }

    pub fn max_power(&self) -> Amount {
        self.state.ledger.max()
    }

    pub fn avg_power_usage(&self) -> Amount {
        self.state.ledger.avg_drain()
    }

    pub fn avg_power_injection(&self) -> Amount {
        self.state.ledger.avg_injection()
    }

    pub fn idle_power_usage(&self) -> Amount {
        self.state.idle.total()
    }

    /// Debounced powered flag.
    pub fn is_network_powered(&self) -> bool {
        self.state.status.is_powered()
    }

    /// Registers a threshold. Returns `false` if its key is taken.
    pub fn register_interest(&mut self, threshold: EnergyThreshold<NodeId>) -> bool {
        self.state.thresholds.register(threshold)
    }

    pub fn unregister_interest(&mut self, key: &ThresholdKey) -> bool {
        self.state.thresholds.unregister(key)
    }

    pub fn thresholds(&self) -> &ThresholdIndex<NodeId> {
        &self.state.thresholds
    }

    pub fn snapshot(&self) -> PowerSnapshot {
        self.state.snapshot()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.state.diagnostics
    }

    pub fn settings(&self) -> &GridSettings {
        &self.state.settings
    }

    pub fn bus(&self) -> &B {
        &self.state.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.state.bus
    }

    pub fn is_member(&self, node: NodeId) -> bool {
        self.state.members.contains_key(&node)
    }

    pub fn member_count(&self) -> usize {
        self.state.members.len()
    }

    /// Ticks processed so far.
    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    /// Advances the grid by one tick.
    pub fn on_tick(&mut self) -> TickOutcome {
        self.state.on_tick(&mut self.registry)
    }
}
