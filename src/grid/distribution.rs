//! Writing ledger changes through to the participants.

use super::energy::GridState;
use super::registry::{Participant, Registry, Visit};
use super::storage::PassContext;
use super::types::{Actionable, Amount, EventBus, Role};

/// Remainders at or below this are rounding noise.
pub const REMAINDER_EPSILON: Amount = 1e-9;

impl<B: EventBus> GridState<B> {
    /// Records `delta` as written and moves it into consumers (positive) or
    /// out of providers (negative).
    ///
    /// Participants are visited in insertion order. One that cannot take or
    /// give the whole remainder is dropped from its role; it re-enters through
    /// a storage event. Energy no participant could move is logged and
    /// counted, the ledger keeps its value.
    pub(super) fn write_to_world(&mut self, registry: &mut Registry, delta: Amount) {
        if !delta.is_finite() {
            return;
        }
        self.ledger.record_written(delta);
        if delta.abs() <= REMAINDER_EPSILON {
            return;
        }

        let role = if delta > 0.0 {
            Role::Consumer
        } else {
            Role::Provider
        };
        let mut remaining = delta.abs();
        let pass = registry.for_each_active(role, |participant, registry| {
            let mut ctx = PassContext::new();
            let Some(moved) = self.exchange(participant, role, remaining, &mut ctx) else {
                return Visit::Keep;
            };
            remaining -= moved;
            if !ctx.is_empty() {
                self.apply_commands(registry, ctx.into_commands());
            }
            if remaining <= REMAINDER_EPSILON {
                Visit::Stop
            } else {
                Visit::Remove
            }
        });

        match pass {
            Ok(_) if remaining > REMAINDER_EPSILON => {
                match role {
                    Role::Consumer => {
                        tracing::debug!(%role, remaining, "requesters underreporting free space");
                    }
                    Role::Provider => {
                        tracing::debug!(%role, remaining, "providers overreporting stored power");
                    }
                }
                self.diagnostics.accounting_anomalies += 1;
                self.diagnostics.unresolved_energy += remaining;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%err, delta, "distribution pass rejected");
                self.diagnostics.rejected_passes += 1;
            }
        }
    }

    /// Asks one participant to move up to `remaining`; `None` if its storage
    /// is already borrowed.
    fn exchange(
        &mut self,
        participant: &Participant,
        role: Role,
        remaining: Amount,
        ctx: &mut PassContext,
    ) -> Option<Amount> {
        let node = participant.node();
        let Ok(mut storage) = participant.storage().try_borrow_mut() else {
            tracing::warn!(%node, "storage is busy, skipped");
            return None;
        };
        let raw = match role {
            Role::Consumer => remaining - storage.inject_power(remaining, Actionable::Modulate, ctx),
            Role::Provider => storage.extract_power(remaining, Actionable::Modulate, ctx),
        };
        drop(storage);

        let moved = if raw.is_finite() {
            raw.clamp(0.0, remaining)
        } else {
            0.0
        };
        if moved != raw {
            tracing::debug!(%node, %role, raw, moved, "participant result out of range");
            self.diagnostics.malformed_reports += 1;
        }
        Some(moved)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::grid::energy::EnergyGrid;
    use crate::grid::storage::{PassContext, PowerStorage};
    use crate::grid::types::{Actionable, Amount, GridNode, NodeId, PowerEventKind, PowerFlow, Role};

    /// Sink that announces itself again after each charge while not full.
    struct Bucket {
        node: NodeId,
        level: Amount,
        cap: Amount,
        per_call: Amount,
        leave_when_full: bool,
    }

    impl PowerStorage for Bucket {
        fn current_power(&self) -> Amount {
            self.level
        }
        fn max_power(&self) -> Amount {
            self.cap
        }
        fn power_flow(&self) -> PowerFlow {
            PowerFlow::Write
        }
        fn inject_power(&mut self, amount: Amount, mode: Actionable, ctx: &mut PassContext) -> Amount {
            let accepted = amount.min(self.cap - self.level).min(self.per_call);
            if mode == Actionable::Modulate {
                self.level += accepted;
                if self.level < self.cap {
                    ctx.storage_changed(self.node, PowerEventKind::RequestPower);
                } else if self.leave_when_full {
                    ctx.leave(self.node);
                }
            }
            amount - accepted
        }
        fn extract_power(&mut self, _: Amount, _: Actionable, _: &mut PassContext) -> Amount {
            0.0
        }
    }

    struct Source;

    impl PowerStorage for Source {
        fn current_power(&self) -> Amount {
            1000.0
        }
        fn max_power(&self) -> Amount {
            1000.0
        }
        fn power_flow(&self) -> PowerFlow {
            PowerFlow::Read
        }
        fn inject_power(&mut self, amount: Amount, _: Actionable, _: &mut PassContext) -> Amount {
            amount
        }
        fn extract_power(&mut self, amount: Amount, _: Actionable, _: &mut PassContext) -> Amount {
            amount
        }
    }

    fn bucket(id: u64, per_call: Amount, leave_when_full: bool) -> Rc<RefCell<Bucket>> {
        Rc::new(RefCell::new(Bucket {
            node: NodeId(id),
            level: 0.0,
            cap: 100.0,
            per_call,
            leave_when_full,
        }))
    }

    fn grid_with(buckets: &[&Rc<RefCell<Bucket>>]) -> EnergyGrid {
        let mut grid = EnergyGrid::default();
        let source = Rc::new(RefCell::new(Source));
        assert!(grid.on_node_joined(GridNode::new(NodeId(100), 0.0).with_storage(source)).is_ok());
        for b in buckets {
            let id = b.borrow().node;
            assert!(grid.on_node_joined(GridNode::new(id, 0.0).with_storage((*b).clone())).is_ok());
        }
        grid
    }

    #[test]
    fn rate_limited_consumer_is_dropped_and_readmitted() {
        let slow = bucket(1, 10.0, false);
        let fast = bucket(2, 100.0, false);
        let mut grid = grid_with(&[&slow, &fast]);

        // empty the pool, then refill part of it; the capped tick skips the sync
        assert_eq!(grid.extract(1000.0, Actionable::Modulate), 1000.0);
        assert_eq!(grid.inject(50.0, Actionable::Modulate), 0.0);
        grid.on_tick();
        grid.on_tick();

        assert_eq!(slow.borrow().level, 10.0);
        assert_eq!(fast.borrow().level, 40.0);
        // the slow bucket re-announced itself from inside the pass; the
        // request is deferred but not lost
        assert_eq!(grid.registry().pending_adds(Role::Consumer), 2);
        assert_eq!(grid.diagnostics().accounting_anomalies, 0);
    }

    #[test]
    fn leave_requested_mid_pass_is_deferred() {
        let a = bucket(1, 100.0, true);
        let b = bucket(2, 100.0, true);
        let mut grid = grid_with(&[&a, &b]);
        assert_eq!(grid.extract(1000.0, Actionable::Modulate), 1000.0);
        assert_eq!(grid.inject(150.0, Actionable::Modulate), 0.0);
        grid.on_tick();
        grid.on_tick();

        assert_eq!(a.borrow().level, 100.0);
        assert_eq!(b.borrow().level, 50.0);
        assert!(!grid.is_member(NodeId(1)));
        assert!(!grid.registry().contains(Role::Consumer, NodeId(1)));
        assert!(grid.registry().contains(Role::Consumer, NodeId(2)));
        assert_eq!(grid.diagnostics().rejected_requests, 0);
    }

    #[test]
    fn unplaceable_energy_is_an_anomaly() {
        let tiny = bucket(1, 5.0, false);
        let mut grid = grid_with(&[&tiny]);
        assert_eq!(grid.extract(1000.0, Actionable::Modulate), 1000.0);
        assert_eq!(grid.inject(20.0, Actionable::Modulate), 0.0);
        grid.on_tick();
        grid.on_tick();

        let diagnostics = grid.diagnostics();
        assert_eq!(diagnostics.accounting_anomalies, 1);
        assert!((diagnostics.unresolved_energy - 15.0).abs() < 1e-9);
        // the ledger stays authoritative
        assert_eq!(grid.stored_power(), 20.0);
    }
}
