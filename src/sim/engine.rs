//! Simulation engine that drives an energy grid through a scenario.

use std::cell::RefCell;
use std::rc::Rc;

use crate::config::ScenarioConfig;
use crate::devices::{Device, DeviceContext, EnergyCell, Generator, LevelEmitter, Machine};
use crate::error::Result;
use crate::grid::{Actionable, EnergyGrid, GridNode, NodeId, Role};

use super::churn::Churn;
use super::clock::TickClock;
use super::types::TickReport;

/// Seed offsets so device RNGs do not correlate.
const GENERATOR_SEED_OFFSET: u64 = 11;
const CHURN_SEED_OFFSET: u64 = 57;

/// Simulation engine owning the grid and every simulated member.
///
/// Cells and emitters are shared with the grid through `Rc<RefCell<_>>`
/// handles; machines stay with the engine and report their draw each tick.
pub struct Simulation {
    config: ScenarioConfig,
    grid: EnergyGrid,
    cells: Vec<Rc<RefCell<EnergyCell>>>,
    machines: Vec<Machine>,
    emitters: Vec<(NodeId, Rc<RefCell<LevelEmitter>>)>,
    generator: Generator,
    churn: Churn,
}

impl Simulation {
    /// Builds the grid described by `config` and joins every member.
    ///
    /// # Panics
    ///
    /// Panics if `config` does not pass [`ScenarioConfig::validate`].
    ///
    /// # Errors
    ///
    /// Returns a `GridError` if a member cannot join.
    pub fn new(config: ScenarioConfig) -> Result<Self> {
        let seed = config.simulation.seed;
        // node ids are handed out from 1 in join order
        let mut last_id = 0;
        let mut allocate = || {
            last_id += 1;
            NodeId(last_id)
        };

        let c = &config.cells;
        let cells: Vec<_> = (0..c.count)
            .map(|_| {
                let cell = EnergyCell::new(allocate(), c.capacity, c.initial_fill, c.flow.into())
                    .with_rate_limits(c.max_input, c.max_output)
                    .with_breaker(c.detach_when_full);
                Rc::new(RefCell::new(cell))
            })
            .collect();

        let m = &config.machines;
        let mut machines: Vec<_> = (0..m.count)
            .map(|i| {
                let phase = std::f64::consts::TAU * i as f64 / m.count.max(1) as f64;
                Machine::new(
                    allocate(),
                    m.base_draw,
                    m.amp_draw,
                    phase,
                    m.noise_std,
                    m.period_ticks,
                    seed.wrapping_add(i as u64),
                )
            })
            .collect();

        let emitters: Vec<_> = config
            .emitters
            .levels
            .iter()
            .map(|&level| (allocate(), Rc::new(RefCell::new(LevelEmitter::new(level)))))
            .collect();

        let g = &config.generator;
        let generator = Generator::new(
            g.peak,
            g.period_ticks,
            g.sunrise_tick,
            g.sunset_tick,
            g.noise_std,
            seed.wrapping_add(GENERATOR_SEED_OFFSET),
        );
        let churn = Churn::new(
            config.churn.leave_probability,
            config.churn.rejoin_after_ticks,
            seed.wrapping_add(CHURN_SEED_OFFSET),
        );

        let mut grid = EnergyGrid::new(config.grid.settings());
        for cell in &cells {
            let node = cell.borrow().node();
            grid.on_node_joined(GridNode::new(node, 0.0).with_storage(cell.clone()))?;
        }
        for machine in &mut machines {
            let draw = machine.idle_draw(0);
            grid.on_node_joined(GridNode::new(machine.node(), draw))?;
        }
        for (node, emitter) in &emitters {
            grid.on_node_joined(GridNode::new(*node, 0.0).with_watcher(emitter.clone()))?;
        }
        tracing::info!(
            cells = cells.len(),
            machines = machines.len(),
            emitters = emitters.len(),
            source = generator.device_type(),
            max = grid.max_power(),
            stored = grid.stored_power(),
            "grid assembled"
        );

        Ok(Self {
            config,
            grid,
            cells,
            machines,
            emitters,
            generator,
            churn,
        })
    }

    fn cell(&self, node: NodeId) -> Option<&Rc<RefCell<EnergyCell>>> {
        self.cells.iter().find(|c| c.borrow().node() == node)
    }

    fn rejoin(&mut self, node: NodeId, tick: u64) {
        let joined = if let Some(cell) = self.cell(node).cloned() {
            cell.borrow_mut().reset_breaker();
            self.grid
                .on_node_joined(GridNode::new(node, 0.0).with_storage(cell))
        } else if let Some(machine) = self.machines.iter_mut().find(|m| m.node() == node) {
            let draw = machine.idle_draw(tick);
            self.grid.on_node_joined(GridNode::new(node, draw))
        } else {
            return;
        };
        match joined {
            Ok(()) => tracing::debug!(%node, tick, "rejoined"),
            Err(err) => tracing::warn!(%err, tick, "rejoin failed"),
        }
    }

    fn apply_churn(&mut self, tick: u64) {
        for node in self.churn.rejoins(tick) {
            self.rejoin(node, tick);
        }

        // cells whose breaker opened left on their own
        let tripped: Vec<NodeId> = self
            .cells
            .iter()
            .map(|c| c.borrow())
            .filter(|c| c.is_tripped())
            .map(|c| c.node())
            .filter(|n| !self.grid.is_member(*n) && !self.churn.is_away(*n))
            .collect();
        for node in tripped {
            self.churn.schedule_rejoin(tick, node);
        }

        let candidates: Vec<NodeId> = self
            .cells
            .iter()
            .map(|c| c.borrow().node())
            .chain(self.machines.iter().map(Machine::node))
            .filter(|n| self.grid.is_member(*n))
            .collect();
        for node in self.churn.departures(tick, candidates) {
            if let Err(err) = self.grid.on_node_left(node) {
                tracing::warn!(%err, tick, "departure failed");
            }
        }
    }

    /// Executes one tick and returns its report.
    ///
    /// Order: churn, machine draws, generator injection, grid tick.
    pub fn step(&mut self, t: u64) -> TickReport {
        let context = DeviceContext::new(t);
        self.apply_churn(t);

        for machine in &mut self.machines {
            let draw = machine.power(&context);
            let node = machine.node();
            if self.grid.is_member(node) {
                if let Err(err) = self.grid.on_idle_power_changed(node, draw) {
                    tracing::warn!(%err, "idle draw update failed");
                }
            }
        }

        let generated = self.generator.power(&context);
        let wasted = self.grid.inject(generated, Actionable::Modulate);

        let outcome = self.grid.on_tick();
        let registry = self.grid.registry();
        TickReport {
            tick: outcome.tick,
            stored: outcome.stored,
            max: outcome.max,
            demand: self.grid.demand(),
            generated,
            wasted,
            idle_draw: self.grid.idle_power_usage(),
            avg_usage: self.grid.avg_power_usage(),
            avg_injection: self.grid.avg_power_injection(),
            thresholds_notified: outcome.notified,
            raw_powered: outcome.raw_powered,
            powered: outcome.powered,
            capped: outcome.capped,
            status_changed: outcome.status_changed,
            providers: registry.len(Role::Provider),
            consumers: registry.len(Role::Consumer),
            members: self.grid.member_count(),
            active_emitters: self
                .emitters
                .iter()
                .filter(|(_, e)| e.borrow().is_active())
                .count(),
            anomalies: self.grid.diagnostics().accounting_anomalies,
        }
    }

    /// Executes every configured tick and returns the full report vector.
    pub fn run(&mut self) -> Vec<TickReport> {
        let mut clock = TickClock::new(self.config.simulation.ticks);
        let mut reports = Vec::new();
        clock.run(|t| reports.push(self.step(t)));
        reports
    }

    pub fn grid(&self) -> &EnergyGrid {
        &self.grid
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn cells(&self) -> &[Rc<RefCell<EnergyCell>>] {
        &self.cells
    }

    pub fn emitters(&self) -> impl Iterator<Item = &Rc<RefCell<LevelEmitter>>> + '_ {
        self.emitters.iter().map(|(_, e)| e)
    }
}
