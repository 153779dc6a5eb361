//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::grid::{GridSettings, PowerFlow, PowerMultiplier};

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Run length and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Grid tunables.
    #[serde(default)]
    pub grid: GridConfig,
    /// Energy cell bank.
    #[serde(default)]
    pub cells: CellsConfig,
    /// Daylight generator.
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Machines drawing idle power.
    #[serde(default)]
    pub machines: MachinesConfig,
    /// Level emitters watching the pool.
    #[serde(default)]
    pub emitters: EmittersConfig,
    /// Random departures and rejoins.
    #[serde(default)]
    pub churn: ChurnConfig,
}

/// Longest run a scenario may ask for.
pub const MAX_TICKS: u64 = 10_000_000;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of ticks to run (must be in `1..=MAX_TICKS`).
    pub ticks: u64,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            ticks: 480,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridConfig {
    /// Moving-average window in ticks (must be >= 1).
    pub average_window: f64,
    /// Powered ticks to exceed before the network reports power.
    pub dwell_ticks: u32,
    /// Dry-run probe amount when nothing draws idle power.
    pub probe_amount: f64,
    /// Idle draw at or below this counts as none.
    pub idle_epsilon: f64,
    /// Shortfall tolerated when paying the idle draw.
    pub drain_tolerance: f64,
    /// Unit conversion applied to the idle-draw probe (must be > 0).
    pub power_multiplier: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        let settings = GridSettings::default();
        Self {
            average_window: settings.average_window,
            dwell_ticks: settings.dwell_ticks,
            probe_amount: settings.probe_amount,
            idle_epsilon: settings.idle_epsilon,
            drain_tolerance: settings.drain_tolerance,
            power_multiplier: settings.power_multiplier.factor(),
        }
    }
}

impl GridConfig {
    pub fn settings(&self) -> GridSettings {
        GridSettings {
            average_window: self.average_window,
            dwell_ticks: self.dwell_ticks,
            probe_amount: self.probe_amount,
            idle_epsilon: self.idle_epsilon,
            drain_tolerance: self.drain_tolerance,
            power_multiplier: PowerMultiplier::new(self.power_multiplier),
        }
    }
}

/// Flow direction of the configured cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CellFlow {
    #[default]
    ReadWrite,
    Read,
    Write,
}

impl From<CellFlow> for PowerFlow {
    fn from(flow: CellFlow) -> Self {
        match flow {
            CellFlow::ReadWrite => PowerFlow::ReadWrite,
            CellFlow::Read => PowerFlow::Read,
            CellFlow::Write => PowerFlow::Write,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CellsConfig {
    /// Number of cells.
    pub count: usize,
    /// Capacity of each cell (must be > 0).
    pub capacity: f64,
    /// Initial fill (0.0–1.0).
    pub initial_fill: f64,
    /// `"read_write"`, `"read"` or `"write"`.
    pub flow: CellFlow,
    /// Maximum accepted per call.
    pub max_input: f64,
    /// Maximum released per call.
    pub max_output: f64,
    /// Leave the grid when full, rejoin after `churn.rejoin_after_ticks`.
    pub detach_when_full: bool,
}

impl Default for CellsConfig {
    fn default() -> Self {
        Self {
            count: 4,
            capacity: 1600.0,
            initial_fill: 0.5,
            flow: CellFlow::ReadWrite,
            max_input: 200.0,
            max_output: 200.0,
            detach_when_full: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Output at solar noon.
    pub peak: f64,
    /// Ticks per simulated day.
    pub period_ticks: u64,
    /// Sunrise tick within the day (inclusive).
    pub sunrise_tick: u64,
    /// Sunset tick within the day (exclusive).
    pub sunset_tick: u64,
    /// Multiplicative noise standard deviation.
    pub noise_std: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            peak: 60.0,
            period_ticks: 240,
            sunrise_tick: 60,
            sunset_tick: 180,
            noise_std: 0.05,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachinesConfig {
    /// Number of machines.
    pub count: usize,
    /// Mean idle draw per machine.
    pub base_draw: f64,
    /// Amplitude of the duty cycle.
    pub amp_draw: f64,
    /// Gaussian noise standard deviation.
    pub noise_std: f64,
    /// Duty cycle length in ticks.
    pub period_ticks: u64,
}

impl Default for MachinesConfig {
    fn default() -> Self {
        Self {
            count: 6,
            base_draw: 4.0,
            amp_draw: 2.0,
            noise_std: 0.2,
            period_ticks: 96,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmittersConfig {
    /// One emitter per level.
    pub levels: Vec<f64>,
}

impl Default for EmittersConfig {
    fn default() -> Self {
        Self {
            levels: vec![1600.0, 3200.0, 4800.0],
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChurnConfig {
    /// Per-tick chance that a member machine or cell leaves (0.0–1.0).
    pub leave_probability: f64,
    /// Ticks a departed node stays away (must be > 0).
    pub rejoin_after_ticks: u64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        Self {
            leave_probability: 0.0,
            rejoin_after_ticks: 20,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"cells.capacity"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: a balanced grid that never browns out.
    pub fn baseline() -> Self {
        Self::default()
    }

    /// Returns the brownout preset: heavy idle draw on a small, nearly empty bank.
    pub fn brownout() -> Self {
        Self {
            cells: CellsConfig {
                count: 2,
                capacity: 800.0,
                initial_fill: 0.1,
                ..CellsConfig::default()
            },
            generator: GeneratorConfig {
                peak: 70.0,
                ..GeneratorConfig::default()
            },
            machines: MachinesConfig {
                count: 8,
                base_draw: 5.0,
                amp_draw: 1.0,
                ..MachinesConfig::default()
            },
            emitters: EmittersConfig {
                levels: vec![100.0, 400.0, 800.0],
            },
            ..Self::default()
        }
    }

    /// Returns the churn preset: members leave and rejoin, cells detach when full.
    pub fn churn() -> Self {
        Self {
            cells: CellsConfig {
                count: 6,
                capacity: 600.0,
                initial_fill: 0.6,
                max_input: 40.0,
                max_output: 40.0,
                detach_when_full: true,
                ..CellsConfig::default()
            },
            generator: GeneratorConfig {
                peak: 90.0,
                noise_std: 0.15,
                ..GeneratorConfig::default()
            },
            churn: ChurnConfig {
                leave_probability: 0.02,
                rejoin_after_ticks: 15,
            },
            ..Self::default()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["baseline", "brownout", "churn"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "brownout" => Ok(Self::brownout()),
            "churn" => Ok(Self::churn()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new(
                "scenario",
                format!("cannot read \"{}\": {e}", path.display()),
            )
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &str, message: &str| {
            if !ok {
                errors.push(ConfigError::new(field, message));
            }
        };

        check(
            (1..=MAX_TICKS).contains(&self.simulation.ticks),
            "simulation.ticks",
            "must be between 1 and 10000000",
        );

        let g = &self.grid;
        check(
            g.average_window.is_finite() && g.average_window >= 1.0,
            "grid.average_window",
            "must be >= 1",
        );
        check(
            g.probe_amount.is_finite() && g.probe_amount > 0.0,
            "grid.probe_amount",
            "must be > 0",
        );
        check(
            g.idle_epsilon.is_finite() && g.idle_epsilon >= 0.0,
            "grid.idle_epsilon",
            "must be >= 0",
        );
        check(
            g.drain_tolerance.is_finite() && g.drain_tolerance >= 0.0,
            "grid.drain_tolerance",
            "must be >= 0",
        );
        check(
            g.power_multiplier.is_finite() && g.power_multiplier > 0.0,
            "grid.power_multiplier",
            "must be > 0",
        );

        let c = &self.cells;
        check(
            c.capacity.is_finite() && c.capacity > 0.0,
            "cells.capacity",
            "must be > 0",
        );
        check(
            (0.0..=1.0).contains(&c.initial_fill),
            "cells.initial_fill",
            "must be in [0.0, 1.0]",
        );
        check(c.max_input >= 0.0, "cells.max_input", "must be >= 0");
        check(c.max_output >= 0.0, "cells.max_output", "must be >= 0");

        let gen_cfg = &self.generator;
        check(gen_cfg.peak >= 0.0, "generator.peak", "must be >= 0");
        check(
            gen_cfg.period_ticks > 0,
            "generator.period_ticks",
            "must be > 0",
        );
        check(
            gen_cfg.sunrise_tick < gen_cfg.sunset_tick,
            "generator.sunrise_tick",
            "must be < generator.sunset_tick",
        );
        check(
            gen_cfg.sunset_tick <= gen_cfg.period_ticks,
            "generator.sunset_tick",
            "must be <= generator.period_ticks",
        );

        let m = &self.machines;
        check(m.base_draw >= 0.0, "machines.base_draw", "must be >= 0");
        check(m.period_ticks > 0, "machines.period_ticks", "must be > 0");

        check(
            self.emitters.levels.iter().all(|l| l.is_finite()),
            "emitters.levels",
            "must all be finite",
        );

        let ch = &self.churn;
        check(
            (0.0..=1.0).contains(&ch.leave_probability),
            "churn.leave_probability",
            "must be in [0.0, 1.0]",
        );
        check(
            ch.rejoin_after_ticks > 0,
            "churn.rejoin_after_ticks",
            "must be > 0",
        );

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_preset_valid() {
        let cfg = ScenarioConfig::baseline();
        let errors = cfg.validate();
        assert!(errors.is_empty(), "baseline should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let err = ScenarioConfig::from_preset("nonexistent");
        assert!(err.as_ref().is_err_and(|e| e.message.contains("unknown preset")));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
ticks = 100
seed = 7

[grid]
average_window = 20.0
dwell_ticks = 5
power_multiplier = 2.0

[cells]
count = 3
capacity = 500.0
initial_fill = 0.2
flow = "write"
detach_when_full = true

[generator]
peak = 10.0
period_ticks = 48
sunrise_tick = 12
sunset_tick = 36

[machines]
count = 2
base_draw = 1.5

[emitters]
levels = [10.0, 20.0]

[churn]
leave_probability = 0.1
rejoin_after_ticks = 4
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.ok();
        assert_eq!(cfg.as_ref().map(|c| c.simulation.ticks), Some(100));
        assert_eq!(cfg.as_ref().map(|c| c.cells.flow), Some(CellFlow::Write));
        assert_eq!(
            cfg.as_ref().map(|c| c.grid.settings().power_multiplier.factor()),
            Some(2.0)
        );
        assert_eq!(cfg.as_ref().map(|c| c.emitters.levels.len()), Some(2));
        let errors = cfg.map(|c| c.validate()).unwrap_or_default();
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[cells]
count = 2
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn unknown_flow_is_rejected() {
        let toml = r#"
[cells]
flow = "sideways"
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn validation_reports_every_field() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.ticks = 0;
        cfg.cells.initial_fill = 1.5;
        cfg.generator.sunrise_tick = 200;
        cfg.churn.leave_probability = -0.1;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"simulation.ticks".to_string()));
        assert!(fields.contains(&"cells.initial_fill".to_string()));
        assert!(fields.contains(&"generator.sunrise_tick".to_string()));
        assert!(fields.contains(&"churn.leave_probability".to_string()));
    }

    #[test]
    fn runaway_tick_count_is_rejected() {
        let mut cfg = ScenarioConfig::baseline();
        cfg.simulation.ticks = u64::MAX;
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert_eq!(fields, vec!["simulation.ticks".to_string()]);

        cfg.simulation.ticks = MAX_TICKS;
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(
                errors.is_empty(),
                "preset \"{name}\" should be valid: {errors:?}"
            );
        }
    }

    #[test]
    fn brownout_draws_more_than_baseline() {
        let base = ScenarioConfig::baseline();
        let brown = ScenarioConfig::brownout();
        let draw = |c: &ScenarioConfig| c.machines.count as f64 * c.machines.base_draw;
        assert!(draw(&brown) > draw(&base));
        assert!(brown.cells.initial_fill < base.cells.initial_fill);
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml = r#"
[simulation]
seed = 99
"#;
        let cfg = ScenarioConfig::from_toml_str(toml).ok();
        assert_eq!(cfg.as_ref().map(|c| c.simulation.seed), Some(99));
        assert_eq!(cfg.as_ref().map(|c| c.simulation.ticks), Some(480));
        assert_eq!(cfg.as_ref().map(|c| c.grid.dwell_ticks), Some(30));
    }

    #[test]
    fn error_display_names_field() {
        let err = ConfigError::new("cells.capacity", "must be > 0");
        assert_eq!(err.to_string(), "config error: cells.capacity: must be > 0");
    }
}
