use std::process::Command;

use energy_grid::config::ScenarioConfig;
use energy_grid::sim::{GridSummary, Simulation, TickReport};

#[test]
fn scenario_files_run_via_cli_and_produce_distinct_dynamics() {
    let baseline = run_and_parse_powered("scenarios/baseline.toml");
    let brownout = run_and_parse_powered("scenarios/brownout.toml");
    let churn = run_and_parse_powered("scenarios/churn.toml");

    assert!(
        baseline > 90.0,
        "expected baseline to stay powered after the dwell: {baseline:.1}%"
    );
    assert!(
        brownout < baseline - 30.0,
        "expected brownout to lose power: baseline={baseline:.1}%, brownout={brownout:.1}%"
    );
    assert!((0.0..=100.0).contains(&churn));
}

#[test]
fn unknown_preset_is_rejected_by_cli() {
    let output = Command::new(env!("CARGO_BIN_EXE_energy-grid"))
        .args(["--preset", "blackout"])
        .output()
        .expect("energy-grid process should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unknown preset"), "stderr={stderr}");
}

#[test]
fn runaway_tick_count_is_rejected_by_cli() {
    let output = Command::new(env!("CARGO_BIN_EXE_energy-grid"))
        .args(["--preset", "baseline", "--ticks", "18446744073709551615"])
        .output()
        .expect("energy-grid process should run");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("simulation.ticks"), "stderr={stderr}");
}

#[test]
fn every_preset_keeps_the_pool_in_bounds() {
    for name in ScenarioConfig::PRESETS {
        let reports = run_preset(name, 240);
        assert_eq!(reports.len(), 240, "{name}");
        for r in &reports {
            assert!(r.stored >= 0.0, "{name} tick {}: stored {}", r.tick, r.stored);
            assert!(
                r.stored <= r.max + 1e-9,
                "{name} tick {}: stored {} above max {}",
                r.tick,
                r.stored,
                r.max
            );
            assert!(r.wasted <= r.generated + 1e-9, "{name} tick {}", r.tick);
        }
    }
}

#[test]
fn churn_preset_changes_membership() {
    let reports = run_preset("churn", 480);
    let full = reports.iter().map(|r| r.members).max().unwrap_or(0);
    assert!(
        reports.iter().any(|r| r.members < full),
        "expected some departures over the run"
    );
}

#[test]
fn same_seed_same_summary() {
    let a = GridSummary::from_reports(&run_preset("brownout", 240));
    let b = GridSummary::from_reports(&run_preset("brownout", 240));
    assert_eq!(a, b);
}

fn run_preset(name: &str, ticks: u64) -> Vec<TickReport> {
    let mut cfg = ScenarioConfig::from_preset(name).expect("preset should exist");
    cfg.simulation.ticks = ticks;
    assert!(cfg.validate().is_empty(), "preset {name} should validate");
    Simulation::new(cfg).expect("preset should assemble").run()
}

fn run_and_parse_powered(path: &str) -> f64 {
    let output = Command::new(env!("CARGO_BIN_EXE_energy-grid"))
        .args(["--scenario", path, "--quiet"])
        .output()
        .expect("energy-grid process should run");

    assert!(
        output.status.success(),
        "scenario run failed for {path}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    parse_metric(&stdout, "Powered:", "%")
}

fn parse_metric(stdout: &str, label: &str, unit: &str) -> f64 {
    let line = stdout
        .lines()
        .find(|line| line.trim_start().starts_with(label))
        .unwrap_or_else(|| panic!("missing summary line `{label}` in output: {stdout}"));

    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid summary format for line `{line}`"));

    let numeric = raw.split(unit).next().unwrap_or(raw).trim();
    numeric
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("failed parsing `{numeric}` from summary line `{line}`"))
}
