//! Energy grid simulator entry point: CLI wiring and config-driven run.

use std::path::Path;
use std::process;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use energy_grid::config::ScenarioConfig;
use energy_grid::io::export::export_csv;
use energy_grid::sim::{GridSummary, Simulation};

/// Parsed CLI arguments.
struct CliArgs {
    scenario_path: Option<String>,
    preset: Option<String>,
    seed_override: Option<u64>,
    ticks_override: Option<u64>,
    telemetry_out: Option<String>,
    quiet: bool,
    #[cfg(feature = "api")]
    serve: bool,
    #[cfg(feature = "api")]
    port: u16,
}

fn print_help() {
    eprintln!("energy-grid: shared energy pool simulator");
    eprintln!();
    eprintln!("Usage: energy-grid [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from TOML config file");
    eprintln!(
        "  --preset <name>          Use a built-in preset ({})",
        ScenarioConfig::PRESETS.join(", ")
    );
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --ticks <u64>            Override run length");
    eprintln!("  --telemetry-out <path>   Export tick reports to CSV");
    eprintln!("  --quiet                  Print only the summary");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after the run");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the baseline preset is used.");
    eprintln!("Log verbosity follows RUST_LOG (default: energy_grid=info).");
}

fn value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    match args.get(i) {
        Some(v) => v.as_str(),
        None => {
            eprintln!("error: {flag} requires a {what} argument");
            process::exit(1);
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &str, flag: &str, what: &str) -> T {
    raw.parse::<T>().unwrap_or_else(|_| {
        eprintln!("error: {flag} value \"{raw}\" is not a valid {what}");
        process::exit(1);
    })
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        scenario_path: None,
        preset: None,
        seed_override: None,
        ticks_override: None,
        telemetry_out: None,
        quiet: false,
        #[cfg(feature = "api")]
        serve: false,
        #[cfg(feature = "api")]
        port: 3000,
    };

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--scenario" => {
                i += 1;
                cli.scenario_path = Some(value(&args, i, flag, "path").to_owned());
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(value(&args, i, flag, "name").to_owned());
            }
            "--seed" => {
                i += 1;
                cli.seed_override = Some(parse_number(value(&args, i, flag, "u64"), flag, "u64"));
            }
            "--ticks" => {
                i += 1;
                cli.ticks_override = Some(parse_number(value(&args, i, flag, "u64"), flag, "u64"));
            }
            "--telemetry-out" => {
                i += 1;
                cli.telemetry_out = Some(value(&args, i, flag, "path").to_owned());
            }
            "--quiet" | "-q" => cli.quiet = true,
            #[cfg(feature = "api")]
            "--serve" => cli.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                cli.port = parse_number(value(&args, i, flag, "u16"), flag, "u16");
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "energy_grid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = parse_args();
    init_tracing();

    // --scenario takes priority, then --preset, then baseline
    let loaded = if let Some(ref path) = cli.scenario_path {
        ScenarioConfig::from_toml_file(Path::new(path))
    } else if let Some(ref name) = cli.preset {
        ScenarioConfig::from_preset(name)
    } else {
        Ok(ScenarioConfig::baseline())
    };
    let mut scenario = loaded.unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    if let Some(seed) = cli.seed_override {
        scenario.simulation.seed = seed;
    }
    if let Some(ticks) = cli.ticks_override {
        scenario.simulation.ticks = ticks;
    }

    let errors = scenario.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        process::exit(1);
    }

    let mut simulation = Simulation::new(scenario.clone()).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });
    let reports = simulation.run();
    let summary = GridSummary::from_reports(&reports);
    let diagnostics = simulation.grid().diagnostics();
    tracing::info!(
        anomalies = diagnostics.accounting_anomalies,
        unresolved = diagnostics.unresolved_energy,
        malformed = diagnostics.malformed_reports,
        rejected_passes = diagnostics.rejected_passes,
        rejected_requests = diagnostics.rejected_requests,
        "run finished"
    );

    if !cli.quiet {
        for r in &reports {
            println!("{r}");
        }
        println!();
    }
    println!("{summary}");

    if let Some(ref path) = cli.telemetry_out {
        if let Err(e) = export_csv(&reports, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Telemetry written to {path}");
    }

    #[cfg(feature = "api")]
    if cli.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(energy_grid::api::AppState {
            config: scenario,
            summary,
            reports,
        });
        let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
        let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("error: failed to create tokio runtime: {e}");
            process::exit(1);
        });
        if let Err(e) = rt.block_on(energy_grid::api::serve(state, addr)) {
            eprintln!("error: server failed on {addr}: {e}");
            process::exit(1);
        }
    }
}
