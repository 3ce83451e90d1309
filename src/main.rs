//! naheo-sim entry point: CLI wiring, scenario loading, and output.

use std::fs;
use std::process;

use tracing::info;

use naheo_sim::cli::{self, CliOptions};
use naheo_sim::config::ScenarioConfig;
use naheo_sim::error::SimError;
use naheo_sim::io::export::{export_json_report, export_traces};
use naheo_sim::io::table::{load_table, save_table};
use naheo_sim::reporting::print_comparison;
use naheo_sim::runner::{ComparisonReport, RunOptions, run_comparison};
use naheo_sim::telemetry::init_tracing;

/// Scenario from `--scenario` or `--preset`, with command-line overrides applied.
fn load_scenario(opts: &CliOptions) -> Result<ScenarioConfig, SimError> {
    let mut scenario = if let Some(path) = &opts.scenario {
        ScenarioConfig::from_file(path)?
    } else {
        ScenarioConfig::from_preset(opts.preset.as_deref().unwrap_or("standard"))?
    };
    if let Some(seed) = opts.seed {
        scenario.simulation.seed = seed;
    }
    if let Some(ticks) = opts.duration {
        scenario.simulation.duration_ticks = ticks;
    }
    if let Some(pattern) = opts.pattern {
        scenario.simulation.pattern = pattern;
    }
    Ok(scenario)
}

fn write_outputs(opts: &CliOptions, report: &ComparisonReport) -> Result<(), SimError> {
    if let Some(dir) = &opts.telemetry_out {
        let paths = export_traces(report, dir)?;
        info!(files = paths.len(), dir = %dir.display(), "telemetry written");
    }
    if let Some(path) = &opts.report_out {
        export_json_report(report, path)?;
        info!(path = %path.display(), "report written");
    }
    if let Some(path) = &opts.save_table {
        match &report.table {
            Some(table) => {
                save_table(table, path)?;
                info!(path = %path.display(), "value table saved");
            }
            None => tracing::warn!("--save-table given but no naheo_controller ran"),
        }
    }
    Ok(())
}

fn run(opts: &CliOptions) -> Result<(), SimError> {
    if let Some(path) = &opts.create_config {
        fs::write(path, ScenarioConfig::standard().to_json_pretty()?)?;
        info!(path = %path.display(), "default scenario written");
        return Ok(());
    }

    let scenario = load_scenario(opts)?;
    let table = opts.load_table.as_deref().map(load_table).transpose()?;
    let options = RunOptions {
        parallel: opts.parallel,
        table,
    };
    let report = run_comparison(&scenario, &options)?;

    print_comparison(&report);
    write_outputs(opts, &report)?;

    #[cfg(feature = "api")]
    if opts.serve {
        use std::net::SocketAddr;
        use std::sync::Arc;

        let state = Arc::new(naheo_sim::api::AppState { report });
        let addr = SocketAddr::from(([0, 0, 0, 0], opts.port));
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(naheo_sim::api::serve(state, addr))?;
    }
    Ok(())
}

fn main() {
    init_tracing();

    let opts = match cli::parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("error: {e}");
            cli::print_usage();
            process::exit(1);
        }
    };
    if opts.help {
        cli::print_usage();
        return;
    }

    if let Err(e) = run(&opts) {
        if let SimError::Config(errors) = &e {
            for err in errors {
                eprintln!("{err}");
            }
        } else {
            eprintln!("error: {e}");
        }
        process::exit(1);
    }
}
