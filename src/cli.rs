use std::env;
use std::path::PathBuf;

use crate::sim::demand::DemandPattern;

/// Parsed command line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOptions {
    pub scenario: Option<PathBuf>,
    pub preset: Option<String>,
    pub seed: Option<u64>,
    pub duration: Option<usize>,
    pub pattern: Option<DemandPattern>,
    /// Directory receiving one CSV trace per algorithm.
    pub telemetry_out: Option<PathBuf>,
    pub report_out: Option<PathBuf>,
    pub load_table: Option<PathBuf>,
    pub save_table: Option<PathBuf>,
    /// Write the default scenario as JSON here and exit.
    pub create_config: Option<PathBuf>,
    pub parallel: bool,
    pub help: bool,
    #[cfg(feature = "api")]
    pub serve: bool,
    #[cfg(feature = "api")]
    pub port: u16,
}

pub fn parse_args() -> Result<CliOptions, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliOptions, String> {
    let mut opts = CliOptions {
        #[cfg(feature = "api")]
        port: 3000,
        ..CliOptions::default()
    };
    let mut i = 0usize;

    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --scenario (expected a TOML or JSON file path)",
                )?;
                if opts.scenario.replace(PathBuf::from(path)).is_some() {
                    return Err("--scenario provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if opts.preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--seed" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --seed (expected a u64)")?;
                let seed = raw
                    .parse::<u64>()
                    .map_err(|_| format!("--seed value \"{raw}\" is not a valid u64"))?;
                opts.seed = Some(seed);
            }
            "--duration" => {
                i += 1;
                let raw =
                    args.next_or_err(i, "missing value for --duration (expected a tick count)")?;
                let ticks = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|&t| t > 0)
                    .ok_or_else(|| format!("--duration value \"{raw}\" is not a positive integer"))?;
                opts.duration = Some(ticks);
            }
            "--pattern" => {
                i += 1;
                let raw =
                    args.next_or_err(i, "missing value for --pattern (expected a pattern name)")?;
                let pattern = DemandPattern::from_name(raw).ok_or_else(|| {
                    format!(
                        "unknown pattern \"{raw}\", available: {}",
                        DemandPattern::NAMES.join(", ")
                    )
                })?;
                opts.pattern = Some(pattern);
            }
            "--telemetry-out" => {
                i += 1;
                let path = args.next_or_err(
                    i,
                    "missing value for --telemetry-out (expected a directory path)",
                )?;
                if opts.telemetry_out.replace(PathBuf::from(path)).is_some() {
                    return Err("--telemetry-out provided more than once".to_string());
                }
            }
            "--report-out" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --report-out (expected a file path)")?;
                opts.report_out = Some(PathBuf::from(path));
            }
            "--load-table" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --load-table (expected a file path)")?;
                opts.load_table = Some(PathBuf::from(path));
            }
            "--save-table" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --save-table (expected a file path)")?;
                opts.save_table = Some(PathBuf::from(path));
            }
            "--create-config" => {
                i += 1;
                let path = args
                    .next_or_err(i, "missing value for --create-config (expected a file path)")?;
                opts.create_config = Some(PathBuf::from(path));
            }
            "--parallel" => opts.parallel = true,
            #[cfg(feature = "api")]
            "--serve" => opts.serve = true,
            #[cfg(feature = "api")]
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                opts.port = raw
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
            }
            "--help" | "-h" => opts.help = true,
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if opts.scenario.is_some() && opts.preset.is_some() {
        return Err(
            "arguments `--scenario` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if opts.scenario.is_none() && opts.preset.is_none() {
        opts.preset = Some("standard".to_string());
    }

    Ok(opts)
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("naheo-sim: energy-aware controller comparison on a battery digital twin");
    eprintln!();
    eprintln!("Usage: naheo-sim [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario <path>        Load scenario from a TOML or JSON file");
    eprintln!("  --preset <name>          Built-in scenario (standard, low_battery, high_stress, bursty)");
    eprintln!("  --seed <u64>             Override random seed");
    eprintln!("  --duration <ticks>       Override run length");
    eprintln!("  --pattern <name>         Override demand pattern");
    eprintln!("  --telemetry-out <dir>    Write one CSV trace per algorithm");
    eprintln!("  --report-out <path>      Write the comparison report as JSON");
    eprintln!("  --load-table <path>      Start the learner from a saved value table");
    eprintln!("  --save-table <path>      Save the learned value table");
    eprintln!("  --create-config <path>   Write the default scenario as JSON and exit");
    eprintln!("  --parallel               Run algorithms on separate threads");
    #[cfg(feature = "api")]
    {
        eprintln!("  --serve                  Start REST API server after simulation");
        eprintln!("  --port <u16>             API server port (default: 3000)");
    }
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --scenario or --preset is given, the standard preset is used.");
    eprintln!("Set RUST_LOG to control log verbosity (default: info).");
}
