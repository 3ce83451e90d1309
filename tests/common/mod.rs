//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use naheo_sim::config::ScenarioConfig;
use naheo_sim::runner::{ComparisonReport, RunOptions, run_comparison};

/// Standard scenario cut to `ticks`.
pub fn standard(ticks: usize) -> ScenarioConfig {
    let mut cfg = ScenarioConfig::standard();
    cfg.simulation.duration_ticks = ticks;
    cfg
}

/// Runs `cfg` sequentially without a carried-over table.
pub fn run(cfg: &ScenarioConfig) -> ComparisonReport {
    run_comparison(cfg, &RunOptions::default()).expect("scenario should run")
}

/// Fresh scratch directory under the system temp dir.
pub fn scratch_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("naheo-{label}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).expect("temp dir should be writable");
    dir
}
