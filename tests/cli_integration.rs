//! Command-line behaviour of the `naheo-sim` binary.

mod common;

use std::process::{Command, Output};

use naheo_sim::config::ScenarioConfig;

fn naheo(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_naheo-sim"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("naheo-sim process should run")
}

#[test]
fn preset_run_prints_report_to_stdout() {
    let out = naheo(&["--preset", "standard", "--duration", "120"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("=== Scenario: steady_daily ==="));
    assert!(stdout.contains("--- NAHEO-Controller (naheo_controller) ---"));
}

#[test]
fn outputs_are_written() {
    let dir = common::scratch_dir("cli-outputs");
    let traces = dir.join("traces");
    let report = dir.join("report.json");
    let out = naheo(&[
        "--preset",
        "bursty",
        "--duration",
        "90",
        "--telemetry-out",
        traces.to_str().unwrap(),
        "--report-out",
        report.to_str().unwrap(),
    ]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));

    for file in ["always-on.csv", "timer-based.csv", "naheo-adaptive.csv", "naheo-controller.csv"] {
        let csv = std::fs::read_to_string(traces.join(file)).expect("trace should exist");
        assert_eq!(csv.lines().count(), 91, "{file}");
    }
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["scenario"]["pattern"], "bursty");
    assert_eq!(json["reports"].as_array().map(Vec::len), Some(4));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn create_config_round_trips() {
    let dir = common::scratch_dir("cli-create");
    let path = dir.join("default.json");
    let out = naheo(&["--create-config", path.to_str().unwrap()]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());

    let cfg = ScenarioConfig::from_file(&path).expect("written config should load");
    assert_eq!(cfg, ScenarioConfig::standard());

    let run = naheo(&["--scenario", path.to_str().unwrap(), "--duration", "30"]);
    assert!(run.status.success(), "stderr: {}", String::from_utf8_lossy(&run.stderr));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn value_table_carries_between_runs() {
    let dir = common::scratch_dir("cli-table");
    let table = dir.join("table.json");
    let first = naheo(&["--duration", "120", "--save-table", table.to_str().unwrap()]);
    assert!(first.status.success());
    assert!(table.exists());

    let second = naheo(&[
        "--preset",
        "low_battery",
        "--duration",
        "120",
        "--load-table",
        table.to_str().unwrap(),
    ]);
    assert!(second.status.success(), "stderr: {}", String::from_utf8_lossy(&second.stderr));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn invalid_scenario_lists_field_paths() {
    let dir = common::scratch_dir("cli-invalid");
    let path = dir.join("bad.toml");
    std::fs::write(
        &path,
        r#"
[simulation]
tick_s = 0.0

[[algorithms]]
name = "timer"
type = "timer_based"
parameters = { schedule = [[100.0, 50.0]] }
"#,
    )
    .unwrap();

    let out = naheo(&["--scenario", path.to_str().unwrap()]);
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("simulation.tick_s"), "{stderr}");
    assert!(stderr.contains("algorithms[0].parameters.schedule[0]"), "{stderr}");
    assert!(out.stdout.is_empty());
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn bad_arguments_exit_with_one() {
    assert_eq!(naheo(&["--frobnicate"]).status.code(), Some(1));
    assert_eq!(naheo(&["--preset", "nonexistent"]).status.code(), Some(1));
    assert_eq!(naheo(&["--scenario", "/no/such/file.toml"]).status.code(), Some(1));
}

#[test]
fn help_exits_cleanly() {
    let out = naheo(&["--help"]);
    assert!(out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("Usage: naheo-sim"));
}
