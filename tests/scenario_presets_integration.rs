use std::process::Command;

#[derive(Debug)]
struct AlgorithmLine {
    energy_j: f64,
    quality_pct: f64,
}

#[test]
fn scenario_files_run_via_cli_and_produce_distinct_dynamics() {
    let standard = run_and_parse("scenarios/standard.toml", &["--duration", "900"]);
    let low = run_and_parse("scenarios/low_battery.toml", &["--duration", "900"]);
    let stress = run_and_parse("scenarios/high_stress.toml", &["--duration", "900"]);

    // Always-On draws a fixed power regardless of the pack.
    assert_eq!(standard[0].energy_j, 9000.0);
    assert_eq!(low[0].energy_j, 9000.0);
    assert_eq!(stress[0].energy_j, 9000.0);

    for set in [&standard, &low, &stress] {
        assert_eq!(set.len(), 4);
        for line in set.iter().skip(1) {
            assert!(line.energy_j < set[0].energy_j);
            assert!((0.0..=100.0).contains(&line.quality_pct));
        }
    }
}

#[test]
fn json_scenario_runs_via_cli() {
    let lines = run_and_parse("scenarios/naheo_only.json", &[]);
    assert_eq!(lines.len(), 2);
    assert!(lines[1].energy_j < lines[0].energy_j);
}

#[test]
fn bursty_scenario_runs_via_cli() {
    let lines = run_and_parse("scenarios/bursty.toml", &["--duration", "600"]);
    assert_eq!(lines.len(), 4);
}

fn run_and_parse(path: &str, extra: &[&str]) -> Vec<AlgorithmLine> {
    let output = Command::new(env!("CARGO_BIN_EXE_naheo-sim"))
        .args(["--scenario", path])
        .args(extra)
        .env("RUST_LOG", "warn")
        .output()
        .expect("naheo-sim process should run");

    assert!(
        output.status.success(),
        "scenario run failed for {path}: stderr={} ",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout should be valid UTF-8");
    parse_blocks(&stdout)
}

/// One entry per `--- name (kind) ---` block, in output order.
fn parse_blocks(stdout: &str) -> Vec<AlgorithmLine> {
    let mut lines = Vec::new();
    let mut energy = None;
    for line in stdout.lines() {
        let line = line.trim_start();
        if line.starts_with("--- ") {
            energy = None;
        } else if line.starts_with("Total energy:") {
            energy = Some(parse_metric(line, "J"));
        } else if line.starts_with("Service quality:") {
            let raw = line
                .split_once(':')
                .map(|(_, right)| right.trim())
                .unwrap_or_else(|| panic!("invalid metric line `{line}`"));
            let pct = raw
                .split_once('%')
                .and_then(|(v, _)| v.trim().parse::<f64>().ok())
                .unwrap_or_else(|| panic!("invalid quality in `{line}`"));
            lines.push(AlgorithmLine {
                energy_j: energy.unwrap_or_else(|| panic!("quality before energy: {stdout}")),
                quality_pct: pct,
            });
        }
    }
    lines
}

fn parse_metric(line: &str, unit: &str) -> f64 {
    let raw = line
        .split_once(':')
        .map(|(_, right)| right.trim())
        .unwrap_or_else(|| panic!("invalid metric format for line `{line}`"));
    raw.trim_end_matches(unit)
        .trim()
        .parse::<f64>()
        .unwrap_or_else(|_| panic!("metric is not numeric in `{line}`"))
}
