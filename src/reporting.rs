use std::fmt::Write;

use crate::runner::ComparisonReport;

/// Renders the comparison as a summary table followed by one detail block
/// per algorithm.
pub fn render_comparison(report: &ComparisonReport) -> String {
    let mut out = String::new();
    let s = &report.scenario;
    let _ = writeln!(out, "=== Scenario: {} ===", s.pattern.name());
    let _ = writeln!(
        out,
        "{} ticks of {} s, seed {}, {} requests",
        s.duration_ticks, s.tick_s, s.seed, s.requests_total
    );
    if let Some(base) = &report.baseline {
        let _ = writeln!(out, "Baseline: {base}");
    }
    let _ = writeln!(out);

    let width = report
        .reports
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0)
        .max("Algorithm".len());
    let _ = writeln!(
        out,
        "{:<width$}  {:>10}  {:>8}  {:>8}  {:>8}  {:>9}  {:>9}  {}",
        "Algorithm", "Energy J", "Quality", "Active", "Wakeups", "Savings", "dQuality", "Status"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + 80));
    for r in &report.reports {
        let savings = r
            .energy_savings_pct
            .map_or_else(|| "-".to_string(), |v| format!("{v:+.1}%"));
        let delta = r
            .quality_delta_pts
            .map_or_else(|| "-".to_string(), |v| format!("{v:+.1}"));
        let status = if r.status.is_completed() { "ok" } else { "FAILED" };
        let _ = writeln!(
            out,
            "{:<width$}  {:>10.1}  {:>7.1}%  {:>7.1}%  {:>8}  {:>9}  {:>9}  {}",
            r.name, r.total_energy_j, r.quality_pct, r.active_pct, r.wakeups, savings, delta, status
        );
    }

    for r in &report.reports {
        let _ = writeln!(out);
        let _ = writeln!(out, "{r}");
    }

    if let Some(table) = &report.table {
        let policy: Vec<String> = table
            .greedy_policy()
            .iter()
            .map(|l| format!("{l}"))
            .collect();
        let _ = writeln!(out);
        let _ = writeln!(out, "Learned aggressiveness by SoC bin: [{}]", policy.join(", "));
    }
    out
}

pub fn print_comparison(report: &ComparisonReport) {
    print!("{}", render_comparison(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScenarioConfig;
    use crate::runner::{RunOptions, run_comparison};

    #[test]
    fn table_lists_every_algorithm() {
        let mut cfg = ScenarioConfig::standard();
        cfg.simulation.duration_ticks = 60;
        let report = run_comparison(&cfg, &RunOptions::default()).unwrap();
        let text = render_comparison(&report);
        assert!(text.starts_with("=== Scenario: steady_daily ==="));
        for name in ["Always-On", "Timer-Based", "NAHEO-Adaptive", "NAHEO-Controller"] {
            assert!(text.contains(name), "missing {name}");
        }
        assert!(text.contains("Baseline: Always-On"));
        assert!(text.contains("Learned aggressiveness"));
    }
}
