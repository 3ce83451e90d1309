//! Config-driven construction and execution of an algorithm comparison.

use std::thread;

use serde::Serialize;
use tracing::info;

use crate::config::{AlgorithmConfig, AlgorithmKind, ConfigError, ScenarioConfig};
use crate::control::ValueTable;
use crate::error::SimError;
use crate::physics::{
    BatteryState, DisturbanceProcess, LoadModel, OcvCurve, PhysicsEngine, SensorNoise,
    ThermalModel,
};
use crate::sim::controller::{AlwaysOn, Algorithm, Controller, PatternAdaptive, TimerBased};
use crate::sim::demand::{DemandPattern, generate_requests};
use crate::sim::engine::Engine;
use crate::sim::kpi::AlgorithmReport;
use crate::sim::naheo::NaheoController;
use crate::sim::types::{SimConfig, TickRecord};

/// How to execute a comparison.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run each algorithm on its own scoped thread.
    pub parallel: bool,
    /// Value table to seed every `naheo_controller` with instead of
    /// pretraining.
    pub table: Option<ValueTable>,
}

/// Scenario facts repeated in the report header.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    pub pattern: DemandPattern,
    pub duration_ticks: usize,
    pub tick_s: f64,
    pub seed: u64,
    pub requests_total: usize,
}

/// Result of running every configured algorithm on one scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub scenario: ScenarioSummary,
    /// Name of the algorithm the relative metrics refer to.
    pub baseline: Option<String>,
    /// One report per algorithm, in config order.
    pub reports: Vec<AlgorithmReport>,
    /// Tick records, aligned with `reports`.
    #[serde(skip)]
    pub traces: Vec<Vec<TickRecord>>,
    /// Value table learned by the first `naheo_controller`, if any.
    #[serde(skip)]
    pub table: Option<ValueTable>,
}

impl ComparisonReport {
    pub fn report(&self, name: &str) -> Option<&AlgorithmReport> {
        self.reports.iter().find(|r| r.name == name)
    }

    /// Tick records of the named algorithm.
    pub fn trace(&self, name: &str) -> Option<&[TickRecord]> {
        self.reports
            .iter()
            .position(|r| r.name == name)
            .and_then(|i| self.traces.get(i))
            .map(Vec::as_slice)
    }
}

/// Timing derived from the `[simulation]` section.
pub fn build_sim_config(cfg: &ScenarioConfig) -> SimConfig {
    let s = &cfg.simulation;
    SimConfig::new(s.duration_ticks, s.tick_s, s.seed).starting_at(s.start_time_s)
}

/// A fresh digital twin. Every algorithm gets its own copy built from the
/// same seed, so all of them face identical disturbances and noise.
pub fn build_physics(cfg: &ScenarioConfig) -> PhysicsEngine {
    let b = &cfg.battery;
    let t = &cfg.thermal;
    let d = &cfg.disturbance;
    let seed = cfg.simulation.seed;
    PhysicsEngine::new(
        seed,
        cfg.simulation.tick_s,
        BatteryState::new(
            b.capacity_mah,
            b.initial_soc,
            b.internal_resistance_ohm,
            b.aging_per_ah,
            OcvCurve::new(b.ocv_curve.clone()),
        ),
        ThermalModel::new(
            t.initial_c,
            t.ambient_c,
            t.thermal_mass_j_per_c,
            t.cooling_rate_per_s,
        ),
        load_model(cfg),
        SensorNoise {
            voltage_std_v: cfg.sensors.voltage_noise_std_v,
            temperature_std_c: cfg.sensors.temperature_noise_std_c,
        },
        DisturbanceProcess::new(
            seed,
            d.rate_per_tick,
            (d.magnitude_min_a, d.magnitude_max_a),
            (d.duration_min_ticks, d.duration_max_ticks),
        ),
    )
}

fn load_model(cfg: &ScenarioConfig) -> LoadModel {
    let l = &cfg.load;
    LoadModel {
        load_resistance_ohm: l.load_resistance_ohm,
        cpu_active_a: l.cpu_active_a,
        cpu_sleep_a: l.cpu_sleep_a,
        cpu_voltage_v: l.cpu_voltage_v,
    }
}

/// Builds the controller for one `[[algorithms]]` entry.
pub fn build_algorithm(
    alg: &AlgorithmConfig,
    cfg: &ScenarioConfig,
    table: Option<ValueTable>,
) -> Algorithm {
    match &alg.kind {
        AlgorithmKind::AlwaysOn(p) => Algorithm::AlwaysOn(AlwaysOn::new(&alg.name, *p)),
        AlgorithmKind::TimerBased(p) => {
            Algorithm::TimerBased(TimerBased::new(&alg.name, p.clone()))
        }
        AlgorithmKind::NaheoAdaptive(p) => {
            Algorithm::PatternAdaptive(PatternAdaptive::new(&alg.name, *p))
        }
        AlgorithmKind::NaheoController(p) => Algorithm::Naheo(Box::new(NaheoController::new(
            &alg.name,
            p.as_ref().clone(),
            table,
            cfg.simulation.seed,
            OcvCurve::new(cfg.battery.ocv_curve.clone()),
        ))),
    }
}

/// Rejects a carried-over value table whose shape does not fit a learner.
fn check_table(cfg: &ScenarioConfig, table: &ValueTable) -> Vec<ConfigError> {
    cfg.algorithms
        .iter()
        .enumerate()
        .filter_map(|(i, alg)| match &alg.kind {
            AlgorithmKind::NaheoController(p)
                if !table.is_compatible(p.learner.bins, &p.learner.actions) =>
            {
                Some(ConfigError::new(
                    format!("algorithms[{i}].parameters.learner"),
                    format!(
                        "loaded value table has {} bins and actions {:?}, learner expects {} bins and actions {:?}",
                        table.bins(),
                        table.actions(),
                        p.learner.bins,
                        p.learner.actions
                    ),
                ))
            }
            _ => None,
        })
        .collect()
}

/// Finished run of one algorithm.
struct AlgorithmRun {
    report: AlgorithmReport,
    records: Vec<TickRecord>,
    table: Option<ValueTable>,
}

fn run_algorithm(
    alg: &AlgorithmConfig,
    cfg: &ScenarioConfig,
    sim: &SimConfig,
    requests: &[bool],
    table: Option<ValueTable>,
) -> AlgorithmRun {
    let controller = build_algorithm(alg, cfg, table);
    let mut engine = Engine::new(
        sim.clone(),
        build_physics(cfg),
        controller,
        requests.to_vec(),
        cfg.simulation.undervoltage_v,
    );
    let outcome = engine.run();
    let controller = engine.into_controller();
    let report = AlgorithmReport::from_records(
        &alg.name,
        controller.kind(),
        &outcome.records,
        sim.tick_s,
        outcome.status,
        controller.bookkeeping(),
    );
    info!(
        algorithm = %alg.name,
        energy_j = report.total_energy_j,
        quality_pct = report.quality_pct,
        completed = report.status.is_completed(),
        "algorithm finished"
    );
    AlgorithmRun {
        report,
        records: outcome.records,
        table: controller.into_table(),
    }
}

/// Runs every configured algorithm against the same request trace and
/// disturbance realisation.
///
/// A battery failure in one algorithm is recorded in its report and does
/// not stop the others.
///
/// # Errors
///
/// Returns [`SimError::Config`] with every problem found if the scenario is
/// invalid or `options.table` does not fit a configured learner.
pub fn run_comparison(
    cfg: &ScenarioConfig,
    options: &RunOptions,
) -> Result<ComparisonReport, SimError> {
    let mut errors = cfg.validate();
    if let Some(table) = &options.table {
        errors.extend(check_table(cfg, table));
    }
    if !errors.is_empty() {
        return Err(SimError::Config(errors));
    }

    let sim = build_sim_config(cfg);
    let requests = generate_requests(cfg.simulation.pattern, &cfg.demand, &sim);
    info!(
        pattern = cfg.simulation.pattern.name(),
        ticks = sim.duration_ticks,
        seed = sim.seed,
        algorithms = cfg.algorithms.len(),
        requests = requests.iter().filter(|&&r| r).count(),
        "running scenario"
    );

    let runs: Vec<AlgorithmRun> = if options.parallel {
        thread::scope(|scope| {
            let handles: Vec<_> = cfg
                .algorithms
                .iter()
                .map(|alg| {
                    let sim = &sim;
                    let requests = &requests;
                    let table = options.table.clone();
                    scope.spawn(move || run_algorithm(alg, cfg, sim, requests, table))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
                .collect()
        })
    } else {
        cfg.algorithms
            .iter()
            .map(|alg| run_algorithm(alg, cfg, &sim, &requests, options.table.clone()))
            .collect()
    };

    let mut reports = Vec::with_capacity(runs.len());
    let mut traces = Vec::with_capacity(runs.len());
    let mut table = None;
    for run in runs {
        reports.push(run.report);
        traces.push(run.records);
        if table.is_none() {
            table = run.table;
        }
    }

    let baseline = cfg.baseline_name().map(str::to_string);
    if let Some(base) = baseline
        .as_deref()
        .and_then(|name| reports.iter().find(|r| r.name == name))
        .cloned()
    {
        for report in &mut reports {
            report.compare_to(&base);
        }
    }

    Ok(ComparisonReport {
        scenario: ScenarioSummary {
            pattern: cfg.simulation.pattern,
            duration_ticks: sim.duration_ticks,
            tick_s: sim.tick_s,
            seed: sim.seed,
            requests_total: requests.iter().filter(|&&r| r).count(),
        },
        baseline,
        reports,
        traces,
        table,
    })
}
