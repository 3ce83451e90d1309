//! Scenario configuration (TOML or JSON), presets, and validation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::forecast::ForecastParams;
use crate::physics::OcvCurve;
use crate::sim::controller::{AdaptiveParams, AlwaysOnParams, PowerProfile, TimerParams};
use crate::sim::demand::{DemandParams, DemandPattern};
use crate::sim::naheo::NaheoParams;
use crate::sim::schedule::DailySchedule;
use crate::sim::types::SECONDS_PER_DAY;

/// Top-level scenario configuration.
///
/// All sections have defaults matching the standard scenario. Load with
/// [`ScenarioConfig::from_file`] or use [`ScenarioConfig::standard`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Timing, demand pattern, and global parameters.
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub battery: BatteryConfig,
    #[serde(default)]
    pub thermal: ThermalConfig,
    /// Actuated load and compute module.
    #[serde(default)]
    pub load: LoadConfig,
    /// Load spike process.
    #[serde(default)]
    pub disturbance: DisturbanceConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    /// Shape of the request patterns.
    #[serde(default)]
    pub demand: DemandParams,
    /// Algorithms to compare, in report order.
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<AlgorithmConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self::standard()
    }
}

/// Simulation timing and global parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Number of ticks to simulate (must be > 0).
    pub duration_ticks: usize,
    /// Tick length in seconds (must be > 0).
    pub tick_s: f64,
    /// Time of day at tick 0 (s since midnight).
    pub start_time_s: f64,
    pub pattern: DemandPattern,
    /// Master random seed.
    pub seed: u64,
    /// Sensed voltage below which requests cannot be served (V).
    pub undervoltage_v: f64,
    /// Algorithm the others are compared to. Defaults to the first
    /// `always_on` entry, or the first entry.
    pub baseline: Option<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration_ticks: 3600,
            tick_s: 1.0,
            // 08:30, so the first hour straddles the timer window
            start_time_s: 30_600.0,
            pattern: DemandPattern::SteadyDaily,
            seed: 42,
            undervoltage_v: 6.4,
            baseline: None,
        }
    }
}

/// Battery pack parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    pub capacity_mah: f64,
    /// Initial state of charge (0.0–1.0].
    pub initial_soc: f64,
    /// Internal resistance of a fresh pack (Ω).
    pub internal_resistance_ohm: f64,
    /// Fractional resistance growth per discharged Ah.
    pub aging_per_ah: f64,
    /// `(soc, volts)` breakpoints from SoC 0 to 1.
    pub ocv_curve: Vec<(f64, f64)>,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_mah: 2000.0,
            initial_soc: 1.0,
            internal_resistance_ohm: 0.3,
            aging_per_ah: 0.05,
            ocv_curve: OcvCurve::li_ion_2s().points().to_vec(),
        }
    }
}

/// Lumped thermal parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThermalConfig {
    pub initial_c: f64,
    pub ambient_c: f64,
    pub thermal_mass_j_per_c: f64,
    pub cooling_rate_per_s: f64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            initial_c: 25.0,
            ambient_c: 25.0,
            thermal_mass_j_per_c: 15.0,
            cooling_rate_per_s: 0.08,
        }
    }
}

/// Actuated load and compute module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub load_resistance_ohm: f64,
    pub cpu_active_a: f64,
    pub cpu_sleep_a: f64,
    pub cpu_voltage_v: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            load_resistance_ohm: 10.0,
            cpu_active_a: 0.15,
            cpu_sleep_a: 0.02,
            cpu_voltage_v: 3.3,
        }
    }
}

/// Load spike process parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DisturbanceConfig {
    /// Arrival probability per tick.
    pub rate_per_tick: f64,
    pub magnitude_min_a: f64,
    pub magnitude_max_a: f64,
    pub duration_min_ticks: usize,
    pub duration_max_ticks: usize,
}

impl Default for DisturbanceConfig {
    fn default() -> Self {
        Self {
            rate_per_tick: 0.01,
            magnitude_min_a: 0.3,
            magnitude_max_a: 1.2,
            duration_min_ticks: 5,
            duration_max_ticks: 30,
        }
    }
}

/// Sensor noise levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    pub voltage_noise_std_v: f64,
    pub temperature_noise_std_c: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            voltage_noise_std_v: 0.02,
            temperature_noise_std_c: 0.1,
        }
    }
}

/// One algorithm entry: `{ name, type, parameters }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAlgorithm", into = "RawAlgorithm")]
pub struct AlgorithmConfig {
    pub name: String,
    pub kind: AlgorithmKind,
}

impl AlgorithmConfig {
    pub fn new(name: impl Into<String>, kind: AlgorithmKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Algorithm type and its typed parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmKind {
    AlwaysOn(AlwaysOnParams),
    TimerBased(TimerParams),
    NaheoAdaptive(AdaptiveParams),
    NaheoController(Box<NaheoParams>),
}

impl AlgorithmKind {
    /// Accepted `type` tags.
    pub const TYPES: &[&str] = &["always_on", "timer_based", "naheo_adaptive", "naheo_controller"];

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::AlwaysOn(_) => "always_on",
            Self::TimerBased(_) => "timer_based",
            Self::NaheoAdaptive(_) => "naheo_adaptive",
            Self::NaheoController(_) => "naheo_controller",
        }
    }

    /// Rates the algorithm is charged at, tick by tick.
    pub fn power_profile(&self) -> PowerProfile {
        match self {
            Self::AlwaysOn(p) => p.power_profile(),
            Self::TimerBased(p) => p.power_profile(),
            Self::NaheoAdaptive(p) => p.power_profile(),
            Self::NaheoController(p) => p.power_profile(),
        }
    }
}

/// Wire shape of an algorithm entry, before the parameters are typed.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAlgorithm {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    parameters: serde_json::Value,
}

fn typed<T: serde::de::DeserializeOwned>(
    name: &str,
    parameters: serde_json::Value,
) -> Result<T, ConfigError> {
    let parameters = match parameters {
        serde_json::Value::Null => serde_json::Value::Object(serde_json::Map::new()),
        other => other,
    };
    serde_json::from_value(parameters)
        .map_err(|e| ConfigError::new(format!("algorithms.{name}.parameters"), e.to_string()))
}

impl TryFrom<RawAlgorithm> for AlgorithmConfig {
    type Error = ConfigError;

    fn try_from(raw: RawAlgorithm) -> Result<Self, Self::Error> {
        let kind = match raw.kind.as_str() {
            "always_on" => AlgorithmKind::AlwaysOn(typed(&raw.name, raw.parameters)?),
            "timer_based" => AlgorithmKind::TimerBased(typed(&raw.name, raw.parameters)?),
            "naheo_adaptive" => AlgorithmKind::NaheoAdaptive(typed(&raw.name, raw.parameters)?),
            "naheo_controller" => {
                AlgorithmKind::NaheoController(Box::new(typed(&raw.name, raw.parameters)?))
            }
            other => {
                return Err(ConfigError::new(
                    format!("algorithms.{}.type", raw.name),
                    format!(
                        "unknown algorithm type \"{other}\", available: {}",
                        AlgorithmKind::TYPES.join(", ")
                    ),
                ));
            }
        };
        Ok(Self {
            name: raw.name,
            kind,
        })
    }
}

impl From<AlgorithmConfig> for RawAlgorithm {
    fn from(cfg: AlgorithmConfig) -> Self {
        let parameters = match &cfg.kind {
            AlgorithmKind::AlwaysOn(p) => serde_json::to_value(p),
            AlgorithmKind::TimerBased(p) => serde_json::to_value(p),
            AlgorithmKind::NaheoAdaptive(p) => serde_json::to_value(p),
            AlgorithmKind::NaheoController(p) => serde_json::to_value(p.as_ref()),
        };
        Self {
            kind: cfg.kind.type_name().to_string(),
            name: cfg.name,
            parameters: parameters.unwrap_or_default(),
        }
    }
}

fn default_algorithms() -> Vec<AlgorithmConfig> {
    vec![
        AlgorithmConfig::new("Always-On", AlgorithmKind::AlwaysOn(AlwaysOnParams::default())),
        AlgorithmConfig::new("Timer-Based", AlgorithmKind::TimerBased(TimerParams::default())),
        AlgorithmConfig::new(
            "NAHEO-Adaptive",
            AlgorithmKind::NaheoAdaptive(AdaptiveParams::default()),
        ),
        AlgorithmConfig::new(
            "NAHEO-Controller",
            AlgorithmKind::NaheoController(Box::default()),
        ),
    ]
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"algorithms[1].parameters.schedule[0]"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Collects errors under a common path prefix.
struct Checker<'a> {
    errors: &'a mut Vec<ConfigError>,
    prefix: String,
}

impl<'a> Checker<'a> {
    fn new(errors: &'a mut Vec<ConfigError>, prefix: impl Into<String>) -> Self {
        Self {
            errors,
            prefix: prefix.into(),
        }
    }

    fn fail(&mut self, field: &str, message: impl Into<String>) {
        self.errors
            .push(ConfigError::new(format!("{}.{field}", self.prefix), message));
    }

    fn positive(&mut self, field: &str, v: f64) {
        if !(v.is_finite() && v > 0.0) {
            self.fail(field, "must be > 0");
        }
    }

    fn non_negative(&mut self, field: &str, v: f64) {
        if !(v.is_finite() && v >= 0.0) {
            self.fail(field, "must be >= 0");
        }
    }

    fn unit(&mut self, field: &str, v: f64) {
        if !(0.0..=1.0).contains(&v) {
            self.fail(field, "must be in [0.0, 1.0]");
        }
    }
}

impl ScenarioConfig {
    /// The standard scenario: full pack, moderate disturbances, steady
    /// daily demand, all four algorithms.
    pub fn standard() -> Self {
        Self {
            simulation: SimulationConfig::default(),
            battery: BatteryConfig::default(),
            thermal: ThermalConfig::default(),
            load: LoadConfig::default(),
            disturbance: DisturbanceConfig::default(),
            sensors: SensorConfig::default(),
            demand: DemandParams::default(),
            algorithms: default_algorithms(),
        }
    }

    /// Pack starts at 30% charge; the run is shortened so the always-on
    /// baseline still finishes.
    pub fn low_battery() -> Self {
        Self {
            simulation: SimulationConfig {
                duration_ticks: 1800,
                ..SimulationConfig::default()
            },
            battery: BatteryConfig {
                initial_soc: 0.3,
                ..BatteryConfig::default()
            },
            ..Self::standard()
        }
    }

    /// Three times the disturbance rate with larger spikes.
    pub fn high_stress() -> Self {
        Self {
            disturbance: DisturbanceConfig {
                rate_per_tick: 0.03,
                magnitude_min_a: 0.5,
                magnitude_max_a: 1.5,
                ..DisturbanceConfig::default()
            },
            ..Self::standard()
        }
    }

    /// Alternating idle and burst phases of user demand.
    pub fn bursty() -> Self {
        Self {
            simulation: SimulationConfig {
                pattern: DemandPattern::Bursty,
                ..SimulationConfig::default()
            },
            ..Self::standard()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &["standard", "low_battery", "high_stress", "bursty"];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "standard" => Ok(Self::standard()),
            "low_battery" => Ok(Self::low_battery()),
            "high_stress" => Ok(Self::high_stress()),
            "bursty" => Ok(Self::bursty()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario file; `.json` files are read as JSON, anything
    /// else as TOML.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_toml_str(&content)
        }
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Parses a scenario from a JSON string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the JSON is invalid or contains unknown fields.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::new("json", e.to_string()))
    }

    /// Pretty-printed JSON, the format `--create-config` writes.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Name of the algorithm the others are compared to.
    pub fn baseline_name(&self) -> Option<&str> {
        if let Some(name) = &self.simulation.baseline {
            return Some(name);
        }
        self.algorithms
            .iter()
            .find(|a| matches!(a.kind, AlgorithmKind::AlwaysOn(_)))
            .or_else(|| self.algorithms.first())
            .map(|a| a.name.as_str())
    }

    /// Validates all fields and returns every error found.
    ///
    /// Returns an empty vector if the configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let s = &self.simulation;
        let mut c = Checker::new(&mut errors, "simulation");
        if s.duration_ticks == 0 {
            c.fail("duration_ticks", "must be > 0");
        }
        c.positive("tick_s", s.tick_s);
        if !(0.0..SECONDS_PER_DAY).contains(&s.start_time_s) {
            c.fail("start_time_s", format!("must be in [0, {SECONDS_PER_DAY})"));
        }
        c.non_negative("undervoltage_v", s.undervoltage_v);
        if let Some(name) = &s.baseline {
            if !self.algorithms.iter().any(|a| &a.name == name) {
                c.fail("baseline", format!("no algorithm named \"{name}\""));
            }
        }

        let b = &self.battery;
        let mut c = Checker::new(&mut errors, "battery");
        c.positive("capacity_mah", b.capacity_mah);
        if !(b.initial_soc > 0.0 && b.initial_soc <= 1.0) {
            c.fail("initial_soc", "must be in (0.0, 1.0]");
        }
        c.positive("internal_resistance_ohm", b.internal_resistance_ohm);
        c.non_negative("aging_per_ah", b.aging_per_ah);
        if let Some(msg) = OcvCurve::check(&b.ocv_curve) {
            c.fail("ocv_curve", msg);
        }

        let t = &self.thermal;
        let mut c = Checker::new(&mut errors, "thermal");
        c.positive("thermal_mass_j_per_c", t.thermal_mass_j_per_c);
        c.non_negative("cooling_rate_per_s", t.cooling_rate_per_s);

        let l = &self.load;
        let mut c = Checker::new(&mut errors, "load");
        c.positive("load_resistance_ohm", l.load_resistance_ohm);
        c.non_negative("cpu_active_a", l.cpu_active_a);
        c.non_negative("cpu_sleep_a", l.cpu_sleep_a);
        c.non_negative("cpu_voltage_v", l.cpu_voltage_v);

        let d = &self.disturbance;
        let mut c = Checker::new(&mut errors, "disturbance");
        c.unit("rate_per_tick", d.rate_per_tick);
        c.non_negative("magnitude_min_a", d.magnitude_min_a);
        if d.magnitude_min_a > d.magnitude_max_a {
            c.fail("magnitude_min_a", "must be <= disturbance.magnitude_max_a");
        }
        if d.duration_min_ticks == 0 {
            c.fail("duration_min_ticks", "must be >= 1");
        }
        if d.duration_min_ticks > d.duration_max_ticks {
            c.fail("duration_min_ticks", "must be <= disturbance.duration_max_ticks");
        }

        let n = &self.sensors;
        let mut c = Checker::new(&mut errors, "sensors");
        c.non_negative("voltage_noise_std_v", n.voltage_noise_std_v);
        c.non_negative("temperature_noise_std_c", n.temperature_noise_std_c);

        self.validate_demand(&mut errors);
        self.validate_algorithms(&mut errors);
        errors
    }

    fn validate_demand(&self, errors: &mut Vec<ConfigError>) {
        let d = &self.demand;
        let mut c = Checker::new(errors, "demand");
        if d.hourly_probability.len() != 24 {
            c.fail(
                "hourly_probability",
                format!("must have 24 entries, got {}", d.hourly_probability.len()),
            );
        }
        for (i, &p) in d.hourly_probability.iter().enumerate() {
            c.unit(&format!("hourly_probability[{i}]"), p);
        }
        c.non_negative("probability_noise_std", d.probability_noise_std);
        if d.period_ticks == 0 {
            c.fail("period_ticks", "must be > 0");
        }
        c.unit("random_rate", d.random_rate);
        c.unit("bursty_burst_rate", d.bursty_burst_rate);
        c.unit("bursty_idle_rate", d.bursty_idle_rate);
    }

    fn validate_algorithms(&self, errors: &mut Vec<ConfigError>) {
        if self.algorithms.is_empty() {
            errors.push(ConfigError::new("algorithms", "at least one algorithm is required"));
        }
        let mut seen = HashSet::new();
        for (i, alg) in self.algorithms.iter().enumerate() {
            let mut c = Checker::new(errors, format!("algorithms[{i}]"));
            if alg.name.trim().is_empty() {
                c.fail("name", "must not be empty");
            } else if !seen.insert(alg.name.as_str()) {
                c.fail("name", format!("duplicate algorithm name \"{}\"", alg.name));
            }

            let mut c = Checker::new(errors, format!("algorithms[{i}].parameters"));
            match &alg.kind {
                AlgorithmKind::AlwaysOn(p) => {
                    c.non_negative("active_power_w", p.active_power_w);
                    c.unit("duty_cycle", p.duty_cycle);
                }
                AlgorithmKind::TimerBased(p) => {
                    for (j, &w) in p.schedule.iter().enumerate() {
                        if let Some(msg) = DailySchedule::check_window(w) {
                            c.fail(&format!("schedule[{j}]"), msg);
                        }
                    }
                    c.non_negative("active_power_w", p.active_power_w);
                    c.non_negative("idle_power_w", p.idle_power_w);
                    c.unit("active_duty", p.active_duty);
                    c.unit("idle_duty", p.idle_duty);
                }
                AlgorithmKind::NaheoAdaptive(p) => {
                    c.non_negative("active_power_w", p.active_power_w);
                    c.non_negative("idle_power_w", p.idle_power_w);
                    c.non_negative("wake_cost_j", p.wake_cost_j);
                    c.unit("prediction_threshold", p.prediction_threshold);
                    c.unit("hold_threshold", p.hold_threshold);
                    c.unit("active_duty", p.active_duty);
                    c.unit("idle_duty", p.idle_duty);
                    validate_forecast(&mut c, &p.forecast);
                }
                AlgorithmKind::NaheoController(p) => validate_naheo(&mut c, p),
            }
        }
    }
}

fn validate_naheo(c: &mut Checker<'_>, p: &NaheoParams) {
    c.non_negative("active_power_w", p.active_power_w);
    c.non_negative("idle_power_w", p.idle_power_w);
    c.non_negative("wake_cost_j", p.wake_cost_j);
    if let Some(th) = p.prewake_threshold {
        c.unit("prewake_threshold", th);
    }

    let e = &p.estimator;
    c.non_negative("estimator.initial_current_var", e.initial_current_var);
    c.non_negative("estimator.initial_resistance_var", e.initial_resistance_var);
    c.non_negative("estimator.process_noise_current", e.process_noise_current);
    c.non_negative("estimator.process_noise_resistance", e.process_noise_resistance);
    c.non_negative("estimator.measurement_noise", e.measurement_noise);
    c.positive("estimator.min_resistance_ohm", e.min_resistance_ohm);
    if !(e.temperature_smoothing > 0.0 && e.temperature_smoothing <= 1.0) {
        c.fail("estimator.temperature_smoothing", "must be in (0.0, 1.0]");
    }

    let l = &p.learner;
    if l.bins == 0 {
        c.fail("learner.bins", "must be > 0");
    }
    if l.actions.is_empty() {
        c.fail("learner.actions", "must not be empty");
    }
    for (i, &a) in l.actions.iter().enumerate() {
        c.non_negative(&format!("learner.actions[{i}]"), a);
    }
    c.unit("learner.learning_rate", l.learning_rate);
    c.unit("learner.discount", l.discount);
    c.unit("learner.epsilon", l.epsilon);
    c.unit("learner.epsilon_decay", l.epsilon_decay);
    c.unit("learner.epsilon_min", l.epsilon_min);
    if let Some(msg) = l.penalty.check() {
        c.fail("learner.penalty", msg);
    }

    let x = &p.execution;
    if x.horizon == 0 {
        c.fail("execution.horizon", "must be >= 1");
    }
    c.unit("execution.horizon_discount", x.horizon_discount);
    c.positive("execution.nominal_voltage_v", x.nominal_voltage_v);
    c.unit("execution.duty_min", x.duty_min);
    c.unit("execution.duty_max", x.duty_max);
    if x.duty_min > x.duty_max {
        c.fail("execution.duty_min", "must be <= execution.duty_max");
    }
    c.non_negative("execution.trigger_threshold", x.trigger_threshold);
    c.non_negative("execution.disturbance_aggressiveness", x.disturbance_aggressiveness);

    c.unit("guardian.override_duty", p.guardian.override_duty);
    validate_forecast(c, &p.forecast);
}

fn validate_forecast(c: &mut Checker<'_>, f: &ForecastParams) {
    c.positive("forecast.bin_s", f.bin_s);
    c.unit("forecast.learning_rate", f.learning_rate);
    c.unit("forecast.prior", f.prior);
    c.unit("forecast.trend_weight", f.trend_weight);
    if f.trend_window > f.history_len {
        c.fail("forecast.trend_window", "must be <= forecast.history_len");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_preset_valid() {
        let errors = ScenarioConfig::standard().validate();
        assert!(errors.is_empty(), "standard should be valid: {errors:?}");
    }

    #[test]
    fn from_preset_unknown() {
        let e = ScenarioConfig::from_preset("nonexistent").unwrap_err();
        assert!(e.message.contains("unknown preset"));
    }

    #[test]
    fn all_presets_are_valid() {
        for name in ScenarioConfig::PRESETS {
            let cfg = ScenarioConfig::from_preset(name);
            assert!(cfg.is_ok(), "preset \"{name}\" should load");
            let errors = cfg.as_ref().map(|c| c.validate()).unwrap_or_default();
            assert!(errors.is_empty(), "preset \"{name}\" should be valid: {errors:?}");
        }
    }

    #[test]
    fn default_has_four_algorithms_with_always_on_baseline() {
        let cfg = ScenarioConfig::default();
        let kinds: Vec<_> = cfg.algorithms.iter().map(|a| a.kind.type_name()).collect();
        assert_eq!(kinds, AlgorithmKind::TYPES);
        assert_eq!(cfg.baseline_name(), Some("Always-On"));
    }

    #[test]
    fn valid_toml_parses() {
        let toml = r#"
[simulation]
duration_ticks = 600
seed = 99
pattern = "realistic"

[battery]
initial_soc = 0.5

[disturbance]
rate_per_tick = 0.02

[[algorithms]]
name = "base"
type = "always_on"

[[algorithms]]
name = "timer"
type = "timer_based"
parameters = { schedule = [[0, 3600]], idle_power_w = 0.5 }

[[algorithms]]
name = "naheo"
type = "naheo_controller"

[algorithms.parameters.learner]
bins = 4
pretrain_iterations = 100

[algorithms.parameters.learner.penalty]
kind = "linear"
intercept = 4.95
slope = 4.5
"#;
        let cfg = ScenarioConfig::from_toml_str(toml);
        assert!(cfg.is_ok(), "valid TOML should parse: {:?}", cfg.err());
        let cfg = cfg.unwrap();
        assert_eq!(cfg.simulation.duration_ticks, 600);
        assert_eq!(cfg.simulation.pattern, DemandPattern::SteadyDaily);
        assert_eq!(cfg.algorithms.len(), 3);
        match &cfg.algorithms[1].kind {
            AlgorithmKind::TimerBased(p) => {
                assert_eq!(p.schedule, vec![(0.0, 3600.0)]);
                assert_eq!(p.idle_power_w, 0.5);
                assert_eq!(p.active_power_w, 10.0);
            }
            other => panic!("unexpected {other:?}"),
        }
        match &cfg.algorithms[2].kind {
            AlgorithmKind::NaheoController(p) => {
                assert_eq!(p.learner.bins, 4);
                assert!(matches!(
                    p.learner.penalty,
                    crate::control::ScarcityPenalty::Linear { .. }
                ));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn json_algorithm_entries_parse() {
        let json = r#"{
            "simulation": { "duration_ticks": 120, "pattern": "random", "seed": 7 },
            "algorithms": [
                { "name": "Always-On", "type": "always_on", "parameters": { "active_power_w": 10.0 } },
                { "name": "NAHEO-Adaptive", "type": "naheo_adaptive",
                  "parameters": { "prediction_threshold": 0.6, "wake_cost_j": 2.0 } }
            ]
        }"#;
        let cfg = ScenarioConfig::from_json_str(json).unwrap();
        assert_eq!(cfg.simulation.pattern, DemandPattern::UniformRandom);
        assert_eq!(cfg.algorithms[1].kind.type_name(), "naheo_adaptive");
    }

    #[test]
    fn json_round_trips() {
        let cfg = ScenarioConfig::high_stress();
        let json = cfg.to_json_pretty().unwrap();
        let back = ScenarioConfig::from_json_str(&json).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn unknown_algorithm_type_rejected() {
        let toml = r#"
[[algorithms]]
name = "x"
type = "quantum"
"#;
        let err = ScenarioConfig::from_toml_str(toml).unwrap_err();
        assert!(err.message.contains("unknown algorithm type"));
    }

    #[test]
    fn unknown_parameter_rejected() {
        let toml = r#"
[[algorithms]]
name = "x"
type = "always_on"
parameters = { bogus = 1 }
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn invalid_toml_unknown_field() {
        let toml = r#"
[simulation]
duration_ticks = 24
bogus_field = true
"#;
        assert!(ScenarioConfig::from_toml_str(toml).is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let cfg = ScenarioConfig::from_toml_str("[simulation]\nseed = 99\n").unwrap();
        assert_eq!(cfg.simulation.seed, 99);
        assert_eq!(cfg.simulation.duration_ticks, 3600);
        assert_eq!(cfg.algorithms.len(), 4);
        assert_eq!(cfg.battery.capacity_mah, 2000.0);
    }

    #[test]
    fn validation_catches_zero_ticks() {
        let mut cfg = ScenarioConfig::standard();
        cfg.simulation.duration_ticks = 0;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.duration_ticks"));
    }

    #[test]
    fn validation_catches_invalid_soc() {
        let mut cfg = ScenarioConfig::standard();
        cfg.battery.initial_soc = 1.5;
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.initial_soc"));
    }

    #[test]
    fn validation_catches_bad_schedule_window() {
        let mut cfg = ScenarioConfig::standard();
        if let AlgorithmKind::TimerBased(p) = &mut cfg.algorithms[1].kind {
            p.schedule = vec![(0.0, 60.0), (7200.0, 3600.0)];
        }
        let errors = cfg.validate();
        assert!(
            errors
                .iter()
                .any(|e| e.field == "algorithms[1].parameters.schedule[1]"),
            "{errors:?}"
        );
    }

    #[test]
    fn validation_catches_bad_ocv_curve() {
        let mut cfg = ScenarioConfig::standard();
        cfg.battery.ocv_curve = vec![(0.0, 8.4), (1.0, 6.0)];
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "battery.ocv_curve"));
    }

    #[test]
    fn validation_catches_unknown_baseline_and_duplicates() {
        let mut cfg = ScenarioConfig::standard();
        cfg.simulation.baseline = Some("nobody".into());
        cfg.algorithms[1].name = cfg.algorithms[0].name.clone();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "simulation.baseline"));
        assert!(errors.iter().any(|e| e.field == "algorithms[1].name"));
    }

    #[test]
    fn validation_collects_every_error() {
        let mut cfg = ScenarioConfig::standard();
        cfg.simulation.tick_s = 0.0;
        cfg.disturbance.rate_per_tick = 2.0;
        if let AlgorithmKind::NaheoController(p) = &mut cfg.algorithms[3].kind {
            p.learner.bins = 0;
            p.execution.duty_min = 0.9;
            p.execution.duty_max = 0.2;
        }
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        for expected in [
            "simulation.tick_s",
            "disturbance.rate_per_tick",
            "algorithms[3].parameters.learner.bins",
            "algorithms[3].parameters.execution.duty_min",
        ] {
            assert!(fields.iter().any(|f| f == expected), "missing {expected}: {fields:?}");
        }
    }

    #[test]
    fn forecast_fields_are_checked_for_both_forecasting_algorithms() {
        let mut cfg = ScenarioConfig::standard();
        for alg in &mut cfg.algorithms {
            let forecast = match &mut alg.kind {
                AlgorithmKind::NaheoAdaptive(p) => &mut p.forecast,
                AlgorithmKind::NaheoController(p) => &mut p.forecast,
                _ => continue,
            };
            forecast.prior = 1.5;
            forecast.trend_weight = -0.1;
            forecast.trend_window = forecast.history_len + 1;
        }
        let fields: Vec<_> = cfg.validate().into_iter().map(|e| e.field).collect();
        for i in [2, 3] {
            for field in ["prior", "trend_weight", "trend_window"] {
                let expected = format!("algorithms[{i}].parameters.forecast.{field}");
                assert!(fields.contains(&expected), "missing {expected}: {fields:?}");
            }
        }
    }

    #[test]
    fn standard_hour_straddles_the_timer_window() {
        let cfg = ScenarioConfig::standard();
        let AlgorithmKind::TimerBased(p) = &cfg.algorithms[1].kind else {
            panic!("second standard algorithm should be the timer");
        };
        let schedule = DailySchedule::new(p.schedule.clone());
        let s = &cfg.simulation;
        let active = (0..s.duration_ticks)
            .map(|t| (s.start_time_s + t as f64 * s.tick_s) % SECONDS_PER_DAY)
            .filter(|&time_of_day| schedule.is_active(time_of_day))
            .count();
        assert!(active > 0 && active < s.duration_ticks, "{active} active ticks");
    }

    #[test]
    fn power_profile_follows_algorithm_parameters() {
        let cfg = ScenarioConfig::standard();
        let on = cfg.algorithms[0].kind.power_profile();
        assert_eq!(on.idle_power_w, on.active_power_w);
        let naheo = cfg.algorithms[3].kind.power_profile();
        assert_eq!(naheo.wake_cost_j, NaheoParams::default().wake_cost_j);
    }

    #[test]
    fn baseline_falls_back_to_first_algorithm() {
        let mut cfg = ScenarioConfig::standard();
        cfg.algorithms.remove(0);
        assert_eq!(cfg.baseline_name(), Some("Timer-Based"));
    }

    #[test]
    fn presets_differ_where_expected() {
        let base = ScenarioConfig::standard();
        assert!(ScenarioConfig::low_battery().battery.initial_soc < base.battery.initial_soc);
        assert!(ScenarioConfig::high_stress().disturbance.rate_per_tick > base.disturbance.rate_per_tick);
        assert_eq!(ScenarioConfig::bursty().simulation.pattern, DemandPattern::Bursty);
    }
}
