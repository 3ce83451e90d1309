//! Core simulation types: timing, per-tick controller contracts, and records.

use std::fmt;

use serde::Serialize;

use crate::physics::{SensorReading, TrueState};

/// Seconds in one simulated day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Centralized simulation timing.
///
/// # Examples
///
/// ```
/// use naheo_sim::sim::types::SimConfig;
///
/// let cfg = SimConfig::new(3600, 1.0, 42);
/// assert_eq!(cfg.total_ticks(), 3600);
/// assert_eq!(cfg.time_of_day_s(10), 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimConfig {
    /// Number of ticks to simulate.
    pub duration_ticks: usize,
    /// Length of one tick in seconds.
    pub tick_s: f64,
    /// Wall-clock time of day at tick 0 (s since midnight).
    pub start_time_s: f64,
    /// Master random seed for reproducibility.
    pub seed: u64,
}

impl SimConfig {
    /// Creates a new simulation configuration starting at midnight.
    ///
    /// # Arguments
    ///
    /// * `duration_ticks` - Number of ticks (must be > 0)
    /// * `tick_s` - Tick length in seconds (must be > 0)
    /// * `seed` - Master random seed
    ///
    /// # Panics
    ///
    /// Panics if `duration_ticks` is zero or `tick_s` is not positive.
    pub fn new(duration_ticks: usize, tick_s: f64, seed: u64) -> Self {
        assert!(duration_ticks > 0, "duration_ticks must be > 0");
        assert!(tick_s > 0.0, "tick_s must be > 0");
        Self {
            duration_ticks,
            tick_s,
            start_time_s: 0.0,
            seed,
        }
    }

    /// Same configuration with a different start time.
    pub fn starting_at(mut self, start_time_s: f64) -> Self {
        self.start_time_s = start_time_s;
        self
    }

    pub fn total_ticks(&self) -> usize {
        self.duration_ticks
    }

    /// Seconds since simulation start at `tick`.
    pub fn elapsed_s(&self, tick: usize) -> f64 {
        tick as f64 * self.tick_s
    }

    /// Seconds since midnight at `tick`.
    pub fn time_of_day_s(&self, tick: usize) -> f64 {
        (self.start_time_s + self.elapsed_s(tick)).rem_euclid(SECONDS_PER_DAY)
    }
}

/// What a controller knows when it decides.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    pub tick: usize,
    /// Seconds since simulation start.
    pub time_s: f64,
    /// Seconds since midnight.
    pub time_of_day_s: f64,
    /// A service request arrives this tick.
    pub request: bool,
    /// Sensor reading from the end of the previous tick.
    pub reading: SensorReading,
}

/// Per-tick internals of the adaptive controller, for telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlDiagnostics {
    pub estimated_current_a: f64,
    pub estimated_resistance_ohm: f64,
    /// λ used this tick, if the optimizer ran.
    pub aggressiveness: Option<f64>,
    pub effort: f64,
    pub overridden: bool,
    pub correction_skipped: bool,
}

/// A controller's answer for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Compute module runs at full power.
    pub active: bool,
    /// Load duty cycle to apply (0.0 to 1.0).
    pub duty_cycle: f64,
    pub diagnostics: Option<ControlDiagnostics>,
}

impl Decision {
    pub fn new(active: bool, duty_cycle: f64) -> Self {
        Self {
            active,
            duty_cycle,
            diagnostics: None,
        }
    }
}

/// What happened after a decision was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    pub tick: usize,
    /// Tick length in seconds.
    pub dt_s: f64,
    /// Seconds since midnight at the start of the tick.
    pub time_of_day_s: f64,
    pub request: bool,
    pub served: bool,
    pub active: bool,
    pub reading: SensorReading,
    pub truth: TrueState,
}

/// Complete record of one simulation tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickRecord {
    pub tick: usize,
    /// Seconds since simulation start.
    pub time_s: f64,
    pub request: bool,
    pub served: bool,
    pub active: bool,
    pub duty_cycle: f64,
    /// Power the controller accounts for this tick (W).
    pub power_w: f64,
    /// Cumulative accounted energy after this tick (J).
    pub energy_j: f64,
    /// Measured terminal voltage (V).
    pub voltage_v: f64,
    /// Measured temperature (°C).
    pub temperature_c: f64,
    pub soc: f64,
    pub true_current_a: f64,
    pub true_resistance_ohm: f64,
    pub true_temperature_c: f64,
    /// Electrical power drawn from the pack (W).
    pub battery_power_w: f64,
    pub disturbance: bool,
    pub diagnostics: Option<ControlDiagnostics>,
}

impl fmt::Display for TickRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>5} ({:>7.0}s) | {} duty={:.2} | P={:>5.2} W  E={:>9.1} J | \
             V={:.3} V  T={:.2} C  SoC={:.1}% | req={} served={} dist={}",
            self.tick,
            self.time_s,
            if self.active { "ACTIVE" } else { "sleep " },
            self.duty_cycle,
            self.power_w,
            self.energy_j,
            self.voltage_v,
            self.temperature_c,
            self.soc * 100.0,
            self.request,
            self.served,
            self.disturbance,
        )
    }
}
