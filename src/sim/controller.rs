//! Controller contract and the baseline algorithms it is scored against.

use serde::{Deserialize, Serialize};

use crate::control::ValueTable;
use crate::forecast::{ActivityForecast, ForecastParams};
use crate::physics::SensorReading;

use super::naheo::NaheoController;
use super::schedule::DailySchedule;
use super::types::{Decision, TickContext, TickOutcome};

/// A power-management strategy driven by the simulation engine.
///
/// The engine calls [`Controller::decide`] before the physics step and
/// [`Controller::update`] after it, once per tick and in tick order.
pub trait Controller {
    /// Chooses compute mode and duty for this tick.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Tick timing, the current service request, and the sensor
    ///   reading from the end of the previous tick
    fn decide(&mut self, ctx: &TickContext) -> Decision;

    /// Learns from the tick that just ran.
    ///
    /// # Returns
    ///
    /// Energy in joules the controller accounts for this tick.
    fn update(&mut self, outcome: &TickOutcome) -> f64;

    /// Called once after the last tick, before metrics are produced.
    fn finish(&mut self, _last: &SensorReading) {}

    /// Running totals kept by the controller.
    fn bookkeeping(&self) -> &Bookkeeping;

    /// Display name used in reports.
    fn name(&self) -> &str;
}

/// Power drawn in each compute mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PowerProfile {
    pub active_power_w: f64,
    pub idle_power_w: f64,
    /// Charged once on every idle to active transition (J).
    pub wake_cost_j: f64,
}

impl Default for PowerProfile {
    fn default() -> Self {
        Self {
            active_power_w: 10.0,
            idle_power_w: 1.0,
            wake_cost_j: 0.0,
        }
    }
}

/// Energy and time totals accumulated tick by tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Bookkeeping {
    pub energy_j: f64,
    pub active_s: f64,
    pub idle_s: f64,
    /// Idle to active transitions.
    pub wakeups: usize,
    pub predictions_correct: usize,
    pub predictions_total: usize,
    #[serde(skip)]
    was_active: bool,
}

impl Bookkeeping {
    /// Accounts one tick and returns the energy it cost.
    pub fn charge(&mut self, profile: &PowerProfile, active: bool, dt_s: f64) -> f64 {
        let energy = if active {
            self.active_s += dt_s;
            let wake = if self.was_active {
                0.0
            } else {
                self.wakeups += 1;
                profile.wake_cost_j
            };
            profile.active_power_w * dt_s + wake
        } else {
            self.idle_s += dt_s;
            profile.idle_power_w * dt_s
        };
        self.was_active = active;
        self.energy_j += energy;
        energy
    }

    /// Scores an activity decision against whether a request arrived.
    pub fn record_prediction(&mut self, active: bool, request: bool) {
        if active == request {
            self.predictions_correct += 1;
        }
        self.predictions_total += 1;
    }

    /// Share of correct activity predictions, if any were made.
    pub fn prediction_accuracy(&self) -> Option<f64> {
        (self.predictions_total > 0)
            .then(|| self.predictions_correct as f64 / self.predictions_total as f64)
    }
}

/// Parameters of the always-on baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AlwaysOnParams {
    pub active_power_w: f64,
    pub duty_cycle: f64,
}

impl Default for AlwaysOnParams {
    fn default() -> Self {
        Self {
            active_power_w: 10.0,
            duty_cycle: 1.0,
        }
    }
}

impl AlwaysOnParams {
    /// Never idles, so both rates are the active rate and waking is free.
    pub fn power_profile(&self) -> PowerProfile {
        PowerProfile {
            active_power_w: self.active_power_w,
            idle_power_w: self.active_power_w,
            wake_cost_j: 0.0,
        }
    }
}

/// Never sleeps; the energy ceiling every other algorithm is compared to.
#[derive(Debug, Clone)]
pub struct AlwaysOn {
    name: String,
    params: AlwaysOnParams,
    profile: PowerProfile,
    book: Bookkeeping,
}

impl AlwaysOn {
    pub fn new(name: impl Into<String>, params: AlwaysOnParams) -> Self {
        Self {
            name: name.into(),
            profile: params.power_profile(),
            params,
            book: Bookkeeping::default(),
        }
    }
}

impl Controller for AlwaysOn {
    fn decide(&mut self, _ctx: &TickContext) -> Decision {
        Decision::new(true, self.params.duty_cycle)
    }

    fn update(&mut self, outcome: &TickOutcome) -> f64 {
        self.book.charge(&self.profile, true, outcome.dt_s)
    }

    fn bookkeeping(&self) -> &Bookkeeping {
        &self.book
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parameters of the fixed-schedule baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimerParams {
    /// `[start_s, end_s)` windows in seconds since midnight.
    pub schedule: Vec<(f64, f64)>,
    pub active_power_w: f64,
    pub idle_power_w: f64,
    pub active_duty: f64,
    pub idle_duty: f64,
}

impl Default for TimerParams {
    fn default() -> Self {
        Self {
            // 09:00 to 20:00
            schedule: vec![(32_400.0, 72_000.0)],
            active_power_w: 10.0,
            idle_power_w: 1.0,
            active_duty: 1.0,
            idle_duty: 0.1,
        }
    }
}

impl TimerParams {
    pub fn power_profile(&self) -> PowerProfile {
        PowerProfile {
            active_power_w: self.active_power_w,
            idle_power_w: self.idle_power_w,
            wake_cost_j: 0.0,
        }
    }
}

/// Active inside configured daily windows, idle outside them.
#[derive(Debug, Clone)]
pub struct TimerBased {
    name: String,
    params: TimerParams,
    schedule: DailySchedule,
    profile: PowerProfile,
    book: Bookkeeping,
}

impl TimerBased {
    /// # Panics
    ///
    /// Panics if a schedule window is malformed.
    pub fn new(name: impl Into<String>, params: TimerParams) -> Self {
        Self {
            name: name.into(),
            schedule: DailySchedule::new(params.schedule.clone()),
            profile: params.power_profile(),
            params,
            book: Bookkeeping::default(),
        }
    }
}

impl Controller for TimerBased {
    fn decide(&mut self, ctx: &TickContext) -> Decision {
        if self.schedule.is_active(ctx.time_of_day_s) {
            Decision::new(true, self.params.active_duty)
        } else {
            Decision::new(false, self.params.idle_duty)
        }
    }

    fn update(&mut self, outcome: &TickOutcome) -> f64 {
        self.book.charge(&self.profile, outcome.active, outcome.dt_s)
    }

    fn bookkeeping(&self) -> &Bookkeeping {
        &self.book
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Parameters of the activity-pattern learner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AdaptiveParams {
    pub active_power_w: f64,
    pub idle_power_w: f64,
    pub wake_cost_j: f64,
    /// Forecast probability at which the module wakes.
    pub prediction_threshold: f64,
    /// Lower probability that keeps an already active module awake.
    pub hold_threshold: f64,
    pub active_duty: f64,
    pub idle_duty: f64,
    pub forecast: ForecastParams,
}

impl Default for AdaptiveParams {
    fn default() -> Self {
        Self {
            active_power_w: 10.0,
            idle_power_w: 1.0,
            wake_cost_j: 2.0,
            prediction_threshold: 0.5,
            hold_threshold: 0.3,
            active_duty: 1.0,
            idle_duty: 0.1,
            forecast: ForecastParams::default(),
        }
    }
}

impl AdaptiveParams {
    pub fn power_profile(&self) -> PowerProfile {
        PowerProfile {
            active_power_w: self.active_power_w,
            idle_power_w: self.idle_power_w,
            wake_cost_j: self.wake_cost_j,
        }
    }
}

/// Learns when users show up and stays awake around those times.
#[derive(Debug, Clone)]
pub struct PatternAdaptive {
    name: String,
    params: AdaptiveParams,
    forecast: ActivityForecast,
    profile: PowerProfile,
    book: Bookkeeping,
    was_active: bool,
}

impl PatternAdaptive {
    pub fn new(name: impl Into<String>, params: AdaptiveParams) -> Self {
        Self {
            name: name.into(),
            forecast: ActivityForecast::new(params.forecast),
            profile: params.power_profile(),
            params,
            book: Bookkeeping::default(),
            was_active: false,
        }
    }

    fn should_activate(&self, ctx: &TickContext) -> bool {
        if ctx.request {
            return true;
        }
        let p = self.forecast.probability(ctx.time_of_day_s);
        p >= self.params.prediction_threshold || (self.was_active && p >= self.params.hold_threshold)
    }

    pub fn forecast(&self) -> &ActivityForecast {
        &self.forecast
    }
}

impl Controller for PatternAdaptive {
    fn decide(&mut self, ctx: &TickContext) -> Decision {
        if self.should_activate(ctx) {
            Decision::new(true, self.params.active_duty)
        } else {
            Decision::new(false, self.params.idle_duty)
        }
    }

    fn update(&mut self, outcome: &TickOutcome) -> f64 {
        let energy = self.book.charge(&self.profile, outcome.active, outcome.dt_s);
        self.was_active = outcome.active;
        self.forecast.observe(outcome.time_of_day_s, outcome.request);
        self.book.record_prediction(outcome.active, outcome.request);
        energy
    }

    fn bookkeeping(&self) -> &Bookkeeping {
        &self.book
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The closed set of algorithms a scenario can compare.
///
/// An enum rather than trait objects so the engine stays statically
/// dispatched and a finished run can hand its value table back.
#[derive(Debug, Clone)]
pub enum Algorithm {
    AlwaysOn(AlwaysOn),
    TimerBased(TimerBased),
    PatternAdaptive(PatternAdaptive),
    Naheo(Box<NaheoController>),
}

impl Algorithm {
    /// Learned value table, for the algorithms that have one.
    pub fn into_table(self) -> Option<ValueTable> {
        match self {
            Self::Naheo(c) => Some(c.into_table()),
            _ => None,
        }
    }

    /// Type tag as written in scenario configs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AlwaysOn(_) => "always_on",
            Self::TimerBased(_) => "timer_based",
            Self::PatternAdaptive(_) => "naheo_adaptive",
            Self::Naheo(_) => "naheo_controller",
        }
    }

    fn inner(&self) -> &dyn Controller {
        match self {
            Self::AlwaysOn(c) => c,
            Self::TimerBased(c) => c,
            Self::PatternAdaptive(c) => c,
            Self::Naheo(c) => c.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Controller {
        match self {
            Self::AlwaysOn(c) => c,
            Self::TimerBased(c) => c,
            Self::PatternAdaptive(c) => c,
            Self::Naheo(c) => c.as_mut(),
        }
    }
}

impl Controller for Algorithm {
    fn decide(&mut self, ctx: &TickContext) -> Decision {
        self.inner_mut().decide(ctx)
    }

    fn update(&mut self, outcome: &TickOutcome) -> f64 {
        self.inner_mut().update(outcome)
    }

    fn finish(&mut self, last: &SensorReading) {
        self.inner_mut().finish(last);
    }

    fn bookkeeping(&self) -> &Bookkeeping {
        self.inner().bookkeeping()
    }

    fn name(&self) -> &str {
        self.inner().name()
    }
}
