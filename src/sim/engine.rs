//! Simulation engine that drives one controller against one digital twin.

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SimError;
use crate::physics::{PhysicsEngine, SensorReading};

use super::clock::Clock;
use super::controller::Controller;
use super::types::{SimConfig, TickContext, TickOutcome, TickRecord};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// The run stopped early; records up to `tick` are kept.
    Failed { tick: usize, reason: String },
}

impl RunStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Records of one run plus how it ended.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub records: Vec<TickRecord>,
    pub status: RunStatus,
}

/// Simulation engine owning the physics, the controller, and the request
/// trace.
///
/// Generic over `C: Controller` for static dispatch. The controller never
/// sees the physics engine, only the reading from the previous tick.
pub struct Engine<C: Controller> {
    config: SimConfig,
    physics: PhysicsEngine,
    controller: C,
    requests: Vec<bool>,
    undervoltage_v: f64,
    reading: SensorReading,
    energy_j: f64,
}

impl<C: Controller> Engine<C> {
    /// Creates a new simulation engine.
    ///
    /// # Arguments
    ///
    /// * `config` - Simulation timing and seed
    /// * `physics` - Digital twin in its initial state
    /// * `controller` - Algorithm under test
    /// * `requests` - One service-request flag per tick; missing ticks have none
    /// * `undervoltage_v` - Sensed voltage below which requests cannot be served
    pub fn new(
        config: SimConfig,
        physics: PhysicsEngine,
        controller: C,
        requests: Vec<bool>,
        undervoltage_v: f64,
    ) -> Self {
        let reading = physics.initial_reading();
        Self {
            config,
            physics,
            controller,
            requests,
            undervoltage_v,
            reading,
            energy_j: 0.0,
        }
    }

    /// Executes one tick and returns its record.
    ///
    /// # Errors
    ///
    /// Propagates [`SimError::BatteryExhausted`] from the physics step. The
    /// controller is not updated for a failed tick.
    pub fn step(&mut self, tick: usize) -> Result<TickRecord, SimError> {
        // 1. Request
        let request = self.requests.get(tick).copied().unwrap_or(false);
        let time_s = self.config.elapsed_s(tick);
        let time_of_day_s = self.config.time_of_day_s(tick);

        // 2. Decide on last tick's reading
        let ctx = TickContext {
            tick,
            time_s,
            time_of_day_s,
            request,
            reading: self.reading,
        };
        let decision = self.controller.decide(&ctx);

        // 3. Service
        let powered = self.reading.voltage_v >= self.undervoltage_v;
        let served = request && decision.active && powered;

        // 4. Physics
        let obs = self.physics.step(tick, decision.duty_cycle, decision.active)?;

        // 5. Controller bookkeeping
        let dt_s = self.physics.dt_s();
        let energy = self.controller.update(&TickOutcome {
            tick,
            dt_s,
            time_of_day_s,
            request,
            served,
            active: decision.active,
            reading: obs.reading,
            truth: obs.truth,
        });
        self.energy_j += energy;
        self.reading = obs.reading;

        // 6. Record
        Ok(TickRecord {
            tick,
            time_s,
            request,
            served,
            active: decision.active,
            duty_cycle: decision.duty_cycle,
            power_w: energy / dt_s,
            energy_j: self.energy_j,
            voltage_v: obs.reading.voltage_v,
            temperature_c: obs.reading.temperature_c,
            soc: obs.reading.soc,
            true_current_a: obs.truth.current_a,
            true_resistance_ohm: obs.truth.internal_resistance_ohm,
            true_temperature_c: obs.truth.temperature_c,
            battery_power_w: obs.truth.power_w,
            disturbance: obs.truth.disturbance_current_a > 0.0,
            diagnostics: decision.diagnostics,
        })
    }

    /// Executes every tick, stopping at the first failure.
    ///
    /// The controller's `finish` hook runs in both cases.
    pub fn run(&mut self) -> RunOutcome {
        let mut clock = Clock::new(self.config.total_ticks());
        let mut records = Vec::with_capacity(self.config.total_ticks());
        let mut status = RunStatus::Completed;

        while let Some(tick) = clock.tick() {
            match self.step(tick) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(
                        algorithm = self.controller.name(),
                        tick,
                        error = %err,
                        "run stopped early"
                    );
                    status = RunStatus::Failed {
                        tick,
                        reason: err.to_string(),
                    };
                    break;
                }
            }
        }

        let last = self.reading;
        self.controller.finish(&last);
        debug!(
            algorithm = self.controller.name(),
            ticks = records.len(),
            energy_j = self.energy_j,
            "run finished"
        );
        RunOutcome { records, status }
    }

    pub fn controller(&self) -> &C {
        &self.controller
    }

    /// Gives the controller back, e.g. to keep its learned state.
    pub fn into_controller(self) -> C {
        self.controller
    }

    pub fn physics(&self) -> &PhysicsEngine {
        &self.physics
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }
}
