//! Execution layer: closed-form predictive control with an event trigger.
//!
//! The actuated plant is modelled as `V[k+1] = a * V[k] + b * u[k]` on
//! voltages normalized by the nominal pack voltage. Each evaluation picks the
//! duty change `du` that minimizes
//! `sum_k w_k * (target - V[k])^2 + lambda * du^2` with `du` held over the
//! horizon, then clamps the result to the safe duty range. When the applied
//! change is too small to matter the compute module goes to sleep.

use serde::{Deserialize, Serialize};

/// Tuning of the predictive controller and its trigger.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionParams {
    /// Plant pole `a`.
    pub plant_a: f64,
    /// Plant input gain `b`.
    pub plant_b: f64,
    /// Number of predicted steps (>= 1).
    pub horizon: usize,
    /// Weight decay per step beyond the first.
    pub horizon_discount: f64,
    /// Voltage setpoint in normal operation (V).
    pub target_voltage_v: f64,
    /// Voltage setpoint while a disturbance is sensed (V).
    pub disturbance_target_voltage_v: f64,
    /// Normalization voltage (V).
    pub nominal_voltage_v: f64,
    /// λ used while a disturbance is sensed.
    pub disturbance_aggressiveness: f64,
    pub duty_min: f64,
    pub duty_max: f64,
    /// Duty applied before the first evaluation.
    pub initial_duty: f64,
    /// Applied duty change below which the tick sleeps.
    pub trigger_threshold: f64,
    /// Forced wake period in ticks; 0 disables periodic re-evaluation.
    pub reevaluate_every_ticks: usize,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            plant_a: 0.9,
            plant_b: 0.8,
            horizon: 1,
            horizon_discount: 0.5,
            target_voltage_v: 7.5,
            disturbance_target_voltage_v: 8.4,
            nominal_voltage_v: 8.4,
            disturbance_aggressiveness: 0.01,
            duty_min: 0.1,
            duty_max: 1.0,
            initial_duty: 1.0,
            trigger_threshold: 0.01,
            reevaluate_every_ticks: 30,
        }
    }
}

/// Whether the compute module is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeState {
    Active,
    Sleeping,
}

/// One tick's actuation decision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlCommand {
    /// Change from the prior duty.
    pub duty_delta: f64,
    /// Duty to apply this tick.
    pub duty: f64,
    /// Compute sleeps and actuation is held.
    pub sleep: bool,
    /// Magnitude of the applied change the optimizer asked for.
    pub effort: f64,
    /// Set when the safety guardian substituted this command.
    pub overridden: bool,
}

impl ControlCommand {
    /// Command that holds `duty` while active.
    pub fn hold(duty: f64) -> Self {
        Self {
            duty_delta: 0.0,
            duty,
            sleep: false,
            effort: 0.0,
            overridden: false,
        }
    }
}

/// Inputs the execution layer reacts to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionInput {
    pub tick: usize,
    /// Measured or estimated terminal voltage (V).
    pub voltage_v: f64,
    /// λ from the strategic layer.
    pub aggressiveness: f64,
    /// A load disturbance is sensed.
    pub disturbance: bool,
    /// A service request needs the compute module awake.
    pub demand: bool,
}

/// Predictive controller plus the Active/Sleeping state machine.
#[derive(Debug, Clone)]
pub struct ExecutionLayer {
    params: ExecutionParams,
    state: ComputeState,
    wakeups: usize,
}

impl ExecutionLayer {
    /// # Panics
    ///
    /// Panics if the horizon is zero, the duty range is empty, or the nominal
    /// voltage is not positive.
    pub fn new(params: ExecutionParams) -> Self {
        assert!(params.horizon >= 1, "horizon must be >= 1");
        assert!(params.duty_min <= params.duty_max, "duty range is empty");
        assert!(params.nominal_voltage_v > 0.0);
        Self {
            params,
            state: ComputeState::Active,
            wakeups: 0,
        }
    }

    /// Minimizer of the horizon cost for a duty change held over the horizon.
    ///
    /// With a one-step horizon this is
    /// `b * (target - a * v - b * u_prev) / (b^2 + lambda)`.
    pub fn optimal_delta(&self, target: f64, v: f64, u_prev: f64, lambda: f64) -> f64 {
        let (a, b) = (self.params.plant_a, self.params.plant_b);
        let mut num = 0.0;
        let mut den = lambda;
        let mut a_pow = 1.0;
        let mut gain = 0.0;
        let mut weight = 1.0;
        for _ in 0..self.params.horizon {
            gain += b * a_pow;
            a_pow *= a;
            let error = target - a_pow * v - gain * u_prev;
            num += weight * gain * error;
            den += weight * gain * gain;
            weight *= self.params.horizon_discount;
        }
        if den <= 0.0 { 0.0 } else { num / den }
    }

    /// Normalized setpoint for the current conditions.
    pub fn target(&self, disturbance: bool) -> f64 {
        let v = if disturbance {
            self.params.disturbance_target_voltage_v
        } else {
            self.params.target_voltage_v
        };
        v / self.params.nominal_voltage_v
    }

    /// Computes this tick's command from the prior one.
    ///
    /// A sleeping controller only wakes for a disturbance, a service demand,
    /// or the periodic re-evaluation tick; otherwise it holds the prior duty
    /// without running the optimizer.
    pub fn decide(&mut self, input: &ExecutionInput, prior: &ControlCommand) -> ControlCommand {
        let held_awake = input.disturbance || input.demand;

        if self.state == ComputeState::Sleeping {
            if !self.will_evaluate(input.tick, held_awake) {
                return self.sleep_command(prior.duty, 0.0);
            }
            self.state = ComputeState::Active;
            self.wakeups += 1;
        }

        let lambda = if input.disturbance {
            self.params.disturbance_aggressiveness
        } else {
            input.aggressiveness
        };
        let v = input.voltage_v / self.params.nominal_voltage_v;
        let du = self.optimal_delta(self.target(input.disturbance), v, prior.duty, lambda);
        let duty = (prior.duty + du).clamp(self.params.duty_min, self.params.duty_max);
        let applied = duty - prior.duty;
        let effort = applied.abs();

        if effort < self.params.trigger_threshold && !held_awake {
            self.state = ComputeState::Sleeping;
            return self.sleep_command(prior.duty, effort);
        }

        ControlCommand {
            duty_delta: applied,
            duty,
            sleep: false,
            effort,
            overridden: false,
        }
    }

    /// Whether the optimizer will run at `tick`, given an external wake cause.
    pub fn will_evaluate(&self, tick: usize, wake: bool) -> bool {
        if self.state == ComputeState::Active || wake {
            return true;
        }
        let n = self.params.reevaluate_every_ticks;
        n > 0 && tick % n == 0
    }

    fn sleep_command(&self, duty: f64, effort: f64) -> ControlCommand {
        ControlCommand {
            duty_delta: 0.0,
            duty,
            sleep: true,
            effort,
            overridden: false,
        }
    }

    /// Wakes the controller unconditionally, e.g. before final metrics.
    pub fn force_active(&mut self) {
        if self.state == ComputeState::Sleeping {
            self.wakeups += 1;
        }
        self.state = ComputeState::Active;
    }

    /// Command to use before the first evaluation.
    pub fn initial_command(&self) -> ControlCommand {
        ControlCommand::hold(
            self.params
                .initial_duty
                .clamp(self.params.duty_min, self.params.duty_max),
        )
    }

    pub fn state(&self) -> ComputeState {
        self.state
    }

    /// Number of Sleeping to Active transitions.
    pub fn wakeups(&self) -> usize {
        self.wakeups
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    /// Residual tracking error and duty change after one step with `lambda`.
    ///
    /// Used to price λ choices offline: a larger λ leaves more error behind
    /// but moves the actuator less.
    pub fn response(&self, error: f64, lambda: f64) -> (f64, f64) {
        let b = self.params.plant_b;
        let du = b * error / (b * b + lambda);
        (error - b * du, du)
    }
}
