//! Safety guardian that sits between the optimizer and the actuator.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::estimator::Estimate;
use super::execution::ControlCommand;

/// Limits enforced by the guardian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GuardianParams {
    /// Estimated current above which the override engages (A).
    pub max_current_a: f64,
    /// Estimated temperature above which the override engages (°C).
    pub max_temperature_c: f64,
    /// Duty applied while overriding.
    pub override_duty: f64,
}

impl Default for GuardianParams {
    fn default() -> Self {
        Self {
            max_current_a: 2.0,
            max_temperature_c: 45.0,
            override_duty: 0.1,
        }
    }
}

/// Which limit was breached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    Current,
    Temperature,
}

/// Replaces any command with a fixed conservative one when the estimated
/// state is unsafe.
#[derive(Debug, Clone)]
pub struct SafetyGuardian {
    params: GuardianParams,
    overrides: usize,
}

impl SafetyGuardian {
    pub fn new(params: GuardianParams) -> Self {
        Self {
            params,
            overrides: 0,
        }
    }

    /// Returns the breached limit, current first.
    pub fn check(&self, estimate: &Estimate) -> Option<Violation> {
        if estimate.current_a > self.params.max_current_a {
            Some(Violation::Current)
        } else if estimate.temperature_c > self.params.max_temperature_c {
            Some(Violation::Temperature)
        } else {
            None
        }
    }

    /// Passes `proposed` through, or substitutes the override command.
    ///
    /// The substitution ignores everything about `proposed` except the duty it
    /// started from, so it wins regardless of what the optimizer produced.
    pub fn review(&mut self, estimate: &Estimate, proposed: ControlCommand) -> ControlCommand {
        let Some(violation) = self.check(estimate) else {
            return proposed;
        };
        self.overrides += 1;
        debug!(
            ?violation,
            current_a = estimate.current_a,
            temperature_c = estimate.temperature_c,
            "guardian override"
        );
        let prior_duty = proposed.duty - proposed.duty_delta;
        ControlCommand {
            duty_delta: self.params.override_duty - prior_duty,
            duty: self.params.override_duty,
            sleep: false,
            effort: proposed.effort,
            overridden: true,
        }
    }

    /// Number of substitutions so far.
    pub fn overrides(&self) -> usize {
        self.overrides
    }

    pub fn params(&self) -> &GuardianParams {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn estimate(current_a: f64, temperature_c: f64) -> Estimate {
        Estimate {
            current_a,
            resistance_ohm: 0.3,
            temperature_c,
            covariance_trace: 0.1,
            corrected: true,
        }
    }

    fn proposed(duty: f64, sleep: bool) -> ControlCommand {
        ControlCommand {
            duty_delta: duty - 0.5,
            duty,
            sleep,
            effort: (duty - 0.5).abs(),
            overridden: false,
        }
    }

    #[test]
    fn safe_state_passes_command_through() {
        let mut g = SafetyGuardian::new(GuardianParams::default());
        let cmd = proposed(0.8, false);
        assert_eq!(g.review(&estimate(1.0, 30.0), cmd), cmd);
        assert_eq!(g.overrides(), 0);
    }

    #[test]
    fn over_current_always_substitutes() {
        let mut g = SafetyGuardian::new(GuardianParams::default());
        for duty in [0.1, 0.35, 0.7, 1.0] {
            for sleep in [false, true] {
                let out = g.review(&estimate(2.5, 25.0), proposed(duty, sleep));
                assert_eq!(out.duty, 0.1);
                assert!(out.overridden);
                assert!(!out.sleep);
            }
        }
        assert_eq!(g.overrides(), 8);
    }

    #[test]
    fn over_temperature_substitutes() {
        let mut g = SafetyGuardian::new(GuardianParams::default());
        let out = g.review(&estimate(0.5, 50.0), proposed(0.9, false));
        assert_eq!(out.duty, 0.1);
        assert_eq!(g.check(&estimate(0.5, 50.0)), Some(Violation::Temperature));
    }

    #[test]
    fn current_is_reported_before_temperature() {
        let g = SafetyGuardian::new(GuardianParams::default());
        assert_eq!(g.check(&estimate(3.0, 60.0)), Some(Violation::Current));
    }

    #[test]
    fn override_delta_is_relative_to_prior_duty() {
        let mut g = SafetyGuardian::new(GuardianParams::default());
        let out = g.review(&estimate(3.0, 25.0), proposed(0.9, false));
        // prior duty was 0.5
        assert!((out.duty_delta - (0.1 - 0.5)).abs() < 1e-12);
    }
}
