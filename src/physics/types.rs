//! Observation types and seeded random helpers shared by the physics engine.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

/// Random stream used for disturbance arrivals.
pub const DISTURBANCE_STREAM: u64 = 11;
/// Random stream used for sensor noise.
pub const SENSOR_STREAM: u64 = 23;
/// Random stream used for per-tick service demand draws.
pub const DEMAND_STREAM: u64 = 37;
/// Seed offset for learner exploration to avoid correlation with physics.
pub const LEARNER_SEED_OFFSET: u64 = 57;

/// Noisy values a controller is allowed to see.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Tick at which the reading was taken.
    pub tick: usize,
    /// Measured terminal voltage (V).
    pub voltage_v: f64,
    /// Measured pack temperature (°C).
    pub temperature_c: f64,
    /// Fuel-gauge state of charge (0.0 to 1.0).
    pub soc: f64,
    /// Whether the load sensor reports a disturbance in progress.
    pub disturbance_detected: bool,
}

impl SensorReading {
    /// Reading of a fresh, idle pack before the first tick.
    pub fn at_rest(voltage_v: f64, temperature_c: f64, soc: f64) -> Self {
        Self {
            tick: 0,
            voltage_v,
            temperature_c,
            soc,
            disturbance_detected: false,
        }
    }
}

/// Ground-truth internal state, used for scoring only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrueState {
    /// Total current drawn from the pack (A).
    pub current_a: f64,
    /// Internal resistance including aging (Ω).
    pub internal_resistance_ohm: f64,
    /// Open-circuit voltage at the current SoC (V).
    pub ocv_v: f64,
    /// Noise-free terminal voltage (V).
    pub terminal_voltage_v: f64,
    /// Pack temperature (°C).
    pub temperature_c: f64,
    /// State of charge (0.0 to 1.0).
    pub soc: f64,
    /// Extra current injected by active disturbances (A).
    pub disturbance_current_a: f64,
    /// Electrical power delivered by the pack (W).
    pub power_w: f64,
}

/// Result of advancing the physics engine by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Noisy observables.
    pub reading: SensorReading,
    /// Hidden true state.
    pub truth: TrueState,
}

impl Observation {
    /// The part of the observation a controller may consume.
    pub fn reading(&self) -> &SensorReading {
        &self.reading
    }
}

/// Builds a generator whose output depends only on `(seed, stream, tick)`.
///
/// Any component that needs per-tick randomness draws from its own stream
/// so that results do not depend on call order.
pub fn tick_rng(seed: u64, stream: u64, tick: usize) -> StdRng {
    let mut x = splitmix64(seed ^ splitmix64(stream));
    x = splitmix64(x ^ tick as u64);
    StdRng::seed_from_u64(x)
}

fn splitmix64(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Utility function to generate Gaussian noise using Box-Muller transform.
///
/// # Arguments
///
/// * `rng` - Random number generator
/// * `std_dev` - Standard deviation of the noise
///
/// # Returns
///
/// Random value from a Gaussian distribution with mean 0 and specified standard deviation
pub fn gaussian_noise(rng: &mut StdRng, std_dev: f64) -> f64 {
    if std_dev <= 0.0 {
        return 0.0;
    }

    let u1: f64 = rng.random::<f64>().clamp(1e-12, 1.0);
    let u2: f64 = rng.random::<f64>();
    let z0 = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    z0 * std_dev
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_rng_is_pure() {
        let a: f64 = tick_rng(42, SENSOR_STREAM, 17).random();
        let b: f64 = tick_rng(42, SENSOR_STREAM, 17).random();
        assert_eq!(a, b);
    }

    #[test]
    fn tick_rng_separates_streams_and_ticks() {
        let base: u64 = tick_rng(42, SENSOR_STREAM, 17).random();
        let other_stream: u64 = tick_rng(42, DISTURBANCE_STREAM, 17).random();
        let other_tick: u64 = tick_rng(42, SENSOR_STREAM, 18).random();
        assert_ne!(base, other_stream);
        assert_ne!(base, other_tick);
    }

    #[test]
    fn zero_std_noise_is_zero() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(gaussian_noise(&mut rng, 0.0), 0.0);
    }

    #[test]
    fn noise_sample_mean_is_near_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let sum: f64 = (0..n).map(|_| gaussian_noise(&mut rng, 1.0)).sum();
        assert!((sum / n as f64).abs() < 0.05);
    }
}
