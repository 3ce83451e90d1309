//! Virtual sensor: an EKF over load current and internal resistance.
//!
//! The pack only reports terminal voltage and temperature. Current and
//! resistance are inferred from the voltage sag below the open-circuit curve,
//! modelled as `h(x) = I * R`.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::physics::{OcvCurve, SensorReading};

type Mat2 = [[f64; 2]; 2];

/// Tuning for the current/resistance filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EstimatorParams {
    /// Prior mean of the load current (A).
    pub initial_current_a: f64,
    /// Prior mean of the internal resistance (Ω).
    pub initial_resistance_ohm: f64,
    /// Prior variance of the current estimate.
    pub initial_current_var: f64,
    /// Prior variance of the resistance estimate.
    pub initial_resistance_var: f64,
    /// Random-walk variance added to the current each tick.
    pub process_noise_current: f64,
    /// Random-walk variance added to the resistance each tick.
    pub process_noise_resistance: f64,
    /// Variance of the voltage-sag measurement (V²).
    pub measurement_noise: f64,
    /// Lower bound on the resistance estimate (Ω).
    pub min_resistance_ohm: f64,
    /// Innovation variance at or below which a correction is skipped.
    pub singular_threshold: f64,
    /// Low-pass weight applied to temperature readings (0, 1].
    pub temperature_smoothing: f64,
}

impl Default for EstimatorParams {
    fn default() -> Self {
        Self {
            initial_current_a: 0.0,
            initial_resistance_ohm: 0.3,
            initial_current_var: 1.0,
            // I and R are only seen as a product; the prior pins the split
            initial_resistance_var: 0.0025,
            process_noise_current: 0.05,
            // aging moves R by micro-ohms per tick
            process_noise_resistance: 1e-8,
            measurement_noise: 4e-4,
            min_resistance_ohm: 0.05,
            singular_threshold: 1e-12,
            temperature_smoothing: 0.3,
        }
    }
}

/// One tick's input to the filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Voltage sag below the open-circuit curve (V, >= 0).
    pub sag_v: f64,
    /// Measured temperature (°C).
    pub temperature_c: f64,
}

impl Measurement {
    /// Derives the sag from a raw reading and the pack's OCV curve.
    pub fn from_reading(reading: &SensorReading, ocv: &OcvCurve) -> Self {
        Self {
            sag_v: (ocv.voltage(reading.soc) - reading.voltage_v).max(0.0),
            temperature_c: reading.temperature_c,
        }
    }
}

/// Snapshot of the filter's belief.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Estimate {
    pub current_a: f64,
    pub resistance_ohm: f64,
    /// Smoothed temperature (°C).
    pub temperature_c: f64,
    /// Trace of the state covariance.
    pub covariance_trace: f64,
    /// False when the last correction was skipped.
    pub corrected: bool,
}

/// Extended Kalman filter on `[I, R]`.
///
/// State is only changed through [`Estimator::predict`] and
/// [`Estimator::correct`].
#[derive(Debug, Clone)]
pub struct Estimator {
    x: [f64; 2],
    p: Mat2,
    q: Mat2,
    r: f64,
    min_resistance_ohm: f64,
    singular_threshold: f64,
    smoothing: f64,
    temperature_c: Option<f64>,
    skipped_corrections: usize,
    last_corrected: bool,
}

impl Estimator {
    /// # Panics
    ///
    /// Panics if any variance is negative or the smoothing weight is outside
    /// `(0, 1]`.
    pub fn new(params: EstimatorParams) -> Self {
        assert!(params.initial_current_var >= 0.0 && params.initial_resistance_var >= 0.0);
        assert!(params.process_noise_current >= 0.0 && params.process_noise_resistance >= 0.0);
        assert!(params.measurement_noise >= 0.0);
        assert!(params.temperature_smoothing > 0.0 && params.temperature_smoothing <= 1.0);
        Self {
            x: [params.initial_current_a, params.initial_resistance_ohm],
            p: [
                [params.initial_current_var, 0.0],
                [0.0, params.initial_resistance_var],
            ],
            q: [
                [params.process_noise_current, 0.0],
                [0.0, params.process_noise_resistance],
            ],
            r: params.measurement_noise,
            min_resistance_ohm: params.min_resistance_ohm,
            singular_threshold: params.singular_threshold,
            smoothing: params.temperature_smoothing,
            temperature_c: None,
            skipped_corrections: 0,
            last_corrected: false,
        }
    }

    /// Random-walk prediction: the mean is unchanged and `P += Q`.
    pub fn predict(&mut self) {
        for i in 0..2 {
            for j in 0..2 {
                self.p[i][j] += self.q[i][j];
            }
        }
    }

    /// Linearized correction against one measurement.
    ///
    /// When the innovation variance is degenerate the correction is skipped,
    /// logged, and counted; the predicted state stands.
    pub fn correct(&mut self, m: &Measurement) -> Estimate {
        self.temperature_c = Some(match self.temperature_c {
            Some(t) => t + self.smoothing * (m.temperature_c - t),
            None => m.temperature_c,
        });

        let [i_est, r_est] = self.x;
        // Jacobian of h(x) = I * R
        let h = [r_est, i_est];
        let ph = [
            self.p[0][0] * h[0] + self.p[0][1] * h[1],
            self.p[1][0] * h[0] + self.p[1][1] * h[1],
        ];
        let s = h[0] * ph[0] + h[1] * ph[1] + self.r;

        if !s.is_finite() || s <= self.singular_threshold {
            self.skipped_corrections += 1;
            self.last_corrected = false;
            warn!(
                innovation_variance = s,
                skipped = self.skipped_corrections,
                "estimator correction skipped: singular innovation"
            );
            return self.estimate();
        }

        let k = [ph[0] / s, ph[1] / s];
        let innovation = m.sag_v - i_est * r_est;
        self.x[0] = (i_est + k[0] * innovation).max(0.0);
        self.x[1] = (r_est + k[1] * innovation).max(self.min_resistance_ohm);

        // Joseph form keeps P symmetric positive semi-definite
        let a = [
            [1.0 - k[0] * h[0], -k[0] * h[1]],
            [-k[1] * h[0], 1.0 - k[1] * h[1]],
        ];
        let apa = mul_abt(&mul(&a, &self.p), &a);
        let mut p = [[0.0; 2]; 2];
        for i in 0..2 {
            for j in 0..2 {
                p[i][j] = apa[i][j] + k[i] * self.r * k[j];
            }
        }
        // symmetrize away rounding drift
        let off = 0.5 * (p[0][1] + p[1][0]);
        p[0][1] = off;
        p[1][0] = off;
        self.p = p;
        self.last_corrected = true;

        self.estimate()
    }

    /// Current belief without changing it.
    pub fn estimate(&self) -> Estimate {
        Estimate {
            current_a: self.x[0],
            resistance_ohm: self.x[1],
            temperature_c: self.temperature_c.unwrap_or(f64::NAN),
            covariance_trace: self.p[0][0] + self.p[1][1],
            corrected: self.last_corrected,
        }
    }

    /// Copy of the state covariance.
    pub fn covariance(&self) -> Mat2 {
        self.p
    }

    /// Number of corrections skipped so far.
    pub fn skipped_corrections(&self) -> usize {
        self.skipped_corrections
    }
}

fn mul(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[0.0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            out[i][j] = a[i][0] * b[0][j] + a[i][1] * b[1][j];
        }
    }
    out
}

/// `a * bᵀ`
fn mul_abt(a: &Mat2, b: &Mat2) -> Mat2 {
    let mut out = [[0.0; 2]; 2];
    for i in 0..2 {
        for j in 0..2 {
            out[i][j] = a[i][0] * b[j][0] + a[i][1] * b[j][1];
        }
    }
    out
}
