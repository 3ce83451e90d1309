//! Digital twin of the battery-powered device.

use crate::error::SimError;

use super::battery::BatteryState;
use super::disturbance::DisturbanceProcess;
use super::thermal::ThermalModel;
use super::types::{Observation, SENSOR_STREAM, SensorReading, TrueState, gaussian_noise, tick_rng};

/// Electrical parameters of the actuated load and the compute module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadModel {
    /// Resistance of the actuated load at full duty (Ω).
    pub load_resistance_ohm: f64,
    /// Compute current while active (A).
    pub cpu_active_a: f64,
    /// Compute current while sleeping (A).
    pub cpu_sleep_a: f64,
    /// Compute supply rail used for heat accounting (V).
    pub cpu_voltage_v: f64,
}

impl Default for LoadModel {
    fn default() -> Self {
        Self {
            load_resistance_ohm: 10.0,
            cpu_active_a: 0.15,
            cpu_sleep_a: 0.02,
            cpu_voltage_v: 3.3,
        }
    }
}

/// Standard deviations of the sensor noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorNoise {
    pub voltage_std_v: f64,
    pub temperature_std_c: f64,
}

/// Ground-truth physics of one device: battery, thermal mass, load, and
/// disturbances.
///
/// All physical mutation happens in [`PhysicsEngine::step`]. Controllers only
/// ever see the [`SensorReading`] half of an [`Observation`].
#[derive(Debug, Clone)]
pub struct PhysicsEngine {
    seed: u64,
    dt_s: f64,
    battery: BatteryState,
    thermal: ThermalModel,
    load: LoadModel,
    noise: SensorNoise,
    disturbances: DisturbanceProcess,
    terminal_voltage_v: f64,
}

impl PhysicsEngine {
    /// Creates a physics engine.
    ///
    /// # Arguments
    ///
    /// * `seed` - Scenario seed, shared with the disturbance process
    /// * `dt_s` - Tick length in seconds (must be > 0)
    /// * `battery` - Initial battery state
    /// * `thermal` - Initial thermal state
    /// * `load` - Load and compute electrical model
    /// * `noise` - Sensor noise levels
    /// * `disturbances` - Load spike process
    ///
    /// # Panics
    ///
    /// Panics if `dt_s` is not positive or the load resistance is not positive.
    pub fn new(
        seed: u64,
        dt_s: f64,
        battery: BatteryState,
        thermal: ThermalModel,
        load: LoadModel,
        noise: SensorNoise,
        disturbances: DisturbanceProcess,
    ) -> Self {
        assert!(dt_s > 0.0, "dt_s must be > 0");
        assert!(load.load_resistance_ohm > 0.0);
        let terminal_voltage_v = battery.ocv_voltage();
        Self {
            seed,
            dt_s,
            battery,
            thermal,
            load,
            noise,
            disturbances,
            terminal_voltage_v,
        }
    }

    /// Noise-free reading of the pack before the first tick.
    pub fn initial_reading(&self) -> SensorReading {
        SensorReading::at_rest(
            self.terminal_voltage_v,
            self.thermal.temperature_c,
            self.battery.soc,
        )
    }

    /// Advances the true state by one tick.
    ///
    /// # Arguments
    ///
    /// * `tick` - Tick index, used to draw disturbances and sensor noise
    /// * `duty_cycle` - Commanded load duty (clamped to `[0, 1]`)
    /// * `compute_active` - Whether the compute module runs at full power
    ///
    /// # Errors
    ///
    /// Returns [`SimError::BatteryExhausted`] when this tick empties the pack.
    pub fn step(
        &mut self,
        tick: usize,
        duty_cycle: f64,
        compute_active: bool,
    ) -> Result<Observation, SimError> {
        let duty = duty_cycle.clamp(0.0, 1.0);

        // 1. Currents
        let disturbance_a = self.disturbances.current_at(tick);
        let cpu_a = if compute_active {
            self.load.cpu_active_a
        } else {
            self.load.cpu_sleep_a
        };
        let load_a = self.terminal_voltage_v.max(0.0) * duty / self.load.load_resistance_ohm;
        let current_a = load_a + disturbance_a + cpu_a;

        // 2. Charge and voltage
        self.battery.discharge(current_a, self.dt_s);
        let resistance = self.battery.internal_resistance();
        let ocv_v = self.battery.ocv_voltage();
        self.terminal_voltage_v = ocv_v - current_a * resistance;

        // 3. Heat
        let heat_w = current_a * current_a * resistance + cpu_a * self.load.cpu_voltage_v;
        let temperature_c = self.thermal.step(heat_w, self.dt_s);

        if self.battery.is_exhausted() {
            return Err(SimError::BatteryExhausted { tick });
        }

        // 4. Sensors
        let mut rng = tick_rng(self.seed, SENSOR_STREAM, tick);
        let voltage_v = self.terminal_voltage_v + gaussian_noise(&mut rng, self.noise.voltage_std_v);
        let temp_obs_c = temperature_c + gaussian_noise(&mut rng, self.noise.temperature_std_c);

        Ok(Observation {
            reading: SensorReading {
                tick,
                voltage_v,
                temperature_c: temp_obs_c,
                soc: self.battery.soc,
                disturbance_detected: disturbance_a > 0.0,
            },
            truth: TrueState {
                current_a,
                internal_resistance_ohm: resistance,
                ocv_v,
                terminal_voltage_v: self.terminal_voltage_v,
                temperature_c,
                soc: self.battery.soc,
                disturbance_current_a: disturbance_a,
                power_w: (self.terminal_voltage_v * current_a).max(0.0),
            },
        })
    }

    /// Returns a reference to the battery.
    pub fn battery(&self) -> &BatteryState {
        &self.battery
    }

    /// Returns a reference to the thermal model.
    pub fn thermal(&self) -> &ThermalModel {
        &self.thermal
    }

    /// Tick length in seconds.
    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::battery::OcvCurve;

    fn engine(seed: u64, soc: f64, disturbances: DisturbanceProcess) -> PhysicsEngine {
        PhysicsEngine::new(
            seed,
            1.0,
            BatteryState::new(2000.0, soc, 0.3, 0.0, OcvCurve::li_ion_2s()),
            ThermalModel::new(25.0, 25.0, 15.0, 0.08),
            LoadModel::default(),
            SensorNoise {
                voltage_std_v: 0.02,
                temperature_std_c: 0.1,
            },
            disturbances,
        )
    }

    #[test]
    fn terminal_voltage_follows_ocv_minus_ir() {
        let mut e = engine(1, 1.0, DisturbanceProcess::quiet(1));
        let obs = e.step(0, 1.0, true).unwrap();
        let t = obs.truth;
        assert!((t.terminal_voltage_v - (t.ocv_v - t.current_a * t.internal_resistance_ohm)).abs() < 1e-12);
        // full duty on 10 Ω from 8.4 V plus active cpu
        assert!((t.current_a - (0.84 + 0.15)).abs() < 1e-9);
    }

    #[test]
    fn soc_decreases_by_drawn_charge() {
        let mut e = engine(1, 1.0, DisturbanceProcess::quiet(1));
        let obs = e.step(0, 0.0, false).unwrap();
        let expected = 1.0 - 0.02 / (2000.0 * 3.6);
        assert!((obs.truth.soc - expected).abs() < 1e-12);
    }

    #[test]
    fn sleeping_compute_draws_less() {
        let mut a = engine(1, 1.0, DisturbanceProcess::quiet(1));
        let mut b = engine(1, 1.0, DisturbanceProcess::quiet(1));
        let active = a.step(0, 0.5, true).unwrap();
        let asleep = b.step(0, 0.5, false).unwrap();
        assert!(asleep.truth.current_a < active.truth.current_a);
    }

    #[test]
    fn joule_heating_raises_temperature() {
        let mut e = engine(1, 1.0, DisturbanceProcess::quiet(1));
        let mut last = 25.0;
        for t in 0..10 {
            last = e.step(t, 1.0, true).unwrap().truth.temperature_c;
        }
        assert!(last > 25.0);
    }

    #[test]
    fn disturbance_adds_current_and_sets_flag() {
        let always = DisturbanceProcess::new(5, 1.0, (1.0, 1.0), (1, 1));
        let mut e = engine(5, 1.0, always);
        let obs = e.step(0, 0.0, false).unwrap();
        assert!(obs.reading.disturbance_detected);
        assert!((obs.truth.disturbance_current_a - 1.0).abs() < 1e-12);
        assert!((obs.truth.current_a - 1.02).abs() < 1e-9);
    }

    #[test]
    fn noise_is_zero_mean_and_reproducible() {
        let mut a = engine(9, 1.0, DisturbanceProcess::quiet(9));
        let mut b = engine(9, 1.0, DisturbanceProcess::quiet(9));
        let mut err_sum = 0.0;
        for t in 0..2000 {
            let oa = a.step(t, 0.2, false).unwrap();
            let ob = b.step(t, 0.2, false).unwrap();
            assert_eq!(oa, ob);
            err_sum += oa.reading.voltage_v - oa.truth.terminal_voltage_v;
        }
        assert!((err_sum / 2000.0).abs() < 0.005);
    }

    #[test]
    fn empty_pack_is_a_hard_failure() {
        let mut e = engine(1, 0.0001, DisturbanceProcess::quiet(1));
        let mut failed_at = None;
        for t in 0..100 {
            if let Err(SimError::BatteryExhausted { tick }) = e.step(t, 1.0, true) {
                failed_at = Some(tick);
                break;
            }
        }
        assert!(failed_at.is_some());
        assert_eq!(e.battery().soc, 0.0);
    }
}
