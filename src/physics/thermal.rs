//! First-order lumped thermal model of the pack and its electronics.

/// Lumped thermal mass with Newtonian cooling toward ambient.
#[derive(Debug, Clone)]
pub struct ThermalModel {
    /// Current temperature (°C).
    pub temperature_c: f64,
    /// Ambient temperature (°C).
    pub ambient_c: f64,
    /// Heat capacity in joules per °C.
    pub thermal_mass_j_per_c: f64,
    /// Cooling coefficient per second.
    pub cooling_rate_per_s: f64,
}

impl ThermalModel {
    /// # Panics
    ///
    /// Panics if the thermal mass is not positive or the cooling rate is negative.
    pub fn new(
        initial_c: f64,
        ambient_c: f64,
        thermal_mass_j_per_c: f64,
        cooling_rate_per_s: f64,
    ) -> Self {
        assert!(thermal_mass_j_per_c > 0.0);
        assert!(cooling_rate_per_s >= 0.0);
        Self {
            temperature_c: initial_c,
            ambient_c,
            thermal_mass_j_per_c,
            cooling_rate_per_s,
        }
    }

    /// Integrates `heat_w` of dissipation over `dt_s` seconds and returns the
    /// new temperature.
    pub fn step(&mut self, heat_w: f64, dt_s: f64) -> f64 {
        let rise = heat_w * dt_s / self.thermal_mass_j_per_c;
        let cooling = (self.temperature_c - self.ambient_c) * self.cooling_rate_per_s * dt_s;
        self.temperature_c += rise - cooling;
        self.temperature_c
    }

    /// Temperature the model settles at under constant `heat_w`.
    pub fn steady_state_c(&self, heat_w: f64) -> f64 {
        if self.cooling_rate_per_s == 0.0 {
            return f64::INFINITY;
        }
        self.ambient_c + heat_w / (self.thermal_mass_j_per_c * self.cooling_rate_per_s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_heat_at_ambient_is_stable() {
        let mut m = ThermalModel::new(25.0, 25.0, 15.0, 0.08);
        for _ in 0..100 {
            m.step(0.0, 1.0);
        }
        assert_eq!(m.temperature_c, 25.0);
    }

    #[test]
    fn heating_lags_and_approaches_steady_state() {
        let mut m = ThermalModel::new(25.0, 25.0, 15.0, 0.08);
        let target = m.steady_state_c(1.2);
        let first = m.step(1.2, 1.0);
        assert!(first > 25.0 && first < target);
        for _ in 0..2000 {
            m.step(1.2, 1.0);
        }
        assert!((m.temperature_c - target).abs() < 1e-6);
    }

    #[test]
    fn cools_toward_ambient() {
        let mut m = ThermalModel::new(40.0, 25.0, 15.0, 0.08);
        let mut prev = m.temperature_c;
        for _ in 0..50 {
            let t = m.step(0.0, 1.0);
            assert!(t < prev && t > 25.0);
            prev = t;
        }
    }
}
