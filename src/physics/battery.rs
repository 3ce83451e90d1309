/// Piecewise-linear open-circuit voltage curve indexed by state of charge.
///
/// Points are `(soc, volts)` pairs sorted by strictly increasing SoC, with
/// the first point at SoC 0 and the last at SoC 1. Voltages must be
/// non-decreasing so the curve is invertible in the region a fuel gauge cares
/// about.
#[derive(Debug, Clone, PartialEq)]
pub struct OcvCurve {
    points: Vec<(f64, f64)>,
}

impl OcvCurve {
    /// Creates a curve from `(soc, volts)` breakpoints.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two points are given, the SoC range is not
    /// exactly `[0, 1]`, or the points are not ordered.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        assert!(points.len() >= 2, "ocv curve needs at least two points");
        assert!(
            Self::check(&points).is_none(),
            "ocv curve points are malformed"
        );
        Self { points }
    }

    /// Returns a description of what is wrong with `points`, if anything.
    pub fn check(points: &[(f64, f64)]) -> Option<String> {
        if points.len() < 2 {
            return Some("needs at least two points".to_string());
        }
        let first = points[0].0;
        let last = points[points.len() - 1].0;
        if first != 0.0 || last != 1.0 {
            return Some(format!("must span soc 0.0 to 1.0, got {first} to {last}"));
        }
        for pair in points.windows(2) {
            if pair[1].0 <= pair[0].0 {
                return Some("soc breakpoints must be strictly increasing".to_string());
            }
            if pair[1].1 < pair[0].1 {
                return Some("voltages must be non-decreasing in soc".to_string());
            }
        }
        if points.iter().any(|&(_, v)| v <= 0.0 || !v.is_finite()) {
            return Some("voltages must be finite and > 0".to_string());
        }
        None
    }

    /// Default 2S Li-ion pack curve, 6.0 V empty to 8.4 V full.
    ///
    /// Steep knees at both ends with a flat plateau in between.
    pub fn li_ion_2s() -> Self {
        Self::new(vec![
            (0.0, 6.0),
            (0.05, 6.55),
            (0.10, 6.85),
            (0.20, 7.15),
            (0.40, 7.40),
            (0.60, 7.62),
            (0.80, 7.92),
            (0.90, 8.12),
            (1.0, 8.4),
        ])
    }

    /// Open-circuit voltage at `soc` (clamped to `[0, 1]`).
    pub fn voltage(&self, soc: f64) -> f64 {
        let soc = soc.clamp(0.0, 1.0);
        let idx = self
            .points
            .iter()
            .position(|&(s, _)| s >= soc)
            .unwrap_or(self.points.len() - 1);
        if idx == 0 {
            return self.points[0].1;
        }
        let (s0, v0) = self.points[idx - 1];
        let (s1, v1) = self.points[idx];
        v0 + (v1 - v0) * (soc - s0) / (s1 - s0)
    }

    /// Breakpoints of the curve.
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }
}

impl Default for OcvCurve {
    fn default() -> Self {
        Self::li_ion_2s()
    }
}

/// True electrochemical state of the pack.
///
/// Internal resistance grows linearly with discharged charge to model aging
/// within a run.
#[derive(Debug, Clone)]
pub struct BatteryState {
    /// State of charge as a fraction (0.0 to 1.0).
    pub soc: f64,
    /// Rated capacity in milliamp-hours.
    pub capacity_mah: f64,
    /// Internal resistance of a fresh pack (Ω).
    pub base_resistance_ohm: f64,
    /// Fractional resistance increase per discharged amp-hour.
    pub aging_per_ah: f64,
    /// Charge delivered so far (Ah).
    pub discharged_ah: f64,
    ocv: OcvCurve,
}

impl BatteryState {
    /// Creates a battery state.
    ///
    /// # Arguments
    ///
    /// * `capacity_mah` - Rated capacity in mAh (must be > 0)
    /// * `soc` - Initial state of charge (0.0 to 1.0)
    /// * `resistance_ohm` - Fresh internal resistance (must be > 0)
    /// * `aging_per_ah` - Resistance growth per discharged Ah (>= 0)
    /// * `ocv` - Open-circuit voltage curve
    ///
    /// # Panics
    ///
    /// Panics if capacity or resistance is not positive, SoC out of range, or
    /// aging is negative.
    pub fn new(
        capacity_mah: f64,
        soc: f64,
        resistance_ohm: f64,
        aging_per_ah: f64,
        ocv: OcvCurve,
    ) -> Self {
        assert!(capacity_mah > 0.0);
        assert!((0.0..=1.0).contains(&soc));
        assert!(resistance_ohm > 0.0);
        assert!(aging_per_ah >= 0.0);

        Self {
            soc,
            capacity_mah,
            base_resistance_ohm: resistance_ohm,
            aging_per_ah,
            discharged_ah: 0.0,
            ocv,
        }
    }

    /// Current internal resistance (Ω), always > 0.
    pub fn internal_resistance(&self) -> f64 {
        self.base_resistance_ohm * (1.0 + self.aging_per_ah * self.discharged_ah)
    }

    /// Open-circuit voltage at the present SoC.
    pub fn ocv_voltage(&self) -> f64 {
        self.ocv.voltage(self.soc)
    }

    /// Terminal voltage while sourcing `current_a`.
    pub fn terminal_voltage(&self, current_a: f64) -> f64 {
        self.ocv_voltage() - current_a * self.internal_resistance()
    }

    /// Removes the charge drawn by `current_a` over `dt_s` seconds.
    ///
    /// SoC is clamped to `[0, 1]`; use [`BatteryState::is_exhausted`] to
    /// detect the empty condition.
    pub fn discharge(&mut self, current_a: f64, dt_s: f64) {
        // 1 mAh = 3.6 C
        let delta_soc = current_a * dt_s / (self.capacity_mah * 3.6);
        self.soc = (self.soc - delta_soc).clamp(0.0, 1.0);
        if current_a > 0.0 {
            self.discharged_ah += current_a * dt_s / 3600.0;
        }
    }

    /// Whether the pack has no usable charge left.
    pub fn is_exhausted(&self) -> bool {
        self.soc <= 0.0
    }

    /// The voltage curve in use.
    pub fn ocv_curve(&self) -> &OcvCurve {
        &self.ocv
    }
}
