use super::types::SECONDS_PER_DAY;

/// Daily active windows for schedule-driven controllers.
///
/// Each window is `[start_s, end_s)` in seconds since midnight.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DailySchedule {
    windows: Vec<(f64, f64)>,
}

impl DailySchedule {
    /// Creates a schedule from `(start_s, end_s)` windows.
    ///
    /// # Panics
    ///
    /// Panics if any window is malformed; see [`DailySchedule::check_window`].
    pub fn new(windows: Vec<(f64, f64)>) -> Self {
        for w in &windows {
            assert!(
                Self::check_window(*w).is_none(),
                "malformed schedule window {w:?}"
            );
        }
        Self { windows }
    }

    /// Returns a description of what is wrong with a window, if anything.
    pub fn check_window((start, end): (f64, f64)) -> Option<String> {
        if !start.is_finite() || !end.is_finite() {
            return Some("bounds must be finite".to_string());
        }
        if start < 0.0 || end > SECONDS_PER_DAY {
            return Some(format!("must lie within [0, {SECONDS_PER_DAY}]"));
        }
        if start >= end {
            return Some(format!("start ({start}) must be < end ({end})"));
        }
        None
    }

    /// Whether `time_of_day_s` falls inside any window.
    pub fn is_active(&self, time_of_day_s: f64) -> bool {
        self.windows
            .iter()
            .any(|&(start, end)| start <= time_of_day_s && time_of_day_s < end)
    }

    pub fn windows(&self) -> &[(f64, f64)] {
        &self.windows
    }
}
