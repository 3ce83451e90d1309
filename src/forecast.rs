//! Activity forecasting for the predictive controllers.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::sim::types::SECONDS_PER_DAY;

/// Tuning of the activity forecaster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ForecastParams {
    /// Width of one time-of-day bin (s).
    pub bin_s: f64,
    /// EMA weight of each new observation.
    pub learning_rate: f64,
    /// Probability assumed for a bin that has never been observed.
    pub prior: f64,
    /// Number of recent ticks kept for the trend term.
    pub history_len: usize,
    /// Number of most recent ticks the trend rate is computed over.
    pub trend_window: usize,
    /// Weight of the trend rate in the blended forecast.
    pub trend_weight: f64,
}

impl Default for ForecastParams {
    fn default() -> Self {
        Self {
            bin_s: 60.0,
            learning_rate: 0.1,
            prior: 0.5,
            history_len: 100,
            trend_window: 10,
            trend_weight: 0.3,
        }
    }
}

/// Learns how likely a service request is at each time of day.
///
/// Each bin keeps an exponential moving average of observed requests. The
/// forecast blends that average with the request rate over the last few
/// ticks, so a sudden burst is picked up before the daily pattern catches up.
///
/// # Examples
///
/// ```
/// use naheo_sim::forecast::{ActivityForecast, ForecastParams};
///
/// let mut f = ActivityForecast::new(ForecastParams::default());
/// assert_eq!(f.probability(0.0), 0.5);
/// for _ in 0..50 {
///     f.observe(0.0, false);
/// }
/// assert!(f.probability(0.0) < 0.1);
/// ```
#[derive(Debug, Clone)]
pub struct ActivityForecast {
    params: ForecastParams,
    bins: Vec<Option<f64>>,
    recent: VecDeque<bool>,
}

impl ActivityForecast {
    /// # Panics
    ///
    /// Panics if `bin_s` is not positive or `learning_rate` is outside `[0, 1]`.
    pub fn new(params: ForecastParams) -> Self {
        assert!(params.bin_s > 0.0, "bin_s must be > 0");
        assert!((0.0..=1.0).contains(&params.learning_rate));
        let n = (SECONDS_PER_DAY / params.bin_s).ceil() as usize;
        Self {
            params,
            bins: vec![None; n.max(1)],
            recent: VecDeque::with_capacity(params.history_len),
        }
    }

    fn bin(&self, time_of_day_s: f64) -> usize {
        let idx = (time_of_day_s.rem_euclid(SECONDS_PER_DAY) / self.params.bin_s) as usize;
        idx.min(self.bins.len() - 1)
    }

    /// Learned request rate of the bin alone, or the prior.
    pub fn base_rate(&self, time_of_day_s: f64) -> f64 {
        self.bins[self.bin(time_of_day_s)].unwrap_or(self.params.prior)
    }

    /// Forecast probability of a request at `time_of_day_s`.
    pub fn probability(&self, time_of_day_s: f64) -> f64 {
        let base = self.base_rate(time_of_day_s);
        let window = self.params.trend_window.min(self.recent.len());
        if window == 0 {
            return base;
        }
        let hits = self.recent.iter().rev().take(window).filter(|&&r| r).count();
        let trend = hits as f64 / window as f64;
        (1.0 - self.params.trend_weight) * base + self.params.trend_weight * trend
    }

    /// Records whether a request arrived at `time_of_day_s`.
    pub fn observe(&mut self, time_of_day_s: f64, request: bool) {
        let idx = self.bin(time_of_day_s);
        let observed = if request { 1.0 } else { 0.0 };
        let current = self.bins[idx].unwrap_or(self.params.prior);
        self.bins[idx] = Some(current + self.params.learning_rate * (observed - current));

        if self.params.history_len > 0 {
            if self.recent.len() == self.params.history_len {
                self.recent.pop_front();
            }
            self.recent.push_back(request);
        }
    }

    /// Number of bins that have seen at least one observation.
    pub fn learned_bins(&self) -> usize {
        self.bins.iter().filter(|b| b.is_some()).count()
    }

    pub fn params(&self) -> &ForecastParams {
        &self.params
    }
}
