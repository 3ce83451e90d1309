//! Service request generation for the supported user-behaviour patterns.
//!
//! Requests are drawn once per scenario and shared by every algorithm, so all
//! controllers are scored against the same arrivals.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};

use crate::physics::types::{DEMAND_STREAM, gaussian_noise, tick_rng};

use super::types::SimConfig;

/// User behaviour pattern driving service requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DemandPattern {
    /// Hour-of-day request probabilities with small noise.
    #[serde(alias = "realistic")]
    SteadyDaily,
    /// Fixed-length bursts at a fixed period.
    Periodic,
    /// Constant request probability.
    #[serde(alias = "random")]
    UniformRandom,
    /// Alternating idle and burst phases of random length.
    Bursty,
}

impl DemandPattern {
    /// Accepted names, including aliases.
    pub const NAMES: &[&str] = &[
        "steady_daily",
        "realistic",
        "periodic",
        "uniform_random",
        "random",
        "bursty",
    ];

    /// Parses a pattern name as written in configs and on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "steady_daily" | "realistic" => Some(Self::SteadyDaily),
            "periodic" => Some(Self::Periodic),
            "uniform_random" | "random" => Some(Self::UniformRandom),
            "bursty" => Some(Self::Bursty),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SteadyDaily => "steady_daily",
            Self::Periodic => "periodic",
            Self::UniformRandom => "uniform_random",
            Self::Bursty => "bursty",
        }
    }
}

/// Shape parameters for every pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemandParams {
    /// Request probability for each hour of the day (24 entries).
    pub hourly_probability: Vec<f64>,
    /// Noise added to the hourly probability each tick.
    pub probability_noise_std: f64,
    /// Ticks between periodic bursts.
    pub period_ticks: usize,
    /// Length of each periodic burst.
    pub period_burst_ticks: usize,
    /// Request probability of the uniform pattern.
    pub random_rate: f64,
    /// Mean idle phase length of the bursty pattern.
    pub bursty_idle_ticks: usize,
    /// Maximum deviation from the mean idle length.
    pub bursty_idle_jitter: usize,
    /// Mean burst phase length of the bursty pattern.
    pub bursty_burst_ticks: usize,
    /// Maximum deviation from the mean burst length.
    pub bursty_burst_jitter: usize,
    /// Request probability inside a burst.
    pub bursty_burst_rate: f64,
    /// Request probability while idle.
    pub bursty_idle_rate: f64,
}

impl Default for DemandParams {
    fn default() -> Self {
        let mut hourly = vec![0.0; 24];
        for (hour, p) in hourly.iter_mut().enumerate() {
            *p = match hour {
                0..6 => 0.01,
                6..9 => 0.15,
                9..12 => 0.25,
                12..14 => 0.10,
                14..18 => 0.30,
                18..22 => 0.20,
                _ => 0.05,
            };
        }
        Self {
            hourly_probability: hourly,
            probability_noise_std: 0.02,
            period_ticks: 300,
            period_burst_ticks: 20,
            random_rate: 0.15,
            bursty_idle_ticks: 200,
            bursty_idle_jitter: 50,
            bursty_burst_ticks: 50,
            bursty_burst_jitter: 10,
            bursty_burst_rate: 0.4,
            bursty_idle_rate: 0.02,
        }
    }
}

impl DemandParams {
    /// Nominal request probability at a time of day, before noise.
    pub fn hourly_rate(&self, time_of_day_s: f64) -> f64 {
        let hour = ((time_of_day_s / 3600.0).floor() as usize) % 24;
        self.hourly_probability.get(hour).copied().unwrap_or(0.0)
    }
}

/// Generates the request trace for a whole scenario.
///
/// # Arguments
///
/// * `pattern` - Behaviour pattern
/// * `params` - Pattern shape parameters
/// * `sim` - Timing and seed
///
/// # Returns
///
/// One flag per tick, `true` where a service request arrives.
pub fn generate_requests(pattern: DemandPattern, params: &DemandParams, sim: &SimConfig) -> Vec<bool> {
    let ticks = sim.total_ticks();
    match pattern {
        DemandPattern::SteadyDaily => (0..ticks)
            .map(|t| {
                let mut rng = tick_rng(sim.seed, DEMAND_STREAM, t);
                let base = params.hourly_rate(sim.time_of_day_s(t));
                let p = (base + gaussian_noise(&mut rng, params.probability_noise_std)).clamp(0.0, 1.0);
                rng.random::<f64>() < p
            })
            .collect(),
        DemandPattern::Periodic => {
            let period = params.period_ticks.max(1);
            (0..ticks).map(|t| t % period < params.period_burst_ticks).collect()
        }
        DemandPattern::UniformRandom => (0..ticks)
            .map(|t| tick_rng(sim.seed, DEMAND_STREAM, t).random::<f64>() < params.random_rate)
            .collect(),
        DemandPattern::Bursty => bursty(params, ticks, sim.seed),
    }
}

fn bursty(params: &DemandParams, ticks: usize, seed: u64) -> Vec<bool> {
    let mut rng = StdRng::seed_from_u64(seed.wrapping_add(DEMAND_STREAM));
    let mut in_burst = false;
    let mut remaining = 0_i64;
    let mut out = Vec::with_capacity(ticks);

    for _ in 0..ticks {
        if remaining <= 0 {
            in_burst = !in_burst;
            let (mean, jitter) = if in_burst {
                (params.bursty_burst_ticks, params.bursty_burst_jitter)
            } else {
                (params.bursty_idle_ticks, params.bursty_idle_jitter)
            };
            let jitter = jitter as i64;
            let offset = if jitter > 0 {
                rng.random_range(-jitter..=jitter)
            } else {
                0
            };
            remaining = (mean as i64 + offset).max(1);
        }
        let rate = if in_burst {
            params.bursty_burst_rate
        } else {
            params.bursty_idle_rate
        };
        out.push(rng.random::<f64>() < rate);
        remaining -= 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sim(ticks: usize) -> SimConfig {
        SimConfig::new(ticks, 1.0, 42)
    }

    fn rate(trace: &[bool]) -> f64 {
        trace.iter().filter(|&&r| r).count() as f64 / trace.len() as f64
    }

    #[test]
    fn periodic_bursts_at_fixed_offsets() {
        let trace = generate_requests(DemandPattern::Periodic, &DemandParams::default(), &sim(900));
        assert!(trace[0] && trace[19]);
        assert!(!trace[20] && !trace[299]);
        assert!(trace[300] && trace[319]);
        assert_eq!(trace.iter().filter(|&&r| r).count(), 60);
    }

    #[test]
    fn uniform_rate_is_close_to_configured() {
        let trace = generate_requests(DemandPattern::UniformRandom, &DemandParams::default(), &sim(20_000));
        assert!((rate(&trace) - 0.15).abs() < 0.02);
    }

    #[test]
    fn steady_daily_follows_hour_of_day() {
        let params = DemandParams::default();
        let night = SimConfig::new(3600, 1.0, 7);
        let afternoon = SimConfig::new(3600, 1.0, 7).starting_at(15.0 * 3600.0);
        let quiet = generate_requests(DemandPattern::SteadyDaily, &params, &night);
        let busy = generate_requests(DemandPattern::SteadyDaily, &params, &afternoon);
        assert!(rate(&quiet) < 0.05);
        assert!((rate(&busy) - 0.30).abs() < 0.05);
    }

    #[test]
    fn bursty_alternates_between_phases() {
        let trace = generate_requests(DemandPattern::Bursty, &DemandParams::default(), &sim(5000));
        let r = rate(&trace);
        assert!(r > 0.02 && r < 0.4, "rate {r}");
    }

    #[test]
    fn same_seed_same_trace() {
        for pattern in [
            DemandPattern::SteadyDaily,
            DemandPattern::Periodic,
            DemandPattern::UniformRandom,
            DemandPattern::Bursty,
        ] {
            let a = generate_requests(pattern, &DemandParams::default(), &sim(2000));
            let b = generate_requests(pattern, &DemandParams::default(), &sim(2000));
            assert_eq!(a, b, "{pattern:?}");
        }
    }

    #[test]
    fn names_round_trip_and_aliases_parse() {
        for name in DemandPattern::NAMES {
            assert!(DemandPattern::from_name(name).is_some(), "{name}");
        }
        assert_eq!(DemandPattern::from_name("realistic"), Some(DemandPattern::SteadyDaily));
        assert_eq!(DemandPattern::Bursty.name(), "bursty");
        assert_eq!(DemandPattern::from_name("weekly"), None);
    }

    #[test]
    fn pattern_deserializes_from_alias() {
        let p: DemandPattern = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(p, DemandPattern::UniformRandom);
    }
}
