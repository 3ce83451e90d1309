//! Stochastic load disturbances.
//!
//! Arrivals are a pure function of `(seed, tick)`: the process holds no
//! mutable state, so every algorithm in a batch sees the same spikes no matter
//! how runs are scheduled.

use rand::Rng;
use serde::Serialize;

use super::types::{DISTURBANCE_STREAM, tick_rng};

/// A single load spike.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisturbanceEvent {
    /// Tick at which the spike starts.
    pub onset_tick: usize,
    /// Extra current drawn while active (A, >= 0).
    pub magnitude_a: f64,
    /// Number of ticks the spike lasts (>= 1).
    pub duration_ticks: usize,
}

impl DisturbanceEvent {
    /// Whether the event draws current at `tick`.
    pub fn is_active_at(&self, tick: usize) -> bool {
        tick >= self.onset_tick && tick < self.onset_tick + self.duration_ticks
    }
}

/// Poisson-style arrival process for load spikes.
#[derive(Debug, Clone)]
pub struct DisturbanceProcess {
    seed: u64,
    rate_per_tick: f64,
    magnitude_a: (f64, f64),
    duration_ticks: (usize, usize),
}

impl DisturbanceProcess {
    /// Creates a disturbance process.
    ///
    /// # Arguments
    ///
    /// * `seed` - Scenario seed
    /// * `rate_per_tick` - Arrival probability per tick (0.0 to 1.0)
    /// * `magnitude_a` - Inclusive `(min, max)` spike current in amps
    /// * `duration_ticks` - Inclusive `(min, max)` spike length in ticks
    ///
    /// # Panics
    ///
    /// Panics if the rate is outside `[0, 1]`, a range is inverted, the
    /// magnitude is negative, or the minimum duration is zero.
    pub fn new(
        seed: u64,
        rate_per_tick: f64,
        magnitude_a: (f64, f64),
        duration_ticks: (usize, usize),
    ) -> Self {
        assert!((0.0..=1.0).contains(&rate_per_tick));
        assert!(magnitude_a.0 >= 0.0 && magnitude_a.0 <= magnitude_a.1);
        assert!(duration_ticks.0 >= 1 && duration_ticks.0 <= duration_ticks.1);
        Self {
            seed,
            rate_per_tick,
            magnitude_a,
            duration_ticks,
        }
    }

    /// A process that never fires.
    pub fn quiet(seed: u64) -> Self {
        Self::new(seed, 0.0, (0.0, 0.0), (1, 1))
    }

    /// The event starting exactly at `tick`, if one arrives there.
    pub fn arrival_at(&self, tick: usize) -> Option<DisturbanceEvent> {
        if self.rate_per_tick <= 0.0 {
            return None;
        }
        let mut rng = tick_rng(self.seed, DISTURBANCE_STREAM, tick);
        if rng.random::<f64>() >= self.rate_per_tick {
            return None;
        }
        let (lo, hi) = self.magnitude_a;
        let magnitude_a = if hi > lo { rng.random_range(lo..=hi) } else { lo };
        let (dlo, dhi) = self.duration_ticks;
        let duration_ticks = if dhi > dlo {
            rng.random_range(dlo..=dhi)
        } else {
            dlo
        };
        Some(DisturbanceEvent {
            onset_tick: tick,
            magnitude_a,
            duration_ticks,
        })
    }

    /// All events drawing current at `tick`, oldest first.
    pub fn active_at(&self, tick: usize) -> Vec<DisturbanceEvent> {
        let earliest = tick.saturating_sub(self.duration_ticks.1 - 1);
        (earliest..=tick)
            .filter_map(|s| self.arrival_at(s))
            .filter(|e| e.is_active_at(tick))
            .collect()
    }

    /// Total disturbance current at `tick`; overlapping spikes add.
    pub fn current_at(&self, tick: usize) -> f64 {
        self.active_at(tick).iter().map(|e| e.magnitude_a).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(seed: u64) -> DisturbanceProcess {
        DisturbanceProcess::new(seed, 0.05, (0.3, 1.2), (5, 30))
    }

    #[test]
    fn arrivals_are_pure_functions_of_seed_and_tick() {
        let a = process(42);
        let b = process(42);
        // query in different orders
        let forward: Vec<_> = (0..500).map(|t| a.arrival_at(t)).collect();
        let backward: Vec<_> = (0..500).rev().map(|t| b.arrival_at(t)).collect();
        let backward: Vec<_> = backward.into_iter().rev().collect();
        assert_eq!(forward, backward);
    }

    #[test]
    fn different_seeds_give_different_arrivals() {
        let a: Vec<_> = (0..500).map(|t| process(1).arrival_at(t)).collect();
        let b: Vec<_> = (0..500).map(|t| process(2).arrival_at(t)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn drawn_values_stay_in_range() {
        let p = process(7);
        let events: Vec<_> = (0..5000).filter_map(|t| p.arrival_at(t)).collect();
        assert!(!events.is_empty());
        for e in &events {
            assert!((0.3..=1.2).contains(&e.magnitude_a));
            assert!((5..=30).contains(&e.duration_ticks));
        }
    }

    #[test]
    fn arrival_rate_roughly_matches() {
        let p = process(9);
        let n = 20_000;
        let count = (0..n).filter(|&t| p.arrival_at(t).is_some()).count();
        let rate = count as f64 / n as f64;
        assert!((rate - 0.05).abs() < 0.01, "rate was {rate}");
    }

    #[test]
    fn events_expire_after_duration() {
        let p = DisturbanceProcess::new(3, 1.0, (0.5, 0.5), (4, 4));
        let e = p.arrival_at(10);
        assert_eq!(
            e,
            Some(DisturbanceEvent {
                onset_tick: 10,
                magnitude_a: 0.5,
                duration_ticks: 4
            })
        );
        let e = e.unwrap();
        assert!(e.is_active_at(13));
        assert!(!e.is_active_at(14));
    }

    #[test]
    fn overlapping_spikes_add_up() {
        // every tick fires a 4-tick spike of 0.5 A, so 4 overlap once warm
        let p = DisturbanceProcess::new(3, 1.0, (0.5, 0.5), (4, 4));
        assert!((p.current_at(0) - 0.5).abs() < 1e-12);
        assert!((p.current_at(10) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn quiet_process_never_fires() {
        let p = DisturbanceProcess::quiet(1);
        assert!((0..1000).all(|t| p.current_at(t) == 0.0));
    }
}
