//! Post-hoc per-algorithm metrics computed from tick records.

use std::fmt;

use serde::Serialize;

use super::controller::Bookkeeping;
use super::engine::RunStatus;
use super::types::TickRecord;

/// Aggregate metrics of one algorithm's run.
///
/// Computed post-hoc from `&[TickRecord]` so the report always agrees with
/// the exported trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlgorithmReport {
    pub name: String,
    /// Type tag of the algorithm.
    pub kind: String,
    pub status: RunStatus,
    pub ticks: usize,
    /// Energy the controller accounted for (J).
    pub total_energy_j: f64,
    /// Electrical energy drawn from the pack (J).
    pub battery_energy_j: f64,
    /// Served share of requests (%), 100 when there were none.
    pub quality_pct: f64,
    /// Quality fraction per joule.
    pub energy_efficiency: f64,
    pub active_time_s: f64,
    pub active_pct: f64,
    pub wakeups: usize,
    pub requests_total: usize,
    pub requests_served: usize,
    pub requests_missed: usize,
    pub override_events: usize,
    pub skipped_corrections: usize,
    pub peak_temperature_c: f64,
    pub final_soc: f64,
    /// RMS error of the current estimate (A) against the true current of the
    /// tick it was measured on, for estimating controllers.
    pub current_rmse_a: Option<f64>,
    pub prediction_accuracy: Option<f64>,
    /// Energy saved relative to the baseline (%).
    pub energy_savings_pct: Option<f64>,
    /// Quality relative to the baseline (percentage points).
    pub quality_delta_pts: Option<f64>,
}

impl AlgorithmReport {
    /// Computes all metrics from a run's records.
    ///
    /// # Arguments
    ///
    /// * `name` - Algorithm display name
    /// * `kind` - Algorithm type tag
    /// * `records` - Tick records, possibly cut short by a failure
    /// * `dt_s` - Tick length in seconds
    /// * `status` - How the run ended
    /// * `book` - The controller's own totals
    pub fn from_records(
        name: &str,
        kind: &str,
        records: &[TickRecord],
        dt_s: f64,
        status: RunStatus,
        book: &Bookkeeping,
    ) -> Self {
        let ticks = records.len();
        let mut battery_energy_j = 0.0;
        let mut active_ticks = 0_usize;
        let mut requests_total = 0_usize;
        let mut requests_served = 0_usize;
        let mut overrides = 0_usize;
        let mut skipped = 0_usize;
        let mut peak_temperature_c = f64::NEG_INFINITY;
        let mut sq_err = 0.0;
        let mut estimated = 0_usize;
        // a tick's estimate is built from the previous tick's reading
        let mut prev_current_a: Option<f64> = None;

        for r in records {
            battery_energy_j += r.battery_power_w * dt_s;
            if r.active {
                active_ticks += 1;
            }
            if r.request {
                requests_total += 1;
                if r.served {
                    requests_served += 1;
                }
            }
            peak_temperature_c = peak_temperature_c.max(r.true_temperature_c);
            if let Some(d) = &r.diagnostics {
                if let Some(true_a) = prev_current_a {
                    let err = d.estimated_current_a - true_a;
                    sq_err += err * err;
                    estimated += 1;
                }
                if d.overridden {
                    overrides += 1;
                }
                if d.correction_skipped {
                    skipped += 1;
                }
            }
            prev_current_a = Some(r.true_current_a);
        }

        let total_energy_j = records.last().map_or(0.0, |r| r.energy_j);
        let quality_pct = if requests_total > 0 {
            100.0 * requests_served as f64 / requests_total as f64
        } else {
            100.0
        };
        let energy_efficiency = if total_energy_j > 0.0 {
            quality_pct / 100.0 / total_energy_j
        } else {
            0.0
        };
        let active_time_s = active_ticks as f64 * dt_s;
        let active_pct = if ticks > 0 {
            100.0 * active_ticks as f64 / ticks as f64
        } else {
            0.0
        };

        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            status,
            ticks,
            total_energy_j,
            battery_energy_j,
            quality_pct,
            energy_efficiency,
            active_time_s,
            active_pct,
            wakeups: book.wakeups,
            requests_total,
            requests_served,
            requests_missed: requests_total - requests_served,
            override_events: overrides,
            skipped_corrections: skipped,
            peak_temperature_c: if ticks > 0 { peak_temperature_c } else { 0.0 },
            final_soc: records.last().map_or(0.0, |r| r.soc),
            current_rmse_a: (estimated > 0).then(|| (sq_err / estimated as f64).sqrt()),
            prediction_accuracy: book.prediction_accuracy(),
            energy_savings_pct: None,
            quality_delta_pts: None,
        }
    }

    /// Fills the relative metrics against `baseline`.
    pub fn compare_to(&mut self, baseline: &AlgorithmReport) {
        self.energy_savings_pct = (baseline.total_energy_j > 0.0)
            .then(|| (1.0 - self.total_energy_j / baseline.total_energy_j) * 100.0);
        self.quality_delta_pts = Some(self.quality_pct - baseline.quality_pct);
    }
}

impl fmt::Display for AlgorithmReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "--- {} ({}) ---", self.name, self.kind)?;
        if let RunStatus::Failed { tick, reason } = &self.status {
            writeln!(f, "Status:                FAILED at tick {tick}: {reason}")?;
        }
        writeln!(f, "Total energy:          {:.1} J", self.total_energy_j)?;
        writeln!(f, "Battery energy:        {:.1} J", self.battery_energy_j)?;
        writeln!(
            f,
            "Service quality:       {:.1}% ({}/{} served)",
            self.quality_pct, self.requests_served, self.requests_total
        )?;
        writeln!(
            f,
            "Active time:           {:.0} s ({:.1}%)",
            self.active_time_s, self.active_pct
        )?;
        writeln!(f, "Wake-ups:              {}", self.wakeups)?;
        writeln!(f, "Peak temperature:      {:.2} C", self.peak_temperature_c)?;
        write!(f, "Final SoC:             {:.1}%", self.final_soc * 100.0)?;
        if let Some(acc) = self.prediction_accuracy {
            write!(f, "\nPrediction accuracy:   {:.1}%", acc * 100.0)?;
        }
        if let Some(rmse) = self.current_rmse_a {
            write!(f, "\nCurrent RMSE:          {rmse:.3} A")?;
            write!(
                f,
                "\nOverrides / skipped:   {} / {}",
                self.override_events, self.skipped_corrections
            )?;
        }
        if let (Some(s), Some(q)) = (self.energy_savings_pct, self.quality_delta_pts) {
            write!(f, "\nVs baseline:           {s:+.1}% energy, {q:+.1} pts quality")?;
        }
        Ok(())
    }
}
