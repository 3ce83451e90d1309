//! CSV export of tick traces and JSON export of comparison reports.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::SimError;
use crate::runner::ComparisonReport;
use crate::sim::types::TickRecord;

/// Column header of the tick trace.
///
/// The last six columns are empty for controllers without an estimator.
const HEADER: &str = "tick,time_s,request,served,active,duty_cycle,power_w,energy_j,\
                      voltage_v,temperature_c,soc,true_current_a,true_resistance_ohm,\
                      true_temperature_c,battery_power_w,disturbance,\
                      est_current_a,est_resistance_ohm,aggressiveness,effort,\
                      overridden,correction_skipped";

/// Exports one algorithm's tick records to a CSV file at the given path.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_csv(records: &[TickRecord], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(records, buf)
}

/// Writes tick records as CSV to any writer.
///
/// Output is deterministic for identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_csv(records: &[TickRecord], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    wtr.write_record(HEADER.split(',').map(str::trim))?;

    for r in records {
        let mut row = vec![
            r.tick.to_string(),
            format!("{:.1}", r.time_s),
            r.request.to_string(),
            r.served.to_string(),
            r.active.to_string(),
            format!("{:.4}", r.duty_cycle),
            format!("{:.4}", r.power_w),
            format!("{:.4}", r.energy_j),
            format!("{:.4}", r.voltage_v),
            format!("{:.4}", r.temperature_c),
            format!("{:.6}", r.soc),
            format!("{:.4}", r.true_current_a),
            format!("{:.4}", r.true_resistance_ohm),
            format!("{:.4}", r.true_temperature_c),
            format!("{:.4}", r.battery_power_w),
            r.disturbance.to_string(),
        ];
        match &r.diagnostics {
            Some(d) => row.extend([
                format!("{:.4}", d.estimated_current_a),
                format!("{:.4}", d.estimated_resistance_ohm),
                d.aggressiveness.map(|l| format!("{l:.4}")).unwrap_or_default(),
                format!("{:.4}", d.effort),
                d.overridden.to_string(),
                d.correction_skipped.to_string(),
            ]),
            None => row.extend(std::iter::repeat_n(String::new(), 6)),
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}

/// File name for an algorithm's trace: lowercase, with anything other than
/// ASCII letters, digits, `-` and `_` replaced by `_`.
pub fn trace_file_name(algorithm: &str) -> String {
    let stem: String = algorithm
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{stem}.csv")
}

/// Writes one CSV per algorithm into `dir`, creating it if needed.
///
/// # Errors
///
/// Returns [`SimError::Io`] if the directory or a file cannot be written.
pub fn export_traces(report: &ComparisonReport, dir: &Path) -> Result<Vec<PathBuf>, SimError> {
    fs::create_dir_all(dir)?;
    let mut paths = Vec::with_capacity(report.reports.len());
    for (r, records) in report.reports.iter().zip(&report.traces) {
        let path = dir.join(trace_file_name(&r.name));
        export_csv(records, &path)?;
        info!(algorithm = %r.name, path = %path.display(), "trace written");
        paths.push(path);
    }
    Ok(paths)
}

/// Writes the comparison report as pretty JSON.
///
/// # Errors
///
/// Returns [`SimError::Json`] if serialization or writing fails.
pub fn write_json_report(report: &ComparisonReport, writer: impl Write) -> Result<(), SimError> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

/// Writes the comparison report as pretty JSON to `path`.
///
/// # Errors
///
/// Returns [`SimError`] if the file cannot be created or written.
pub fn export_json_report(report: &ComparisonReport, path: &Path) -> Result<(), SimError> {
    let mut buf = io::BufWriter::new(File::create(path)?);
    write_json_report(report, &mut buf)?;
    buf.flush()?;
    Ok(())
}
