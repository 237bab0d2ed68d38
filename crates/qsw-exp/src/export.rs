//! Result sinks: per-mode and combined CSV tables plus the JSON report.
//!
//! Rows are written in parameter order. Absent measurements become empty cells.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use qsw_core::{ErrorInfo, Mode, QswError, ResultSet, ResultSets};

use crate::codec::to_canonical_json_pretty;
use crate::report::SweepReport;

/// Header of the per-mode table.
pub const MODE_CSV_HEADER: [&str; 2] = ["Buckets", "Error"];
/// Header of the combined table.
pub const COMBINED_CSV_HEADER: [&str; 3] = ["Mode", "Buckets", "Error"];
/// File name of the combined table.
pub const COMBINED_CSV_FILE: &str = "results.csv";
/// File name of the JSON report.
pub const REPORT_FILE: &str = "sweep_report.json";

fn export_error(path: &Path, err: impl ToString) -> QswError {
    QswError::Io(
        ErrorInfo::new("qsw_exp.export", err.to_string())
            .with_context("path", path.display().to_string()),
    )
}

fn cell(measurement: Option<u64>) -> String {
    measurement.map(|value| value.to_string()).unwrap_or_default()
}

/// File name of the per-mode table, e.g. `results_mode_1.csv`.
pub fn mode_csv_file(mode: Mode) -> String {
    format!("results_mode_{}.csv", mode.token())
}

/// Writes `set` as a `Buckets,Error` table.
pub fn write_mode_csv<W: Write>(set: &ResultSet, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(MODE_CSV_HEADER)?;
    for (parameter, measurement) in set.pairs() {
        wtr.write_record([parameter.to_string(), cell(measurement)])?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes every set as one `Mode,Buckets,Error` table, mode column holding the token.
pub fn write_combined_csv<W: Write>(results: &ResultSets, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(COMBINED_CSV_HEADER)?;
    for set in results.iter() {
        for (parameter, measurement) in set.pairs() {
            wtr.write_record([
                set.mode.token().to_string(),
                parameter.to_string(),
                cell(measurement),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

fn create(path: &Path) -> Result<fs::File, QswError> {
    fs::File::create(path).map_err(|err| export_error(path, err))
}

/// Writes the report and CSV tables into `out`, returning the paths written.
pub fn write_outputs(
    report: &SweepReport,
    out: &Path,
    combined: bool,
) -> Result<Vec<PathBuf>, QswError> {
    fs::create_dir_all(out).map_err(|err| export_error(out, err))?;
    let mut written = Vec::new();

    for set in report.results.iter() {
        let path = out.join(mode_csv_file(set.mode));
        write_mode_csv(set, create(&path)?).map_err(|err| export_error(&path, err))?;
        written.push(path);
    }

    if combined {
        let path = out.join(COMBINED_CSV_FILE);
        write_combined_csv(&report.results, create(&path)?)
            .map_err(|err| export_error(&path, err))?;
        written.push(path);
    }

    let path = out.join(REPORT_FILE);
    fs::write(&path, to_canonical_json_pretty(report)?).map_err(|err| export_error(&path, err))?;
    written.push(path);

    tracing::info!(dir = %out.display(), files = written.len(), "results written");
    Ok(written)
}
