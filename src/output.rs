//! Output persistence: derived CSV files and run summaries.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, WriterBuilder};
use serde::Serialize;
use tracing::{debug, info};

use crate::aggregator::AggregateOutput;
use crate::error::{Error, Result};
use crate::stats::MeasurementRow;

/// What a `process` or `report` invocation produced.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub raw: PathBuf,
    #[serde(flatten)]
    pub aggregate: AggregateOutput,
    pub report: Option<PathBuf>,
}

/// Logs a run summary using Rust's debug pretty-print format.
pub fn print_pretty(summary: &RunSummary) {
    debug!("{:#?}", summary);
}

/// Prints a run summary as pretty JSON on stdout.
pub fn print_json(summary: &RunSummary) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)
        .map_err(|e| Error::format(&summary.raw, e))?;
    println!("{}", json);
    Ok(())
}

/// Logs every file a run produced, one line each.
pub fn log_summary(summary: &RunSummary) {
    info!(path = %summary.aggregate.aggregate.display(), "Aggregate measurements");
    for device in &summary.aggregate.devices {
        info!(device = %device.name, path = %device.path.display(), "Device measurements");
    }
    if let Some(report) = &summary.report {
        info!(path = %report.display(), "Charts");
    }
}

/// Creates (or truncates) `path` and writes the header followed by `rows`.
///
/// Fields are written bare, never quoted, to match the capture format.
pub fn write_rows(path: &Path, header: &[String], rows: &[MeasurementRow]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing CSV file");

    let write_err = |e: csv::Error| Error::format(path, e);

    let file = File::create(path).map_err(|e| Error::format(path, e))?;
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .quote_style(QuoteStyle::Never)
        .from_writer(file);

    writer.write_record(header).map_err(write_err)?;
    for row in rows {
        writer.write_record(row.to_record()).map_err(write_err)?;
    }
    writer.flush().map_err(|e| Error::format(path, e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn header() -> Vec<String> {
        (0..23).map(|i| format!("h{}", i)).collect()
    }

    #[test]
    fn test_write_rows_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let row = MeasurementRow {
            date: "2016-01-20 10:11:12".to_string(),
            label: "PWM-G1 - 1 lane".to_string(),
            operation: "sink".to_string(),
            device: "APB2".to_string(),
            size: "512".to_string(),
            iterations: "100".to_string(),
            error_count: 3,
            stats: [7; 16],
        };
        write_rows(&path, &header(), &[row.clone(), row]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("h0,h1,"));
        assert!(lines[1].starts_with("2016-01-20 10:11:12,PWM-G1 - 1 lane,sink,APB2,512,100,3,7,"));
        assert_eq!(lines[1].split(',').count(), 23);
    }

    #[test]
    fn test_write_rows_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        fs::write(&path, "stale\nstale\nstale\nstale\n").unwrap();

        write_rows(&path, &header(), &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn test_write_rows_into_missing_dir_fails() {
        let err = write_rows(Path::new("/nonexistent/dir/out.csv"), &header(), &[]).unwrap_err();
        assert!(matches!(err, Error::Format { .. }));
    }
}
