//! Readers for loopback captures and the CSV files derived from them.
//!
//! Captures are plain comma-separated text: no quoting, no escaping. A value
//! containing a comma shifts every following column, and that is propagated
//! as-is.

use std::fs::File;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stats::MeasurementRow;

/// A raw capture: the header line and every data row in file order.
#[derive(Debug, Clone)]
pub struct RawCapture {
    pub path: PathBuf,
    pub header: Vec<String>,
    pub rows: Vec<MeasurementRow>,
}

/// Reads a CSV file into a table of cells, header row included.
///
/// Blank lines are skipped. Rows may have different lengths.
pub fn read_table(path: &Path) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|e| Error::format(path, e))?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .from_reader(file);

    let mut table = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| Error::format(path, format!("row {}: {}", index, e)))?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        table.push(record.iter().map(str::to_string).collect());
    }

    debug!(path = %path.display(), rows = table.len(), "CSV table loaded");
    Ok(table)
}

/// Reads and parses a raw capture produced by `loopback_test`.
pub fn read_capture(path: &Path) -> Result<RawCapture> {
    let mut table = read_table(path)?.into_iter();
    let header = table
        .next()
        .ok_or_else(|| Error::format(path, "file is empty, no header line"))?;

    let mut rows = Vec::new();
    for (index, fields) in table.enumerate() {
        // Data row indices are 1-based so they match the file's line numbers minus the header.
        let row = MeasurementRow::from_fields(&fields)
            .map_err(|reason| Error::format(path, format!("data row {}: {}", index + 1, reason)))?;
        rows.push(row);
    }

    Ok(RawCapture {
        path: path.to_path_buf(),
        header,
        rows,
    })
}
