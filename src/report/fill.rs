use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::aggregator::{AGGREGATE_LABEL, AggregateOutput};
use crate::error::{Error, Result};
use crate::parser::read_table;
use crate::report::ods::{CellValue, OdsDocument};

/// Sheet receiving the raw capture.
pub const DATA_SHEET: &str = "Data";

/// Rows above the first data row on every chart sheet.
pub const SHEET_HEADER_ROWS: usize = 2;

/// Leading columns (date, label, operation, device) that stay text.
pub const TEXT_COLUMNS: usize = 4;

/// A derived CSV file and the template sheet it feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetSource {
    pub sheet: String,
    pub path: PathBuf,
}

/// Per-device sheet sources for an aggregation run, in device order.
pub fn sheet_sources(output: &AggregateOutput) -> Vec<SheetSource> {
    output
        .devices
        .iter()
        .map(|d| SheetSource {
            sheet: d.name.clone(),
            path: d.path.clone(),
        })
        .collect()
}

/// Clones `template` to `report_path` and fills it.
///
/// The aggregate table goes into the `Aggregated` sheet, each device table
/// into the sheet named after the device, and the raw capture into a new
/// `Data` sheet. If filling fails part way, whatever was written is still
/// saved before the error is returned.
#[tracing::instrument(skip_all, fields(template = %template.display(), report = %report_path.display()))]
pub fn fill_report(
    template: &Path,
    aggregate: &Path,
    devices: &[SheetSource],
    raw_csv: &Path,
    report_path: &Path,
) -> Result<PathBuf> {
    std::fs::copy(template, report_path).map_err(|e| Error::template(template, e))?;
    let mut doc = OdsDocument::open(report_path).map_err(|e| Error::template(report_path, e))?;

    let filled = populate(&mut doc, aggregate, devices, raw_csv);
    if let Err(e) = &filled {
        warn!(error = %e, "Report incomplete, saving partial result");
    }

    let saved = doc
        .save()
        .map_err(|e| Error::template(report_path, format!("saving failed: {}", e)));
    filled?;
    saved?;

    info!(path = %report_path.display(), "Charts saved");
    Ok(report_path.to_path_buf())
}

fn populate(doc: &mut OdsDocument, aggregate: &Path, devices: &[SheetSource], raw_csv: &Path) -> Result<()> {
    let mut sources = Vec::with_capacity(devices.len() + 1);
    sources.push(SheetSource {
        sheet: AGGREGATE_LABEL.to_string(),
        path: aggregate.to_path_buf(),
    });
    sources.extend_from_slice(devices);

    let mut tables = Vec::with_capacity(sources.len());
    for source in &sources {
        if !doc.has_sheet(&source.sheet) {
            return Err(Error::template(
                doc.path(),
                format!("template has no sheet named '{}'", source.sheet),
            ));
        }
        tables.push((source.sheet.as_str(), read_table(&source.path)?));
    }

    let expected = tables[0].1.len();
    for (sheet, table) in &tables {
        if table.len() != expected {
            return Err(Error::DataShape {
                sheet: sheet.to_string(),
                expected,
                found: table.len(),
            });
        }
    }

    let columns = tables[0].1.first().map_or(0, Vec::len);
    debug!(rows = expected, columns, "Filling chart sheets");
    for (sheet, table) in &tables {
        fill_chart_sheet(doc, sheet, table, columns)?;
    }

    let raw = read_table(raw_csv)?;
    fill_data_sheet(doc, &raw)
}

/// Writes every data row of `table` (header skipped) below the sheet's header rows.
fn fill_chart_sheet(doc: &mut OdsDocument, sheet: &str, table: &[Vec<String>], columns: usize) -> Result<()> {
    for (r, row) in table.iter().enumerate().skip(1) {
        let dest_row = SHEET_HEADER_ROWS + r - 1;
        for col in 0..columns {
            let write_err = |reason: String| Error::Write {
                sheet: sheet.to_string(),
                row: dest_row,
                col,
                reason,
            };

            let raw = row
                .get(col)
                .ok_or_else(|| write_err(format!("source row {} has only {} columns", r, row.len())))?;
            let value = cell_value(raw, col >= TEXT_COLUMNS).map_err(write_err)?;
            doc.set_cell(sheet, dest_row, col, &value).map_err(write_err)?;
        }
    }
    Ok(())
}

/// Adds the `Data` sheet and copies the raw capture into it cell by cell.
///
/// The header row is always text. Missing trailing fields and empty values
/// are left blank.
fn fill_data_sheet(doc: &mut OdsDocument, raw: &[Vec<String>]) -> Result<()> {
    let rows = raw.len();
    let columns = raw.first().map_or(0, Vec::len);
    debug!(rows, columns, "Copying raw capture");

    doc.add_sheet(DATA_SHEET, rows, columns)
        .map_err(|e| Error::template(doc.path(), e))?;

    for (r, row) in raw.iter().enumerate() {
        for (col, field) in row.iter().enumerate().take(columns) {
            if field.is_empty() {
                continue;
            }
            let write_err = |reason: String| Error::Write {
                sheet: DATA_SHEET.to_string(),
                row: r,
                col,
                reason,
            };
            let value = cell_value(field, r > 0 && col >= TEXT_COLUMNS).map_err(write_err)?;
            doc.set_cell(DATA_SHEET, r, col, &value).map_err(write_err)?;
        }
    }
    Ok(())
}

/// Integers stay integers. Decimals are kept exactly as read, never truncated.
fn cell_value(raw: &str, numeric: bool) -> std::result::Result<CellValue, String> {
    if !numeric {
        return Ok(CellValue::Text(raw.to_string()));
    }
    let trimmed = raw.trim();
    if let Ok(number) = trimmed.parse::<i64>() {
        return Ok(CellValue::Int(number));
    }
    match trimmed.parse::<f64>() {
        Ok(number) if number.is_finite() => Ok(CellValue::Float(number)),
        _ => Err(format!("'{}' is not a number", raw)),
    }
}
