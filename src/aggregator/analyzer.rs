use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::aggregator::aggregate::{aggregate_rows, check_device_order, check_shape, resolve_devices};
use crate::aggregator::types::{AggregateOutput, AggregateRequest, DeviceOutput};
use crate::capture::{CaptureName, capture_date};
use crate::error::{Error, Result};
use crate::modes;
use crate::output::write_rows;
use crate::parser::read_capture;
use crate::registry::DeviceLookup;
use crate::stats::{LABEL_COLUMN, POWER_MODE_HEADER, REPORT_COLUMNS};

/// Splits a raw capture per device, averages the trials of every
/// configuration and writes the aggregate and per-device CSV files.
///
/// The capture is validated completely before anything is written. If a
/// write fails, files already written by this call are removed.
#[tracing::instrument(skip(raw_csv, request, lookup), fields(raw = %raw_csv.display(), test = %request.test))]
pub fn aggregate<L: DeviceLookup + ?Sized>(
    raw_csv: &Path,
    request: &AggregateRequest,
    lookup: &L,
) -> Result<AggregateOutput> {
    let capture = read_capture(raw_csv)?;
    let header = adjusted_header(raw_csv, &capture.header)?;

    let configurations = check_shape(&capture, request.device_ids.len())?;
    let devices = resolve_devices(&capture, &request.device_ids, lookup)?;
    check_device_order(&capture, &devices)?;

    debug!(
        rows = capture.rows.len(),
        configurations,
        devices = ?devices.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        "Capture layout validated"
    );

    let tables = aggregate_rows(&capture.rows, &devices);

    let labels: Vec<String> = tables[0].iter().map(|r| r.label.clone()).collect();
    warn_on_unexpected_modes(&labels);

    // A single date stamps every output, even if the campaign crossed midnight.
    let name = CaptureName {
        date: capture_date(capture.rows.first().map(|r| r.date.as_str())),
        test: request.test.to_string(),
        size: request.size,
        iterations: request.iterations,
    };

    std::fs::create_dir_all(&request.out_dir)?;
    let aggregate_path = name.aggregate_file(&request.out_dir);
    let mut targets: Vec<PathBuf> = vec![aggregate_path.clone()];
    targets.extend(devices.iter().map(|d| name.device_file(&request.out_dir, &d.name)));

    let mut written: Vec<&Path> = Vec::with_capacity(targets.len());
    for (path, table) in targets.iter().zip(&tables) {
        if let Err(e) = write_rows(path, &header, table) {
            for done in written.iter().copied().chain(std::iter::once(path.as_path())) {
                let _ = std::fs::remove_file(done);
            }
            return Err(e);
        }
        written.push(path);
    }

    let output = AggregateOutput {
        capture: name,
        aggregate: aggregate_path,
        devices: devices
            .into_iter()
            .zip(targets.into_iter().skip(1))
            .map(|(d, path)| DeviceOutput { name: d.name, path })
            .collect(),
        configurations: labels,
    };

    info!(
        configurations = output.configurations.len(),
        aggregate = %output.aggregate.display(),
        device_files = output.devices.len(),
        "Measurements compiled"
    );

    Ok(output)
}

/// Keeps the columns up to `throughput_jitter` and relabels the description column.
fn adjusted_header(path: &Path, raw: &[String]) -> Result<Vec<String>> {
    if raw.len() < REPORT_COLUMNS {
        return Err(Error::format(
            path,
            format!(
                "header has {} columns, at least {} expected",
                raw.len(),
                REPORT_COLUMNS
            ),
        ));
    }
    let mut header = raw[..REPORT_COLUMNS].to_vec();
    header[LABEL_COLUMN] = POWER_MODE_HEADER.to_string();
    Ok(header)
}

/// Logs configurations that do not line up with the power-mode table.
///
/// Fewer blocks than modes is normal for an interrupted campaign and not reported.
fn warn_on_unexpected_modes(labels: &[String]) {
    let expected: Vec<&str> = modes::names().collect();
    for (index, label) in labels.iter().enumerate() {
        match expected.get(index) {
            Some(mode) if *mode == label.as_str() => {}
            Some(mode) => warn!(block = index, found = %label, expected = %mode, "Configuration out of table order"),
            None => warn!(block = index, found = %label, "Configuration beyond the power-mode table"),
        }
    }
}
