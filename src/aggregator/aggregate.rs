use crate::aggregator::types::ResolvedDevice;
use crate::aggregator::utility::truncated_mean;
use crate::aggregator::{AGGREGATE_LABEL, TRIALS_PER_CONFIGURATION};
use crate::error::{Error, Result};
use crate::parser::RawCapture;
use crate::registry::DeviceLookup;
use crate::stats::{MeasurementRow, STAT_NAMES};

/// Rows one configuration occupies in a capture.
pub fn block_size(device_count: usize) -> usize {
    (device_count + 1) * TRIALS_PER_CONFIGURATION
}

/// Validates the capture's row count up front and returns the number of
/// configuration blocks it holds.
pub fn check_shape(capture: &RawCapture, device_count: usize) -> Result<usize> {
    let rows = capture.rows.len();
    let block = block_size(device_count);

    if rows == 0 {
        return Err(Error::shape(&capture.path, "capture holds no data rows"));
    }
    if rows % block != 0 {
        return Err(Error::shape(
            &capture.path,
            format!(
                "{} data rows is not a multiple of {} ({} device(s) + aggregate, {} trials); truncated capture?",
                rows, block, device_count, TRIALS_PER_CONFIGURATION
            ),
        ));
    }

    Ok(rows / block)
}

/// Binds each device row position to a device, from the first trial of the
/// first configuration.
///
/// Membership is decided on the device id; `lookup` only supplies the name.
/// The binding holds for the whole capture: devices are assumed to keep
/// their order and composition from the first block to the last.
pub fn resolve_devices<L: DeviceLookup + ?Sized>(
    capture: &RawCapture,
    device_ids: &[u32],
    lookup: &L,
) -> Result<Vec<ResolvedDevice>> {
    let mut devices: Vec<ResolvedDevice> = Vec::with_capacity(device_ids.len());

    for position in 1..=device_ids.len() {
        let row = capture.rows.get(position).ok_or_else(|| {
            Error::shape(&capture.path, format!("data row {} is missing", position + 1))
        })?;

        let id = row.device_id().ok_or_else(|| {
            Error::shape(
                &capture.path,
                format!("data row {}: no device id in '{}'", position + 1, row.device),
            )
        })?;

        if !device_ids.contains(&id) {
            return Err(Error::shape(
                &capture.path,
                format!(
                    "data row {}: device id {} is not among the bridges under test {:?}",
                    position + 1,
                    id,
                    device_ids
                ),
            ));
        }

        let name = lookup.name_for(id).ok_or_else(|| {
            Error::shape(
                &capture.path,
                format!("data row {}: unknown device id {}", position + 1, id),
            )
        })?;

        if devices.iter().any(|d| d.id == id) {
            return Err(Error::shape(
                &capture.path,
                format!("data row {}: device id {} appears twice in one trial", position + 1, id),
            ));
        }

        devices.push(ResolvedDevice { id, name });
    }

    Ok(devices)
}

/// Checks that every device row of every trial carries the device bound to its position.
pub fn check_device_order(capture: &RawCapture, devices: &[ResolvedDevice]) -> Result<()> {
    let stride = devices.len() + 1;

    for (index, row) in capture.rows.iter().enumerate() {
        let position = index % stride;
        if position == 0 {
            continue;
        }
        let expected = &devices[position - 1];
        match row.device_id() {
            Some(id) if id == expected.id => {}
            found => {
                let found = found.map_or_else(|| format!("'{}'", row.device), |id| format!("id {}", id));
                return Err(Error::shape(
                    &capture.path,
                    format!(
                        "data row {}: found device {} where {} (id {}) was expected",
                        index + 1,
                        found,
                        expected.name,
                        expected.id
                    ),
                ));
            }
        }
    }

    Ok(())
}

/// Collapses the trials of one row position into a single row.
///
/// Metadata comes from the first trial, the error counters are summed
/// (saturating) and each statistic is the truncated mean over the trials.
pub fn average_trials(trials: &[&MeasurementRow], device_label: &str) -> MeasurementRow {
    let Some(first) = trials.first() else {
        return MeasurementRow::default();
    };

    let mut stats = [0i64; STAT_NAMES.len()];
    for (i, stat) in stats.iter_mut().enumerate() {
        let series: Vec<i64> = trials.iter().map(|t| t.stats[i]).collect();
        *stat = truncated_mean(&series);
    }

    MeasurementRow {
        device: device_label.to_string(),
        error_count: trials
            .iter()
            .fold(0i64, |total, t| total.saturating_add(t.error_count)),
        stats,
        ..(*first).clone()
    }
}

/// Averages every configuration block.
///
/// Returns one table per output: index 0 is the aggregate, index `k` the
/// device at position `k`. Each table has one row per configuration.
pub fn aggregate_rows(rows: &[MeasurementRow], devices: &[ResolvedDevice]) -> Vec<Vec<MeasurementRow>> {
    let stride = devices.len() + 1;
    let labels: Vec<&str> = std::iter::once(AGGREGATE_LABEL)
        .chain(devices.iter().map(|d| d.name.as_str()))
        .collect();

    let mut tables: Vec<Vec<MeasurementRow>> = vec![Vec::new(); stride];

    for block in rows.chunks_exact(block_size(devices.len())) {
        for (position, table) in tables.iter_mut().enumerate() {
            let trials: Vec<&MeasurementRow> = (0..TRIALS_PER_CONFIGURATION)
                .map(|t| &block[position + t * stride])
                .collect();
            table.push(average_trials(&trials, labels[position]));
        }
    }

    tables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use std::path::PathBuf;

    fn row(label: &str, device: &str, errors: i64, stat: i64) -> MeasurementRow {
        MeasurementRow {
            date: "2016-01-20 10:11:12".to_string(),
            label: label.to_string(),
            operation: "sink".to_string(),
            device: device.to_string(),
            size: "512".to_string(),
            iterations: "100".to_string(),
            error_count: errors,
            stats: [stat; 16],
        }
    }

    fn capture(rows: Vec<MeasurementRow>) -> RawCapture {
        RawCapture {
            path: PathBuf::from("capture.csv"),
            header: Vec::new(),
            rows,
        }
    }

    fn apb2() -> Vec<ResolvedDevice> {
        vec![ResolvedDevice {
            id: 2,
            name: "APB2".to_string(),
        }]
    }

    /// Two configurations, one device, three trials each.
    fn two_configs() -> Vec<MeasurementRow> {
        let mut rows = Vec::new();
        for (label, base) in [("PWM-G1 - 1 lane", 10), ("PWM-G2 - 1 lane", 20)] {
            for t in 0..3 {
                rows.push(row(label, "agg", t, base + t));
                rows.push(row(label, "endo0:1:2:1:13", t, base * 2 + t));
            }
        }
        rows
    }

    #[test]
    fn test_check_shape() {
        assert_eq!(check_shape(&capture(two_configs()), 1).unwrap(), 2);

        let mut rows = two_configs();
        rows.pop();
        assert!(matches!(check_shape(&capture(rows), 1), Err(Error::Shape { .. })));
        assert!(matches!(check_shape(&capture(Vec::new()), 1), Err(Error::Shape { .. })));
    }

    #[test]
    fn test_resolve_devices() {
        let devices = resolve_devices(&capture(two_configs()), &[2], &Registry::builtin()).unwrap();
        assert_eq!(devices, apb2());
    }

    #[test]
    fn test_resolve_devices_takes_name_from_override() {
        let registry = Registry::builtin().with_override(2, "APB2-left");
        let devices = resolve_devices(&capture(two_configs()), &[2], &registry).unwrap();
        assert_eq!(
            devices,
            vec![ResolvedDevice {
                id: 2,
                name: "APB2-left".to_string(),
            }]
        );
    }

    #[test]
    fn test_resolve_devices_rejects_device_not_under_test() {
        let err = resolve_devices(&capture(two_configs()), &[3], &Registry::builtin()).unwrap_err();
        assert!(matches!(err, Error::Shape { .. }));
    }

    #[test]
    fn test_resolve_devices_rejects_unknown_id() {
        let mut rows = two_configs();
        rows[1].device = "endo0:1:9:1:13".to_string();
        let err = resolve_devices(&capture(rows), &[9], &Registry::builtin()).unwrap_err();
        match err {
            Error::Shape { reason, .. } => assert!(reason.contains("unknown device id 9")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_check_device_order_catches_swapped_device() {
        let mut rows = two_configs();
        rows[9].device = "endo0:1:3:1:13".to_string();
        let err = check_device_order(&capture(rows), &apb2()).unwrap_err();
        match err {
            Error::Shape { reason, .. } => assert!(reason.contains("data row 10")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_aggregate_rows_sums_errors_and_truncates() {
        let tables = aggregate_rows(&two_configs(), &apb2());
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].len(), 2);

        // errors 0 + 1 + 2
        assert_eq!(tables[1][0].error_count, 3);
        // (20 + 21 + 22) / 3
        assert_eq!(tables[1][0].stats[14], 21);
        // (10 + 11 + 12) / 3 for the aggregate
        assert_eq!(tables[0][0].stats[0], 11);
        assert_eq!(tables[0][0].device, AGGREGATE_LABEL);
        assert_eq!(tables[1][1].device, "APB2");
        assert_eq!(tables[1][1].label, "PWM-G2 - 1 lane");
    }

    #[test]
    fn test_average_trials_truncates_instead_of_rounding() {
        let a = row("m", "d", 0, 10);
        let b = row("m", "d", 0, 10);
        let c = row("m", "d", 0, 12);
        let averaged = average_trials(&[&a, &b, &c], "APB2");
        assert_eq!(averaged.stats[14], 10);
    }

    #[test]
    fn test_average_trials_extreme_values_do_not_overflow() {
        let huge = row("m", "d", i64::MAX, i64::MAX);
        let averaged = average_trials(&[&huge, &huge, &huge], "APB2");
        assert_eq!(averaged.error_count, i64::MAX);
        assert_eq!(averaged.stats[0], i64::MAX);
    }
}
