//! One line of a loopback capture and the column layout it follows.

use serde::Serialize;

/// Column index of the configuration label (free-text description in the raw capture).
pub const LABEL_COLUMN: usize = 1;
/// Column index of the sysfs path the measurement was taken on.
pub const DEVICE_COLUMN: usize = 3;
/// Column index of the error counter.
pub const ERROR_COLUMN: usize = 6;
/// First of the sixteen numeric statistics.
pub const FIRST_STAT_COLUMN: usize = 7;
/// Columns kept in derived files: everything up to and including `throughput_jitter`.
pub const REPORT_COLUMNS: usize = FIRST_STAT_COLUMN + STAT_NAMES.len();

/// Header label that replaces the raw `description` column in derived files.
pub const POWER_MODE_HEADER: &str = "Unipro Power Mode";

/// The four latency/throughput families, each contributing min, max, avg and jitter.
pub const STAT_NAMES: [&str; 16] = [
    "req_min",
    "req_max",
    "req_avg",
    "req_jitter",
    "lat_min",
    "lat_max",
    "lat_avg",
    "lat_jitter",
    "gb_lat_min",
    "gb_lat_max",
    "gb_lat_avg",
    "gb_lat_jitter",
    "throughput_min",
    "throughput_max",
    "throughput_avg",
    "throughput_jitter",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MeasurementRow {
    pub date: String,
    pub label: String,
    pub operation: String,
    pub device: String,
    pub size: String,
    pub iterations: String,
    pub error_count: i64,
    /// Statistics in [`STAT_NAMES`] order, truncated to integers.
    pub stats: [i64; 16],
}

impl MeasurementRow {
    /// Builds a row from positional fields.
    ///
    /// Statistics are read as decimals and truncated toward zero, the error
    /// counter must be a plain integer. Anything past `throughput_jitter`
    /// (`lat_iter_1` and friends) is ignored.
    pub fn from_fields(fields: &[String]) -> Result<Self, String> {
        if fields.len() < REPORT_COLUMNS {
            return Err(format!(
                "expected at least {} fields, found {}",
                REPORT_COLUMNS,
                fields.len()
            ));
        }

        let error_count = fields[ERROR_COLUMN]
            .trim()
            .parse::<i64>()
            .map_err(|e| format!("error_count '{}': {}", fields[ERROR_COLUMN], e))?;

        let mut stats = [0i64; 16];
        for (i, stat) in stats.iter_mut().enumerate() {
            let raw = &fields[FIRST_STAT_COLUMN + i];
            *stat = parse_truncated(raw).ok_or_else(|| format!("{} '{}'", STAT_NAMES[i], raw))?;
        }

        Ok(MeasurementRow {
            date: fields[0].clone(),
            label: fields[LABEL_COLUMN].clone(),
            operation: fields[2].clone(),
            device: fields[DEVICE_COLUMN].clone(),
            size: fields[4].clone(),
            iterations: fields[5].clone(),
            error_count,
            stats,
        })
    }

    /// Device id embedded in the sysfs path, e.g. `endo0:1:3:1:13` → 3.
    pub fn device_id(&self) -> Option<u32> {
        self.device.split(':').nth(2)?.trim().parse().ok()
    }

    /// Fields in derived-file column order.
    pub fn to_record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(REPORT_COLUMNS);
        record.push(self.date.clone());
        record.push(self.label.clone());
        record.push(self.operation.clone());
        record.push(self.device.clone());
        record.push(self.size.clone());
        record.push(self.iterations.clone());
        record.push(self.error_count.to_string());
        record.extend(self.stats.iter().map(i64::to_string));
        record
    }
}

/// Parses an integer or decimal and truncates it toward zero.
pub fn parse_truncated(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Ok(v) = raw.parse::<i64>() {
        return Some(v);
    }
    let v = raw.parse::<f64>().ok()?;
    if v.is_finite() { Some(v.trunc() as i64) } else { None }
}
