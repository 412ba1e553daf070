//! Naming of a capture and of every artifact derived from it.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::Serialize;

/// Used when a capture has no data row to take a date from.
pub const DEFAULT_CAPTURE_DATE: &str = "19700101-000000";

/// Turns the `date` field of a capture row into a file-name friendly stamp.
///
/// `2016-01-20 10:11:12` becomes `20160120-101112`. Dates in another layout
/// get the same treatment textually: dashes and colons dropped, spaces
/// turned into dashes.
pub fn capture_date(first_row_date: Option<&str>) -> String {
    let Some(raw) = first_row_date.map(str::trim).filter(|d| !d.is_empty()) else {
        return DEFAULT_CAPTURE_DATE.to_string();
    };

    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        Ok(date) => date.format("%Y%m%d-%H%M%S").to_string(),
        Err(_) => raw.replace(['-', ':'], "").replace(' ', "-"),
    }
}

/// Identifies one campaign: `{date}_{test}_{size}_{iterations}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaptureName {
    pub date: String,
    pub test: String,
    pub size: u32,
    pub iterations: u32,
}

impl CaptureName {
    pub fn stem(&self) -> String {
        format!("{}_{}_{}_{}", self.date, self.test, self.size, self.iterations)
    }

    /// Name `loopback_test` gives the capture on the AP, before dating.
    pub fn undated_file(test: &str, size: u32, iterations: u32) -> String {
        format!("{}_{}_{}.csv", test, size, iterations)
    }

    pub fn raw_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.csv", self.stem()))
    }

    pub fn aggregate_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_agg.csv", self.stem()))
    }

    pub fn device_file(&self, dir: &Path, device: &str) -> PathBuf {
        dir.join(format!("{}_{}.csv", self.stem(), device))
    }

    pub fn charts_file(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}_charts.ods", self.stem()))
    }
}
