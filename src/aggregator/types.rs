//! Data types used by the aggregation pipeline.

use std::path::PathBuf;

use serde::Serialize;

use crate::capture::CaptureName;
use crate::command::TestType;

/// Parameters of the campaign that produced a capture.
#[derive(Debug, Clone)]
pub struct AggregateRequest {
    pub test: TestType,
    pub size: u32,
    pub iterations: u32,
    /// Device ids of the bridges under test. Output names come from the registry.
    pub device_ids: Vec<u32>,
    /// Directory the derived CSV files are written to.
    pub out_dir: PathBuf,
}

/// A device bound to a row position within every trial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedDevice {
    pub id: u32,
    pub name: String,
}

/// One per-device CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOutput {
    pub name: String,
    pub path: PathBuf,
}

/// Everything one aggregation run produced.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateOutput {
    pub capture: CaptureName,
    pub aggregate: PathBuf,
    pub devices: Vec<DeviceOutput>,
    /// Configuration labels in the order they were found in the capture.
    pub configurations: Vec<String>,
}
