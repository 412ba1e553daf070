//! Capture aggregation.
//!
//! A capture is a flat run of rows grouped by position: one block per power
//! mode, each block holding [`TRIALS_PER_CONFIGURATION`] repetitions of an
//! aggregate row followed by one row per device. This module validates that
//! layout, averages the repetitions and writes one CSV per device plus one
//! for the aggregate.

pub mod aggregate;
pub mod analyzer;
pub mod types;
pub mod utility;

pub use analyzer::aggregate;
pub use types::{AggregateOutput, AggregateRequest, DeviceOutput, ResolvedDevice};

/// Number of times each configuration is run.
pub const TRIALS_PER_CONFIGURATION: usize = 3;

/// Device column value written on aggregate rows.
pub const AGGREGATE_LABEL: &str = "Aggregated";
