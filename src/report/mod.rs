//! Chart report generation.
//!
//! A report is a clone of a chart template whose sheets (`Aggregated` plus
//! one per device) receive the averaged tables, and which gets an extra
//! `Data` sheet holding the raw capture.

pub mod fill;
pub mod ods;
pub mod template;

pub use fill::{SheetSource, fill_report, sheet_sources};
pub use template::ChartScenario;
