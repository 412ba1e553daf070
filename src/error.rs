//! Error taxonomy for the aggregation and reporting pipeline.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The raw capture (or a derived CSV) is missing, unreadable or not parseable.
    #[error("format error in {path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// The capture does not have the block layout implied by the device count.
    #[error("shape error in {path}: {reason}")]
    Shape { path: PathBuf, reason: String },

    /// The report template is missing or could not be cloned/opened.
    #[error("template error for {path}: {reason}")]
    Template { path: PathBuf, reason: String },

    /// The per-device and aggregate files feeding a report disagree on row count.
    #[error("data shape error: sheet '{sheet}' has {found} rows, expected {expected}")]
    DataShape {
        sheet: String,
        expected: usize,
        found: usize,
    },

    /// A single cell or row could not be written.
    #[error("write error in sheet '{sheet}' at row {row}, column {col}: {reason}")]
    Write {
        sheet: String,
        row: usize,
        col: usize,
        reason: String,
    },

    #[error("registry error in {path}: {reason}")]
    Registry { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn format(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Format {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn shape(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Shape {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn template(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Error::Template {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
