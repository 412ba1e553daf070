pub mod aggregator;
pub mod capture;
pub mod command;
pub mod error;
pub mod modes;
pub mod output;
pub mod parser;
pub mod registry;
pub mod report;
pub mod stats;
pub mod transfer;

pub use error::{Error, Result};
