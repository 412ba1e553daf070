use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Directory holding chart templates when `ARA_TEMPLATE_DIR` is unset.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

/// Predefined chart layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartScenario {
    /// AP to a single bridge.
    T1,
    /// AP to two bridges.
    T2,
}

impl ChartScenario {
    pub fn for_device_count(devices: usize) -> Self {
        if devices <= 1 {
            ChartScenario::T1
        } else {
            ChartScenario::T2
        }
    }

    pub fn template_file(self) -> &'static str {
        match self {
            ChartScenario::T1 => "loopback-perf-AP-to-APB2-template.ods",
            ChartScenario::T2 => "loopback-perf-AP-to-APB2-APB3-template.ods",
        }
    }

    pub fn template_path(self, dir: &Path) -> PathBuf {
        dir.join(self.template_file())
    }
}

impl fmt::Display for ChartScenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartScenario::T1 => f.write_str("T1"),
            ChartScenario::T2 => f.write_str("T2"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown chart scenario '{0}' (expected T1 or T2)")]
pub struct UnknownScenario(pub String);

impl FromStr for ChartScenario {
    type Err = UnknownScenario;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "T1" => Ok(ChartScenario::T1),
            "T2" => Ok(ChartScenario::T2),
            _ => Err(UnknownScenario(s.to_string())),
        }
    }
}

/// Template directory from `ARA_TEMPLATE_DIR`, falling back to [`DEFAULT_TEMPLATE_DIR`].
pub fn template_dir() -> PathBuf {
    std::env::var("ARA_TEMPLATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_TEMPLATE_DIR))
}
