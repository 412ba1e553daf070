//! Builder for the on-target `loopback_test` invocation.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Greybus loopback operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Sink,
    Transfer,
    Ping,
}

impl TestType {
    pub fn as_str(self) -> &'static str {
        match self {
            TestType::Sink => "sink",
            TestType::Transfer => "transfer",
            TestType::Ping => "ping",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown test type '{0}' (expected sink, transfer or ping)")]
pub struct UnknownTestType(pub String);

impl FromStr for TestType {
    type Err = UnknownTestType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sink" => Ok(TestType::Sink),
            "transfer" => Ok(TestType::Transfer),
            "ping" => Ok(TestType::Ping),
            _ => Err(UnknownTestType(s.to_string())),
        }
    }
}

/// One `loopback_test` run. The label ends up in the capture's description column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackCommand {
    pub test: TestType,
    pub size: u32,
    pub iterations: u32,
    pub mask: u32,
    pub label: String,
}

impl fmt::Display for LoopbackCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "loopback_test -t {} -s {} -i {} -m {} -c \"{}\"",
            self.test, self.size, self.iterations, self.mask, self.label
        )
    }
}
