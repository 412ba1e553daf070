//! Target registry: device ids, friendly names and the bridges under test.
//!
//! [`DeviceLookup`] is the seam the aggregator resolves device ids through.
//! [`Registry`] implements it with the built-in Ara naming rule, optionally
//! overridden by a JSON file (see [`Registry::load`]).

mod config;

pub use config::Registry;

use std::fmt;
use std::str::FromStr;

/// Resolves a device id read from a capture into a friendly name.
pub trait DeviceLookup {
    fn name_for(&self, device_id: u32) -> Option<String>;
}

/// Highest device id an Endo can carry (APB1..APB3, GPB1..GPB2).
pub const MAX_DEVICE_ID: u32 = 5;

/// Built-in naming: ids below 4 are APBridges, the rest GPBridges.
pub fn builtin_name(device_id: u32) -> String {
    if device_id < 4 {
        format!("APB{}", device_id)
    } else {
        format!("GPB{}", device_id - 3)
    }
}

/// A bridge that loopback traffic can be addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bridge {
    Apb2,
    Apb3,
    Gpb1,
}

impl Bridge {
    pub const ALL: [Bridge; 3] = [Bridge::Apb2, Bridge::Apb3, Bridge::Gpb1];

    pub fn device_id(self) -> u32 {
        match self {
            Bridge::Apb2 => 2,
            Bridge::Apb3 => 3,
            Bridge::Gpb1 => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Bridge::Apb2 => "APB2",
            Bridge::Apb3 => "APB3",
            Bridge::Gpb1 => "GPB1",
        }
    }

    /// Expands a list of names as given on the command line; `ALL` selects every bridge.
    /// Duplicates are dropped, order of first appearance is kept.
    pub fn parse_list<S: AsRef<str>>(names: &[S]) -> Result<Vec<Bridge>, UnknownBridge> {
        let mut bridges = Vec::new();
        for name in names {
            let expanded: Vec<Bridge> = if name.as_ref().eq_ignore_ascii_case("ALL") {
                Bridge::ALL.to_vec()
            } else {
                vec![name.as_ref().parse()?]
            };
            for bridge in expanded {
                if !bridges.contains(&bridge) {
                    bridges.push(bridge);
                }
            }
        }
        Ok(bridges)
    }
}

impl fmt::Display for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown bridge '{0}' (expected APB2, APB3, GPB1 or ALL)")]
pub struct UnknownBridge(pub String);

impl FromStr for Bridge {
    type Err = UnknownBridge;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bridge::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownBridge(s.to_string()))
    }
}

/// Loopback device mask passed to `loopback_test -m`.
///
/// Zero addresses every loopback device; otherwise bit `id - 2` selects a bridge.
pub fn loopback_mask(bridges: &[Bridge]) -> u32 {
    if Bridge::ALL.iter().all(|b| bridges.contains(b)) {
        return 0;
    }
    bridges
        .iter()
        .fold(0, |mask, b| mask | (1 << (b.device_id() - 2)))
}
