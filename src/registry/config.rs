use std::collections::HashMap;
use std::path::Path;

use tracing::debug;

use super::{DeviceLookup, MAX_DEVICE_ID, builtin_name};
use crate::error::{Error, Result};

/// Device id → friendly name table.
///
/// Ids without an override fall back to [`builtin_name`] as long as they are
/// in `1..=MAX_DEVICE_ID`. Overrides are stored as a plain JSON object on disk:
/// ```json
/// {
///   "2": "APB2-left",
///   "6": "GPB3"
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Registry {
    overrides: HashMap<u32, String>,
}

impl Registry {
    pub fn builtin() -> Self {
        Self::default()
    }

    /// Loads overrides from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let registry_err = |reason: String| Error::Registry {
            path: path.to_path_buf(),
            reason,
        };

        let content = std::fs::read_to_string(path).map_err(|e| registry_err(e.to_string()))?;
        let raw: HashMap<String, String> =
            serde_json::from_str(&content).map_err(|e| registry_err(e.to_string()))?;

        let mut overrides = HashMap::new();
        for (id, name) in raw {
            let id: u32 = id
                .trim()
                .parse()
                .map_err(|_| registry_err(format!("device id '{}' is not an integer", id)))?;
            overrides.insert(id, name);
        }

        debug!(path = %path.display(), entries = overrides.len(), "Registry overrides loaded");
        Ok(Self { overrides })
    }

    pub fn with_override(mut self, device_id: u32, name: impl Into<String>) -> Self {
        self.overrides.insert(device_id, name.into());
        self
    }
}

impl DeviceLookup for Registry {
    fn name_for(&self, device_id: u32) -> Option<String> {
        if let Some(name) = self.overrides.get(&device_id) {
            return Some(name.clone());
        }
        (1..=MAX_DEVICE_ID)
            .contains(&device_id)
            .then(|| builtin_name(device_id))
    }
}
