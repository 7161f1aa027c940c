//! Scan configuration.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSpec {
    /// Drop loaders that were reached as another loader's parent from the
    /// final order, together with the classpath entries they contribute.
    pub ignore_parent_loaders: bool,
    /// Reject classpath entries whose path does not exist on this machine.
    pub skip_unreadable_entries: bool,
    /// Resolve entry paths through the filesystem before deduplicating them.
    /// Paths that cannot be resolved are kept as given.
    pub canonicalize_entries: bool,
}

impl Default for ScanSpec {
    fn default() -> Self {
        Self {
            ignore_parent_loaders: false,
            skip_unreadable_entries: false,
            canonicalize_entries: true,
        }
    }
}

impl ScanSpec {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}
