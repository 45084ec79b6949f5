//! Derived house identifier.
//!
//! The normalized house name names both the config file handed to the
//! simulator and the output file it is expected to produce.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier the simulator falls back to when launched without a config file.
pub const DEFAULT_HOUSE_ID: &str = "john_doe's_smart_house";

/// Used when the house name is empty or whitespace only.
const FALLBACK_NAME: &str = "config";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HouseId(String);

impl HouseId {
    /// Derive the identifier from a free-form house name.
    pub fn from_house_name(name: &str) -> Self {
        Self(normalize(name))
    }

    /// The fixed identifier used by a default (argument-less) simulation run.
    pub fn default_run() -> Self {
        Self(DEFAULT_HOUSE_ID.to_string())
    }

    /// Accept an identifier from outside (CLI, a results view). Normalizing
    /// is a no-op for ids that are already well formed.
    pub fn parse(raw: &str) -> Self {
        Self::from_house_name(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn config_file_name(&self) -> String {
        format!("{}.json", self.0)
    }

    pub fn output_file_name(&self) -> String {
        format!("{}_output.json", self.0)
    }
}

impl fmt::Display for HouseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trim, lower-case, and collapse each whitespace run into a single `_`.
pub fn normalize(name: &str) -> String {
    let trimmed = name.trim();
    let trimmed = if trimmed.is_empty() {
        FALLBACK_NAME
    } else {
        trimmed
    };
    trimmed
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}
