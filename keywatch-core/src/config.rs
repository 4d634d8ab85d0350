//! Model Configuration
//!
//! Tunables for a [`Model`](crate::Model). Every field has a default, so a
//! partial JSON document (or none at all) is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default nesting limit for re-entrant `set` calls.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 64;

/// Configuration for a model instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// How deeply `set` calls may nest (a subscriber or computed property
    /// calling `set` from inside a notification adds one level).
    pub max_cascade_depth: usize,

    /// Whether a `set` re-checks cached observers below the written path,
    /// e.g. `foo.bar` when `foo` is replaced.
    pub notify_descendants: bool,
}

impl ModelConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
            notify_descendants: true,
        }
    }
}
