//! Registry configuration.

use serde::{Deserialize, Serialize};

use crate::error::EventResult;

/// Configuration for an [`EventRegistry`](crate::EventRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Advisory listener limit per event name.
    ///
    /// Going over it logs a warning once per event name; subscriptions are
    /// never rejected.
    pub max_listeners: Option<usize>,
    /// Release the subscription map once the last entry is removed.
    pub release_empty: bool,
}

impl RegistryConfig {
    /// Creates a config with defaults (no listener limit, release empty maps).
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the advisory listener limit.
    pub fn with_max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = Some(max);
        self
    }

    /// Keeps the subscription map allocated after it empties.
    pub fn retain_empty(mut self) -> Self {
        self.release_empty = false;
        self
    }

    /// Parses a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> EventResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_listeners: None,
            release_empty: true,
        }
    }
}
