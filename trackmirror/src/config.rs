//! Configuration types and defaults

use serde::{Deserialize, Serialize};
use trackmirror_core::{MirrorError, MirrorResult};

/// Global trackmirror configuration
#[derive(Debug, Clone)]
pub struct GlobalConfig {
    /// Enable debug logging
    pub debug_logging: bool,
    /// `tracing` filter directive used when debug logging is enabled
    pub log_filter: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            debug_logging: false,
            log_filter: "trackmirror=debug,trackmirror_core=debug".to_string(),
        }
    }
}

/// Mirror-specific configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Keep following add/remove notifications of a wrapped stream.
    /// When off, the mirror only takes the initial snapshot.
    pub follow_source: bool,
    /// Emit "updated" after every membership change
    pub emit_updated_events: bool,
    /// Label used in log lines
    pub label: Option<String>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            follow_source: true,
            emit_updated_events: true,
            label: None,
        }
    }
}

impl MirrorConfig {
    /// Snapshot-only configuration: the wrapped stream is read once
    pub fn snapshot() -> Self {
        Self {
            follow_source: false,
            ..Self::default()
        }
    }

    /// Set the log label
    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> MirrorResult<Self> {
        serde_json::from_str(json).map_err(|e| MirrorError::Configuration {
            reason: format!("Failed to parse mirror config: {}", e),
        })
    }

    /// Serialize the configuration to JSON
    pub fn to_json(&self) -> MirrorResult<String> {
        serde_json::to_string(self).map_err(|e| MirrorError::Configuration {
            reason: format!("Failed to serialize mirror config: {}", e),
        })
    }
}
