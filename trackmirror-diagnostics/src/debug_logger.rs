//! Structured debug logging system

use trackmirror_core::{MirrorError, MirrorResult};
use tracing_subscriber::EnvFilter;

/// Debug logger for structured logging
#[derive(Debug, Default)]
pub struct DebugLogger;

impl DebugLogger {
    /// Create new debug logger
    pub fn new() -> Self {
        Self
    }

    /// Parse a filter directive such as `"trackmirror=debug"`
    pub fn parse_filter(directives: &str) -> MirrorResult<EnvFilter> {
        EnvFilter::try_new(directives).map_err(|e| MirrorError::Configuration {
            reason: format!("Invalid log filter '{}': {}", directives, e),
        })
    }

    /// Initialize logging system.
    ///
    /// `RUST_LOG` takes precedence over `directives` when it is set.
    pub fn init_logging(directives: &str) -> MirrorResult<()> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => Self::parse_filter(directives)?,
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .map_err(|e| MirrorError::Initialization {
                reason: format!("Failed to install tracing subscriber: {}", e),
            })?;

        tracing::info!("Logging initialized");
        Ok(())
    }
}
