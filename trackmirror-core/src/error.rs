//! Error types for trackmirror

use thiserror::Error;

/// Main error type for trackmirror operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MirrorError {
    /// A constructor received a value it cannot mirror
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// Why the argument was rejected
        reason: String,
    },

    /// A track operation was invoked without a usable track
    #[error("Failed to execute {operation}: 1 argument required, but only 0 present")]
    MissingArgument {
        /// Operation that was invoked
        operation: String,
    },

    /// Track kind string not recognized
    #[error("Unsupported track kind: {kind}")]
    UnsupportedTrackKind {
        /// The kind that was rejected
        kind: String,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {reason}")]
    Configuration {
        /// Reason for the configuration failure
        reason: String,
    },

    /// Initialization error
    #[error("Initialization failed: {reason}")]
    Initialization {
        /// Reason for initialization failure
        reason: String,
    },
}

impl MirrorError {
    /// Shorthand for a [`MirrorError::MissingArgument`] on `operation`
    pub fn missing_argument(operation: &str) -> Self {
        MirrorError::MissingArgument {
            operation: operation.to_string(),
        }
    }

    /// Shorthand for a [`MirrorError::InvalidArgument`]
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        MirrorError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Get error code for programmatic handling
    pub fn error_code(&self) -> String {
        match self {
            MirrorError::InvalidArgument { .. } => "INVALID_ARGUMENT".to_string(),
            MirrorError::MissingArgument { .. } => "MISSING_ARGUMENT".to_string(),
            MirrorError::UnsupportedTrackKind { .. } => "UNSUPPORTED_TRACK_KIND".to_string(),
            MirrorError::Configuration { .. } => "CONFIGURATION_ERROR".to_string(),
            MirrorError::Initialization { .. } => "INITIALIZATION_FAILED".to_string(),
        }
    }

    /// Whether the error is a caller mistake rather than an environment failure
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            MirrorError::InvalidArgument { .. }
                | MirrorError::MissingArgument { .. }
                | MirrorError::UnsupportedTrackKind { .. }
        )
    }
}

/// Result alias used across the workspace
pub type MirrorResult<T> = Result<T, MirrorError>;
