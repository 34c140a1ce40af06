//! # trackmirror diagnostics
//!
//! Debugging tools for trackmirror.
//! Provides structured logging setup and serializable stream snapshots.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod debug_logger;
pub mod snapshot;

// Re-export main types
pub use debug_logger::DebugLogger;
pub use snapshot::{StreamSnapshot, TrackSummary};
