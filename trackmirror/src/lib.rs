//! # trackmirror - Kind-Partitioned Stream Mirroring
//!
//! trackmirror keeps a shadow view of a live audio/video stream: which tracks
//! are present, split by kind, with summary flags and a relayed "ended"
//! notification whenever a held track ends.
//!
//! ## Key Features
//!
//! - **Live mirroring**: wrap a stream and follow its add/remove notifications
//! - **Per-kind bookkeeping**: `has_audio_track` / `has_video_track` always match contents
//! - **Lifecycle relay**: `"ended"` and `"updated"` events via callbacks or async streams
//! - **Grouping helpers**: split a collection by kind, diff two collections by identity
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use trackmirror::{MediaStream, MediaStreamTrack, StreamSource, TrackSetMirror};
//!
//! # fn main() -> Result<(), trackmirror::MirrorError> {
//! let camera = Arc::new(MediaStreamTrack::video());
//! let stream = Arc::new(MediaStream::with_tracks([camera.handle()]));
//!
//! let mirror = TrackSetMirror::new(Arc::clone(&stream))?;
//! assert!(mirror.has_video_track());
//! assert!(!mirror.has_audio_track());
//!
//! stream.remove_track(&camera.handle())?;
//! assert!(!mirror.has_video_track());
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all)]

// Re-export core types for easy access
pub use trackmirror_core::{
    EndedListener, EventEmitter, ListenerId, MediaStream, MediaStreamTrack, MediaTrack,
    MirrorError, MirrorResult, NamedEvent, StreamSource, TrackChange, TrackCollection,
    TrackKind, TrackListener, TrackRef, TrackState, WeakTrackRef,
};

#[cfg(feature = "diagnostics")]
pub use trackmirror_diagnostics::{DebugLogger, StreamSnapshot, TrackSummary};

// Public API modules
pub mod config;
pub mod event;
pub mod mirror;

// Re-export main API types
pub use config::{GlobalConfig, MirrorConfig};
pub use event::{EventFilter, EventStream, FilteredEventStream, MirrorEvent, ENDED, UPDATED};
pub use mirror::{MirrorSource, SplitStream, TrackSetMirror};

/// Initialize trackmirror with default settings
pub fn init() -> MirrorResult<()> {
    init_with(GlobalConfig::default())
}

/// Initialize with custom global configuration.
///
/// With `debug_logging` on, installs a `tracing` subscriber filtered by
/// `log_filter`. Fails with [`MirrorError::Initialization`] when a global
/// subscriber is already set.
pub fn init_with(config: GlobalConfig) -> MirrorResult<()> {
    if !config.debug_logging {
        return Ok(());
    }

    #[cfg(feature = "diagnostics")]
    {
        DebugLogger::init_logging(&config.log_filter)
    }

    #[cfg(not(feature = "diagnostics"))]
    {
        tracing::warn!(
            "Debug logging requested without the diagnostics feature; filter '{}' ignored",
            config.log_filter
        );
        Ok(())
    }
}
