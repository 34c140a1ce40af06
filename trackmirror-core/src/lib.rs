//! # trackmirror core
//!
//! Track model, host stream capability interfaces and the event emitter that
//! the mirror is built from. The in-memory [`MediaStream`] and
//! [`MediaStreamTrack`] stand in for host primitives where no platform
//! implementation is available.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod emitter;
pub mod error;
pub mod source;
pub mod stream;
pub mod track;

// Re-export main types
pub use emitter::{EventCallback, EventEmitter, NamedEvent};
pub use error::{MirrorError, MirrorResult};
pub use source::{StreamSource, TrackChange, TrackCollection, TrackListener};
pub use stream::MediaStream;
pub use track::{
    EndedListener, ListenerId, MediaStreamTrack, MediaTrack, TrackKind, TrackRef, TrackState,
    WeakTrackRef,
};
