//! Host stream capability interfaces

use crate::error::MirrorResult;
use crate::track::{ListenerId, TrackKind, TrackRef};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Structural change applied to a stream's track set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackChange {
    /// A track joined the stream
    Added,
    /// A track left the stream
    Removed,
}

impl fmt::Display for TrackChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackChange::Added => write!(f, "addtrack"),
            TrackChange::Removed => write!(f, "removetrack"),
        }
    }
}

/// Callback invoked with the track that was added or removed
pub type TrackListener = Arc<dyn Fn(&TrackRef) + Send + Sync>;

/// Anything that can list its tracks.
///
/// The per-kind accessors filter [`TrackCollection::get_tracks`] and keep its
/// order; tracks without a recognized kind appear in neither.
pub trait TrackCollection {
    /// All tracks, in collection order
    fn get_tracks(&self) -> Vec<TrackRef>;

    /// Tracks of one kind, in collection order
    fn get_tracks_of(&self, kind: TrackKind) -> Vec<TrackRef> {
        self.get_tracks()
            .into_iter()
            .filter(|track| track.kind() == Some(kind))
            .collect()
    }

    /// Video tracks, in collection order
    fn get_video_tracks(&self) -> Vec<TrackRef> {
        self.get_tracks_of(TrackKind::Video)
    }

    /// Audio tracks, in collection order
    fn get_audio_tracks(&self) -> Vec<TrackRef> {
        self.get_tracks_of(TrackKind::Audio)
    }
}

impl TrackCollection for [TrackRef] {
    fn get_tracks(&self) -> Vec<TrackRef> {
        self.to_vec()
    }
}

impl TrackCollection for Vec<TrackRef> {
    fn get_tracks(&self) -> Vec<TrackRef> {
        self.clone()
    }
}

impl<T: TrackCollection + ?Sized> TrackCollection for Arc<T> {
    fn get_tracks(&self) -> Vec<TrackRef> {
        (**self).get_tracks()
    }
}

/// Capability interface of a live host stream.
///
/// Listener registration is additive: any number of observers may watch the
/// same stream, and each removes only its own registrations.
pub trait StreamSource: TrackCollection + Send + Sync {
    /// Host-assigned stream id
    fn id(&self) -> &str;

    /// Add a track to the stream
    fn add_track(&self, track: TrackRef) -> MirrorResult<()>;

    /// Remove a track from the stream
    fn remove_track(&self, track: &TrackRef) -> MirrorResult<()>;

    /// Register a listener for one kind of structural change
    fn add_track_listener(&self, change: TrackChange, listener: TrackListener) -> ListenerId;

    /// Remove a listener registered with [`StreamSource::add_track_listener`]
    fn remove_track_listener(&self, id: ListenerId) -> bool;
}
