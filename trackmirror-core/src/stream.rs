//! In-memory host stream

use crate::error::MirrorResult;
use crate::source::{StreamSource, TrackChange, TrackCollection, TrackListener};
use crate::track::{ListenerId, TrackRef, TrackState};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

struct Registration {
    id: ListenerId,
    change: TrackChange,
    listener: TrackListener,
}

/// Ordered set of tracks with add/remove notifications.
///
/// A track is held at most once. Adding a track that is already present, or
/// removing one that is not, changes nothing and notifies nobody.
pub struct MediaStream {
    id: String,
    tracks: RwLock<Vec<TrackRef>>,
    listeners: RwLock<Vec<Registration>>,
}

impl MediaStream {
    /// Create an empty stream
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tracks: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a stream holding `tracks`, dropping repeated handles
    pub fn with_tracks(tracks: impl IntoIterator<Item = TrackRef>) -> Self {
        let mut unique: Vec<TrackRef> = Vec::new();
        for track in tracks {
            if !unique.contains(&track) {
                unique.push(track);
            }
        }
        let stream = Self::new();
        debug!("Creating stream {} with {} tracks", stream.id, unique.len());
        *stream.tracks.write() = unique;
        stream
    }

    /// Number of tracks
    pub fn len(&self) -> usize {
        self.tracks.read().len()
    }

    /// Whether the stream holds no tracks
    pub fn is_empty(&self) -> bool {
        self.tracks.read().is_empty()
    }

    /// Whether `track` is held by this stream
    pub fn contains(&self, track: &TrackRef) -> bool {
        self.tracks.read().contains(track)
    }

    /// Look a track up by its id
    pub fn get_track_by_id(&self, id: &str) -> Option<TrackRef> {
        self.tracks.read().iter().find(|track| track.id() == id).cloned()
    }

    /// True while at least one track is live
    pub fn active(&self) -> bool {
        self.tracks
            .read()
            .iter()
            .any(|track| track.state() == TrackState::Live)
    }

    /// Number of listeners registered for `change`
    pub fn listener_count(&self, change: TrackChange) -> usize {
        self.listeners
            .read()
            .iter()
            .filter(|registration| registration.change == change)
            .count()
    }

    fn notify(&self, change: TrackChange, track: &TrackRef) {
        let listeners: Vec<TrackListener> = self
            .listeners
            .read()
            .iter()
            .filter(|registration| registration.change == change)
            .map(|registration| Arc::clone(&registration.listener))
            .collect();
        debug!(
            "Stream {} {} {} -> {} listeners",
            self.id,
            change,
            track.id(),
            listeners.len()
        );
        for listener in &listeners {
            listener(track);
        }
    }
}

impl Default for MediaStream {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackCollection for MediaStream {
    fn get_tracks(&self) -> Vec<TrackRef> {
        self.tracks.read().clone()
    }
}

impl StreamSource for MediaStream {
    fn id(&self) -> &str {
        &self.id
    }

    fn add_track(&self, track: TrackRef) -> MirrorResult<()> {
        {
            let mut tracks = self.tracks.write();
            if tracks.contains(&track) {
                return Ok(());
            }
            tracks.push(track.clone());
        }
        self.notify(TrackChange::Added, &track);
        Ok(())
    }

    fn remove_track(&self, track: &TrackRef) -> MirrorResult<()> {
        let removed = {
            let mut tracks = self.tracks.write();
            match tracks.iter().position(|held| held == track) {
                Some(index) => {
                    tracks.remove(index);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.notify(TrackChange::Removed, track);
        }
        Ok(())
    }

    fn add_track_listener(&self, change: TrackChange, listener: TrackListener) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.write().push(Registration {
            id,
            change,
            listener,
        });
        id
    }

    fn remove_track_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|registration| registration.id != id);
        listeners.len() != before
    }
}

impl fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStream")
            .field("id", &self.id)
            .field("tracks", &*self.tracks.read())
            .finish()
    }
}
