//! Track model: kinds, the host track capability and reference-identity handles

use crate::error::MirrorError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info};
use uuid::Uuid;

/// Track kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl TrackKind {
    /// Every kind, in a stable order
    pub const ALL: [TrackKind; 2] = [TrackKind::Audio, TrackKind::Video];

    /// Lowercase name used by host platforms
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Audio => "audio",
            TrackKind::Video => "video",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrackKind {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "audio" => Ok(TrackKind::Audio),
            "video" => Ok(TrackKind::Video),
            _ => Err(MirrorError::UnsupportedTrackKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Track ready state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackState {
    /// Track is producing media
    Live,
    /// Track has ended and will not produce media again
    Ended,
}

/// Token returned by every listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

static NEXT_LISTENER_ID: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    /// Allocate a process-unique listener id
    pub fn next() -> Self {
        Self(NEXT_LISTENER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// Callback invoked when a track signals that it has ended
pub type EndedListener = Arc<dyn Fn() + Send + Sync>;

/// Capability interface of a host track object.
///
/// Host platforms supply the implementation; the mirror only reads the kind
/// and subscribes to the "ended" notification.
pub trait MediaTrack: Send + Sync {
    /// Host-assigned track id
    fn id(&self) -> &str;

    /// Media kind, or `None` when the host reports a kind this crate does not know
    fn kind(&self) -> Option<TrackKind>;

    /// Human readable label, empty when unknown
    fn label(&self) -> &str {
        ""
    }

    /// Current ready state
    fn state(&self) -> TrackState;

    /// Register a listener for the "ended" notification
    fn add_ended_listener(&self, listener: EndedListener) -> ListenerId;

    /// Remove a listener registered with [`MediaTrack::add_ended_listener`]
    fn remove_ended_listener(&self, id: ListenerId) -> bool;
}

/// Shared handle to a host track.
///
/// Equality and hashing follow reference identity: two handles are equal only
/// when they point at the same track object.
#[derive(Clone)]
pub struct TrackRef(Arc<dyn MediaTrack>);

impl TrackRef {
    /// Wrap a track object into a fresh shared handle
    pub fn new<T: MediaTrack + 'static>(track: T) -> Self {
        Self(Arc::new(track))
    }

    /// Wrap an existing shared track object
    pub fn from_arc(track: Arc<dyn MediaTrack>) -> Self {
        Self(track)
    }

    /// Underlying shared pointer
    pub fn as_arc(&self) -> &Arc<dyn MediaTrack> {
        &self.0
    }

    /// Non-owning back reference to the same track
    pub fn downgrade(&self) -> WeakTrackRef {
        WeakTrackRef(Arc::downgrade(&self.0))
    }

    /// Whether both handles refer to the same track object
    pub fn ptr_eq(&self, other: &TrackRef) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl Deref for TrackRef {
    type Target = dyn MediaTrack;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl PartialEq for TrackRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for TrackRef {}

impl Hash for TrackRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Debug for TrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackRef")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("state", &self.state())
            .finish()
    }
}

impl<T: MediaTrack + 'static> From<Arc<T>> for TrackRef {
    fn from(track: Arc<T>) -> Self {
        Self(track)
    }
}

/// Non-owning counterpart of [`TrackRef`]
#[derive(Clone)]
pub struct WeakTrackRef(Weak<dyn MediaTrack>);

impl WeakTrackRef {
    /// Recover a strong handle if the track is still alive
    pub fn upgrade(&self) -> Option<TrackRef> {
        self.0.upgrade().map(TrackRef)
    }
}

impl fmt::Debug for WeakTrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakTrackRef")
            .field("alive", &(self.0.strong_count() > 0))
            .finish()
    }
}

/// In-memory host track.
///
/// Stands in for a platform track where no real host exists, and is what
/// the crate's own tests drive.
pub struct MediaStreamTrack {
    id: String,
    kind: Option<TrackKind>,
    label: String,
    state: RwLock<TrackState>,
    ended_listeners: RwLock<Vec<(ListenerId, EndedListener)>>,
}

impl MediaStreamTrack {
    /// Create a live track of the given kind
    pub fn new(kind: Option<TrackKind>) -> Self {
        let id = Uuid::new_v4().to_string();
        debug!("Creating media stream track {} (kind: {:?})", id, kind);
        Self {
            id,
            kind,
            label: String::new(),
            state: RwLock::new(TrackState::Live),
            ended_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Create a live audio track
    pub fn audio() -> Self {
        Self::new(Some(TrackKind::Audio))
    }

    /// Create a live video track
    pub fn video() -> Self {
        Self::new(Some(TrackKind::Video))
    }

    /// Create a track whose kind the host does not report
    pub fn without_kind() -> Self {
        Self::new(None)
    }

    /// Set the track label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Shared handle to this track
    pub fn handle(self: &Arc<Self>) -> TrackRef {
        TrackRef::from(Arc::clone(self))
    }

    /// Stop the track. The first call transitions to [`TrackState::Ended`]
    /// and notifies listeners; later calls do nothing.
    pub fn stop(&self) {
        let previous = std::mem::replace(&mut *self.state.write(), TrackState::Ended);
        if previous == TrackState::Live {
            info!("⏹️ Track {} ended", self.id);
            self.notify_ended();
        }
    }

    /// Deliver one "ended" notification to every listener, whatever the
    /// current state. Returns the number of listeners invoked.
    pub fn dispatch_ended(&self) -> usize {
        *self.state.write() = TrackState::Ended;
        self.notify_ended()
    }

    /// Number of registered "ended" listeners
    pub fn ended_listener_count(&self) -> usize {
        self.ended_listeners.read().len()
    }

    fn notify_ended(&self) -> usize {
        // Listeners may re-enter this track, so call them without the lock.
        let listeners: Vec<EndedListener> = self
            .ended_listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in &listeners {
            listener();
        }
        listeners.len()
    }
}

impl MediaTrack for MediaStreamTrack {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> Option<TrackKind> {
        self.kind
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn state(&self) -> TrackState {
        *self.state.read()
    }

    fn add_ended_listener(&self, listener: EndedListener) -> ListenerId {
        let id = ListenerId::next();
        self.ended_listeners.write().push((id, listener));
        id
    }

    fn remove_ended_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.ended_listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl fmt::Debug for MediaStreamTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaStreamTrack")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("state", &self.state())
            .finish()
    }
}
