//! Kind-partitioned mirror of a stream's tracks

use crate::config::MirrorConfig;
use crate::event::{EventFilter, EventStream, FilteredEventStream, MirrorEvent};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trackmirror_core::{
    EndedListener, EventEmitter, ListenerId, MediaStream, MirrorError, MirrorResult,
    StreamSource, TrackChange, TrackCollection, TrackKind, TrackListener, TrackRef,
};

/// What a mirror is seeded from
#[derive(Clone, Default)]
pub enum MirrorSource {
    /// Start with no tracks
    #[default]
    Empty,
    /// Start with these tracks; nothing is followed afterwards
    Tracks(Vec<TrackRef>),
    /// Snapshot a live stream and follow its add/remove notifications
    Stream(Arc<dyn StreamSource>),
}

impl MirrorSource {
    /// Interpret a dynamically typed host value.
    ///
    /// Accepts `()`, `Vec<TrackRef>`, `Arc<dyn StreamSource>`,
    /// `Arc<MediaStream>` and [`TrackSetMirror`]. Anything else fails with
    /// [`MirrorError::InvalidArgument`].
    pub fn from_any(value: &dyn Any) -> MirrorResult<Self> {
        if value.is::<()>() {
            return Ok(MirrorSource::Empty);
        }
        if let Some(tracks) = value.downcast_ref::<Vec<TrackRef>>() {
            return Ok(MirrorSource::Tracks(tracks.clone()));
        }
        if let Some(source) = value.downcast_ref::<Arc<dyn StreamSource>>() {
            return Ok(MirrorSource::Stream(Arc::clone(source)));
        }
        if let Some(stream) = value.downcast_ref::<Arc<MediaStream>>() {
            return Ok(MirrorSource::Stream(Arc::clone(stream) as Arc<dyn StreamSource>));
        }
        if let Some(mirror) = value.downcast_ref::<TrackSetMirror>() {
            return Ok(MirrorSource::from(mirror));
        }
        Err(MirrorError::invalid_argument(
            "Expected a stream source or a sequence of tracks",
        ))
    }
}

impl fmt::Debug for MirrorSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MirrorSource::Empty => write!(f, "Empty"),
            MirrorSource::Tracks(tracks) => f.debug_tuple("Tracks").field(tracks).finish(),
            MirrorSource::Stream(source) => f.debug_tuple("Stream").field(&source.id()).finish(),
        }
    }
}

impl From<()> for MirrorSource {
    fn from(_: ()) -> Self {
        MirrorSource::Empty
    }
}

impl From<Vec<TrackRef>> for MirrorSource {
    fn from(tracks: Vec<TrackRef>) -> Self {
        MirrorSource::Tracks(tracks)
    }
}

impl From<&[TrackRef]> for MirrorSource {
    fn from(tracks: &[TrackRef]) -> Self {
        MirrorSource::Tracks(tracks.to_vec())
    }
}

impl From<Arc<dyn StreamSource>> for MirrorSource {
    fn from(source: Arc<dyn StreamSource>) -> Self {
        MirrorSource::Stream(source)
    }
}

impl From<Arc<MediaStream>> for MirrorSource {
    fn from(stream: Arc<MediaStream>) -> Self {
        MirrorSource::Stream(stream)
    }
}

impl From<TrackSetMirror> for MirrorSource {
    fn from(mirror: TrackSetMirror) -> Self {
        MirrorSource::Stream(Arc::new(mirror))
    }
}

impl From<&TrackSetMirror> for MirrorSource {
    fn from(mirror: &TrackSetMirror) -> Self {
        MirrorSource::Stream(Arc::new(mirror.clone()))
    }
}

/// Result of [`TrackSetMirror::split_stream`]
#[derive(Debug, Default)]
pub struct SplitStream {
    /// Video tracks, absent when there are none
    pub video: Option<MediaStream>,
    /// Audio tracks, absent when there are none
    pub audio: Option<MediaStream>,
}

struct TrackEntry {
    kind: TrackKind,
    ended_listener: ListenerId,
}

#[derive(Default)]
struct KindMaps {
    audio: HashMap<TrackRef, TrackEntry>,
    video: HashMap<TrackRef, TrackEntry>,
    has_audio_track: bool,
    has_video_track: bool,
}

impl KindMaps {
    fn map(&self, kind: TrackKind) -> &HashMap<TrackRef, TrackEntry> {
        match kind {
            TrackKind::Audio => &self.audio,
            TrackKind::Video => &self.video,
        }
    }

    fn map_mut(&mut self, kind: TrackKind) -> &mut HashMap<TrackRef, TrackEntry> {
        match kind {
            TrackKind::Audio => &mut self.audio,
            TrackKind::Video => &mut self.video,
        }
    }

    fn flag(&self, kind: TrackKind) -> bool {
        match kind {
            TrackKind::Audio => self.has_audio_track,
            TrackKind::Video => self.has_video_track,
        }
    }

    fn flag_mut(&mut self, kind: TrackKind) -> &mut bool {
        match kind {
            TrackKind::Audio => &mut self.has_audio_track,
            TrackKind::Video => &mut self.has_video_track,
        }
    }

    fn entry(&self, track: &TrackRef) -> Option<&TrackEntry> {
        self.audio.get(track).or_else(|| self.video.get(track))
    }
}

struct SourceBinding {
    source: Arc<dyn StreamSource>,
    add_listener: ListenerId,
    remove_listener: ListenerId,
}

struct MirrorInner {
    config: MirrorConfig,
    label: String,
    /// Externally observable track collection
    stream: MediaStream,
    tracks: RwLock<KindMaps>,
    emitter: EventEmitter<MirrorEvent>,
    binding: Mutex<Option<SourceBinding>>,
}

impl MirrorInner {
    fn new(config: MirrorConfig) -> Self {
        let stream = MediaStream::new();
        let label = config
            .label
            .clone()
            .unwrap_or_else(|| stream.id().to_string());
        Self {
            config,
            label,
            stream,
            tracks: RwLock::new(KindMaps::default()),
            emitter: EventEmitter::new(),
            binding: Mutex::new(None),
        }
    }

    fn argument_kind(&self, track: &TrackRef, operation: &str) -> MirrorResult<TrackKind> {
        track.kind().ok_or_else(|| {
            debug!(
                "Mirror {} rejected {} of track {} without a recognized kind",
                self.label,
                operation,
                track.id()
            );
            MirrorError::missing_argument(operation)
        })
    }

    fn add_track(self: &Arc<Self>, track: Option<TrackRef>) -> MirrorResult<()> {
        let track = track.ok_or_else(|| MirrorError::missing_argument("addTrack"))?;
        let kind = self.argument_kind(&track, "addTrack")?;

        // Registered outside the lock: a host may notify from inside the call.
        let ended_listener = track.add_ended_listener(self.ended_forwarder(&track));
        let inserted = {
            let mut maps = self.tracks.write();
            let inserted = match maps.map_mut(kind).entry(track.clone()) {
                Entry::Occupied(_) => false,
                Entry::Vacant(slot) => {
                    slot.insert(TrackEntry {
                        kind,
                        ended_listener,
                    });
                    true
                }
            };
            *maps.flag_mut(kind) = true;
            inserted
        };
        if !inserted {
            track.remove_ended_listener(ended_listener);
        }

        self.stream.add_track(track.clone())?;

        if inserted {
            debug!(
                "➕ Mirror {} added {} track {}",
                self.label,
                kind,
                track.id()
            );
            self.emit_updated(track, kind, TrackChange::Added);
        }
        Ok(())
    }

    fn remove_track(&self, track: Option<&TrackRef>) -> MirrorResult<()> {
        let track = track.ok_or_else(|| MirrorError::missing_argument("removeTrack"))?;
        let kind = self.argument_kind(track, "removeTrack")?;

        let removed = {
            let mut maps = self.tracks.write();
            let removed = maps.map_mut(kind).remove(track);
            let still_held = !maps.map(kind).is_empty();
            *maps.flag_mut(kind) = still_held;
            removed
        };

        self.stream.remove_track(track)?;

        if let Some(entry) = removed {
            track.remove_ended_listener(entry.ended_listener);
            debug!(
                "➖ Mirror {} removed {} track {}",
                self.label,
                kind,
                track.id()
            );
            self.emit_updated(track.clone(), kind, TrackChange::Removed);
        }
        Ok(())
    }

    fn ended_forwarder(self: &Arc<Self>, track: &TrackRef) -> EndedListener {
        let mirror = Arc::downgrade(self);
        let track = track.downgrade();
        Arc::new(move || {
            if let (Some(mirror), Some(track)) = (mirror.upgrade(), track.upgrade()) {
                mirror.forward_ended(track);
            }
        })
    }

    fn forward_ended(&self, track: TrackRef) {
        let held = self.tracks.read().entry(&track).is_some();
        if !held {
            debug!(
                "Mirror {} ignoring end of track {} it no longer holds",
                self.label,
                track.id()
            );
            return;
        }
        info!("⏹️ Mirror {} relaying end of track {}", self.label, track.id());
        self.emitter.emit(MirrorEvent::Ended { track });
    }

    fn emit_updated(&self, track: TrackRef, kind: TrackKind, change: TrackChange) {
        if self.config.emit_updated_events {
            self.emitter.emit(MirrorEvent::Updated { track, kind, change });
        }
    }

    fn attach(self: &Arc<Self>, source: Arc<dyn StreamSource>) {
        let mirror = Arc::downgrade(self);
        let add_listener = source.add_track_listener(
            TrackChange::Added,
            Arc::new(move |track: &TrackRef| {
                if let Some(mirror) = mirror.upgrade() {
                    if let Err(e) = mirror.add_track(Some(track.clone())) {
                        warn!(
                            "Mirror {} ignored added track {}: {}",
                            mirror.label,
                            track.id(),
                            e
                        );
                    }
                }
            }),
        );

        let mirror = Arc::downgrade(self);
        let remove_listener = source.add_track_listener(
            TrackChange::Removed,
            Arc::new(move |track: &TrackRef| {
                if let Some(mirror) = mirror.upgrade() {
                    if let Err(e) = mirror.remove_track(Some(track)) {
                        warn!(
                            "Mirror {} ignored removed track {}: {}",
                            mirror.label,
                            track.id(),
                            e
                        );
                    }
                }
            }),
        );

        info!("🔗 Mirror {} following stream {}", self.label, source.id());
        *self.binding.lock() = Some(SourceBinding {
            source,
            add_listener,
            remove_listener,
        });
    }

    fn detach(&self) -> bool {
        match self.binding.lock().take() {
            Some(binding) => {
                Self::release(&binding);
                info!(
                    "🔌 Mirror {} stopped following stream {}",
                    self.label,
                    binding.source.id()
                );
                true
            }
            None => false,
        }
    }

    fn release(binding: &SourceBinding) {
        binding.source.remove_track_listener(binding.add_listener);
        binding.source.remove_track_listener(binding.remove_listener);
    }
}

impl Drop for MirrorInner {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.get_mut().take() {
            Self::release(&binding);
        }
        let maps = self.tracks.get_mut();
        for kind in TrackKind::ALL {
            for (track, entry) in maps.map(kind) {
                track.remove_ended_listener(entry.ended_listener);
            }
        }
        debug!("Mirror {} dropped", self.label);
    }
}

/// Mirror of a stream's tracks, partitioned by kind.
///
/// Cloning yields another handle to the same mirror. The mirror is torn down
/// when the last handle is dropped: it stops following its source and
/// unregisters from every track it holds.
#[derive(Clone)]
pub struct TrackSetMirror {
    inner: Arc<MirrorInner>,
}

impl TrackSetMirror {
    /// Create a mirror from `source` with the default configuration
    ///
    /// # Example
    /// ```rust
    /// use std::sync::Arc;
    /// use trackmirror::{MediaStream, MediaStreamTrack, StreamSource, TrackSetMirror};
    ///
    /// let stream = Arc::new(MediaStream::new());
    /// let mirror = TrackSetMirror::new(Arc::clone(&stream))?;
    ///
    /// stream.add_track(Arc::new(MediaStreamTrack::video()).handle())?;
    /// assert!(mirror.has_video_track());
    /// # Ok::<(), trackmirror::MirrorError>(())
    /// ```
    pub fn new(source: impl Into<MirrorSource>) -> MirrorResult<Self> {
        Self::with_config(source, MirrorConfig::default())
    }

    /// Create a mirror from `source` with a custom configuration
    pub fn with_config(source: impl Into<MirrorSource>, config: MirrorConfig) -> MirrorResult<Self> {
        let (initial, live) = match source.into() {
            MirrorSource::Empty => (Vec::new(), None),
            MirrorSource::Tracks(tracks) => (tracks, None),
            MirrorSource::Stream(stream) => (stream.get_tracks(), Some(stream)),
        };

        if let Some(stray) = initial.iter().find(|track| track.kind().is_none()) {
            return Err(MirrorError::invalid_argument(format!(
                "Track {} has no recognized kind",
                stray.id()
            )));
        }

        let mirror = Self {
            inner: Arc::new(MirrorInner::new(config)),
        };
        for track in initial {
            mirror.inner.add_track(Some(track))?;
        }

        if let Some(stream) = live {
            if mirror.inner.config.follow_source {
                mirror.inner.attach(stream);
            } else {
                debug!(
                    "Mirror {} took a snapshot of stream {}",
                    mirror.inner.label,
                    stream.id()
                );
            }
        }

        info!(
            "🪞 Created mirror {} ({} audio, {} video)",
            mirror.inner.label,
            mirror.audio_track_count(),
            mirror.video_track_count()
        );
        Ok(mirror)
    }

    /// Create an empty mirror
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(MirrorInner::new(MirrorConfig::default())),
        }
    }

    /// Add a track. Fails with [`MirrorError::MissingArgument`] when no track
    /// is given or the track has no recognized kind.
    pub fn add_track(&self, track: impl Into<Option<TrackRef>>) -> MirrorResult<()> {
        self.inner.add_track(track.into())
    }

    /// Remove a track. Same preconditions as [`TrackSetMirror::add_track`].
    pub fn remove_track<'a>(&self, track: impl Into<Option<&'a TrackRef>>) -> MirrorResult<()> {
        self.inner.remove_track(track.into())
    }

    /// Whether at least one video track is held
    pub fn has_video_track(&self) -> bool {
        self.inner.tracks.read().has_video_track
    }

    /// Whether at least one audio track is held
    pub fn has_audio_track(&self) -> bool {
        self.inner.tracks.read().has_audio_track
    }

    /// Whether at least one track of `kind` is held
    pub fn has_track_of(&self, kind: TrackKind) -> bool {
        self.inner.tracks.read().flag(kind)
    }

    /// Held audio tracks, in insertion order
    pub fn audio_tracks(&self) -> Vec<TrackRef> {
        self.inner.stream.get_audio_tracks()
    }

    /// Held video tracks, in insertion order
    pub fn video_tracks(&self) -> Vec<TrackRef> {
        self.inner.stream.get_video_tracks()
    }

    /// Every held track, in insertion order
    pub fn tracks(&self) -> Vec<TrackRef> {
        self.inner.stream.get_tracks()
    }

    /// Number of held audio tracks
    pub fn audio_track_count(&self) -> usize {
        self.inner.tracks.read().audio.len()
    }

    /// Number of held video tracks
    pub fn video_track_count(&self) -> usize {
        self.inner.tracks.read().video.len()
    }

    /// Whether `track` is held
    pub fn contains(&self, track: &TrackRef) -> bool {
        self.inner.tracks.read().entry(track).is_some()
    }

    /// Kind bucket `track` is held in
    pub fn kind_of(&self, track: &TrackRef) -> Option<TrackKind> {
        self.inner.tracks.read().entry(track).map(|entry| entry.kind)
    }

    /// Label used in log lines
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Configuration the mirror was built with
    pub fn config(&self) -> &MirrorConfig {
        &self.inner.config
    }

    /// Whether add/remove notifications of a wrapped stream are followed
    pub fn is_following_source(&self) -> bool {
        self.inner.binding.lock().is_some()
    }

    /// Stop following the wrapped stream. Current contents are kept.
    /// Returns whether a stream was being followed.
    pub fn detach_source(&self) -> bool {
        self.inner.detach()
    }

    /// Invoke `callback` for every event named `event` (`"ended"`, `"updated"`)
    pub fn on<F>(&self, event: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&MirrorEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.on(event, callback)
    }

    /// Invoke `callback` for the next event named `event` only
    pub fn once<F>(&self, event: &'static str, callback: F) -> ListenerId
    where
        F: Fn(&MirrorEvent) + Send + Sync + 'static,
    {
        self.inner.emitter.once(event, callback)
    }

    /// Remove a callback registered with [`TrackSetMirror::on`] or [`TrackSetMirror::once`]
    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.emitter.off(id)
    }

    /// Stream of every event emitted from now on
    pub fn events(&self) -> EventStream {
        EventStream::new(self.inner.emitter.subscribe())
    }

    /// Stream of events matching `filter`, emitted from now on
    pub fn events_filtered(&self, filter: EventFilter) -> FilteredEventStream {
        self.events().filtered(filter)
    }

    /// Resolve with the next event named `event`.
    ///
    /// The subscription is taken when this is called, so an event emitted
    /// before the future is first polled is not missed.
    pub fn wait_for(
        &self,
        event: &'static str,
    ) -> impl Future<Output = Option<MirrorEvent>> + Send + 'static {
        let mut stream = self.events_filtered(EventFilter::specific(vec![event.to_string()]));
        async move { stream.next().await }
    }

    /// Split a collection into a video-only and an audio-only stream.
    /// A kind without tracks yields `None` rather than an empty stream.
    pub fn split_stream<S: TrackCollection + ?Sized>(source: &S) -> SplitStream {
        let video = source.get_video_tracks();
        let audio = source.get_audio_tracks();
        SplitStream {
            video: (!video.is_empty()).then(|| MediaStream::with_tracks(video)),
            audio: (!audio.is_empty()).then(|| MediaStream::with_tracks(audio)),
        }
    }

    /// Tracks of `new` that are not in `old`, in `new`'s order.
    ///
    /// A missing `new` yields nothing; a missing `old` lets every track through.
    pub fn get_filtered_tracks<N, O>(new: Option<&N>, old: Option<&O>) -> Vec<TrackRef>
    where
        N: TrackCollection + ?Sized,
        O: TrackCollection + ?Sized,
    {
        let Some(new) = new else {
            return Vec::new();
        };
        let old: HashSet<TrackRef> = old
            .map(|old| old.get_tracks().into_iter().collect())
            .unwrap_or_default();
        new.get_tracks()
            .into_iter()
            .filter(|track| !old.contains(track))
            .collect()
    }
}

impl Default for TrackSetMirror {
    fn default() -> Self {
        Self::empty()
    }
}

impl TrackCollection for TrackSetMirror {
    fn get_tracks(&self) -> Vec<TrackRef> {
        self.tracks()
    }
}

impl StreamSource for TrackSetMirror {
    fn id(&self) -> &str {
        self.inner.stream.id()
    }

    fn add_track(&self, track: TrackRef) -> MirrorResult<()> {
        self.inner.add_track(Some(track))
    }

    fn remove_track(&self, track: &TrackRef) -> MirrorResult<()> {
        self.inner.remove_track(Some(track))
    }

    fn add_track_listener(&self, change: TrackChange, listener: TrackListener) -> ListenerId {
        self.inner.stream.add_track_listener(change, listener)
    }

    fn remove_track_listener(&self, id: ListenerId) -> bool {
        self.inner.stream.remove_track_listener(id)
    }
}

impl fmt::Debug for TrackSetMirror {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackSetMirror")
            .field("label", &self.inner.label)
            .field("audio_tracks", &self.audio_track_count())
            .field("video_tracks", &self.video_track_count())
            .field("following_source", &self.is_following_source())
            .finish()
    }
}
