//! Event system for mirror lifecycle notifications

use futures::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use trackmirror_core::{NamedEvent, TrackChange, TrackKind, TrackRef};

/// Name of the event emitted when a held track ends
pub const ENDED: &str = "ended";
/// Name of the event emitted after the mirror's membership changed
pub const UPDATED: &str = "updated";

/// Notifications emitted by a [`crate::TrackSetMirror`]
#[derive(Debug, Clone)]
pub enum MirrorEvent {
    /// A held track signalled that it ended
    Ended {
        /// The track that ended
        track: TrackRef,
    },
    /// A track was added to or removed from the mirror
    Updated {
        /// The track whose membership changed
        track: TrackRef,
        /// Kind bucket the change applied to
        kind: TrackKind,
        /// Whether the track joined or left
        change: TrackChange,
    },
}

impl MirrorEvent {
    /// Get the event type as a string
    pub fn event_type(&self) -> &'static str {
        match self {
            MirrorEvent::Ended { .. } => ENDED,
            MirrorEvent::Updated { .. } => UPDATED,
        }
    }

    /// Track carried by the event
    pub fn track(&self) -> &TrackRef {
        match self {
            MirrorEvent::Ended { track } | MirrorEvent::Updated { track, .. } => track,
        }
    }

    /// Kind of the track carried by the event
    pub fn track_kind(&self) -> Option<TrackKind> {
        match self {
            MirrorEvent::Ended { track } => track.kind(),
            MirrorEvent::Updated { kind, .. } => Some(*kind),
        }
    }

    /// Check if this is a membership event
    pub fn is_membership_event(&self) -> bool {
        matches!(self, MirrorEvent::Updated { .. })
    }
}

impl NamedEvent for MirrorEvent {
    fn name(&self) -> &'static str {
        self.event_type()
    }
}

/// Stream of mirror events for async iteration
#[derive(Debug)]
pub struct EventStream {
    receiver: mpsc::UnboundedReceiver<MirrorEvent>,
}

impl EventStream {
    /// Create a new event stream with a receiver
    pub fn new(receiver: mpsc::UnboundedReceiver<MirrorEvent>) -> Self {
        Self { receiver }
    }

    /// Get the next event from the stream
    pub async fn next(&mut self) -> Option<MirrorEvent> {
        self.receiver.recv().await
    }

    /// Try to get the next event without blocking
    pub fn try_next(&mut self) -> Result<Option<MirrorEvent>, mpsc::error::TryRecvError> {
        match self.receiver.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                Err(mpsc::error::TryRecvError::Disconnected)
            }
        }
    }

    /// Close the event stream
    pub fn close(&mut self) {
        self.receiver.close();
    }

    /// Check if the event stream is closed
    pub fn is_closed(&self) -> bool {
        self.receiver.is_closed()
    }

    /// Restrict this stream to events matching `filter`
    pub fn filtered(self, filter: EventFilter) -> FilteredEventStream {
        FilteredEventStream::new(self, filter)
    }
}

impl Stream for EventStream {
    type Item = MirrorEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Event filter for selective event processing
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Event names to include (`None` includes every name)
    pub event_types: Option<Vec<String>>,
    /// Only include events about tracks of this kind
    pub track_kind: Option<TrackKind>,
}

impl EventFilter {
    /// Create a filter that includes all events
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter that includes only "ended" events
    pub fn ended_only() -> Self {
        Self::specific(vec![ENDED.to_string()])
    }

    /// Create a filter that includes only "updated" events
    pub fn updated_only() -> Self {
        Self::specific(vec![UPDATED.to_string()])
    }

    /// Create a filter for specific event types
    pub fn specific(event_types: Vec<String>) -> Self {
        Self {
            event_types: Some(event_types),
            track_kind: None,
        }
    }

    /// Narrow the filter to one track kind
    pub fn for_kind(mut self, kind: TrackKind) -> Self {
        self.track_kind = Some(kind);
        self
    }

    /// Check if an event should be included based on this filter
    pub fn should_include(&self, event: &MirrorEvent) -> bool {
        let name_matches = self
            .event_types
            .as_ref()
            .map_or(true, |types| types.iter().any(|t| t == event.event_type()));
        let kind_matches = self
            .track_kind
            .map_or(true, |kind| event.track_kind() == Some(kind));
        name_matches && kind_matches
    }
}

/// Filtered event stream that only yields events matching a filter
#[derive(Debug)]
pub struct FilteredEventStream {
    /// Underlying event stream
    stream: EventStream,
    /// Event filter
    filter: EventFilter,
}

impl FilteredEventStream {
    /// Create a new filtered event stream
    pub fn new(stream: EventStream, filter: EventFilter) -> Self {
        Self { stream, filter }
    }

    /// Get the next event that matches the filter
    pub async fn next(&mut self) -> Option<MirrorEvent> {
        while let Some(event) = self.stream.next().await {
            if self.filter.should_include(&event) {
                return Some(event);
            }
        }
        None
    }

    /// Try to get the next filtered event without blocking
    pub fn try_next(&mut self) -> Result<Option<MirrorEvent>, mpsc::error::TryRecvError> {
        while let Some(event) = self.stream.try_next()? {
            if self.filter.should_include(&event) {
                return Ok(Some(event));
            }
        }
        Ok(None)
    }

    /// Update the filter
    pub fn set_filter(&mut self, filter: EventFilter) {
        self.filter = filter;
    }

    /// Get the current filter
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }
}
