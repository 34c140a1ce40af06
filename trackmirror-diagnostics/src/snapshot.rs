//! Serializable point-in-time view of a stream

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trackmirror_core::{MirrorError, MirrorResult, StreamSource, TrackKind, TrackRef, TrackState};

/// Summary of one track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSummary {
    /// Track id
    pub id: String,
    /// Track kind, if recognized
    pub kind: Option<TrackKind>,
    /// Track label
    pub label: String,
    /// Ready state at capture time
    pub state: TrackState,
}

impl From<&TrackRef> for TrackSummary {
    fn from(track: &TrackRef) -> Self {
        Self {
            id: track.id().to_string(),
            kind: track.kind(),
            label: track.label().to_string(),
            state: track.state(),
        }
    }
}

/// Track membership of a stream at one instant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSnapshot {
    /// Stream id
    pub stream_id: String,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
    /// Audio tracks, in stream order
    pub audio: Vec<TrackSummary>,
    /// Video tracks, in stream order
    pub video: Vec<TrackSummary>,
    /// Tracks whose kind is not recognized
    pub unknown_kind: usize,
}

impl StreamSnapshot {
    /// Capture the current membership of `source`
    pub fn capture(source: &dyn StreamSource) -> Self {
        let tracks = source.get_tracks();
        let summaries = |kind: TrackKind| -> Vec<TrackSummary> {
            tracks
                .iter()
                .filter(|track| track.kind() == Some(kind))
                .map(TrackSummary::from)
                .collect()
        };

        Self {
            stream_id: source.id().to_string(),
            captured_at: Utc::now(),
            audio: summaries(TrackKind::Audio),
            video: summaries(TrackKind::Video),
            unknown_kind: tracks.iter().filter(|track| track.kind().is_none()).count(),
        }
    }

    /// Total number of tracks
    pub fn total_tracks(&self) -> usize {
        self.audio.len() + self.video.len() + self.unknown_kind
    }

    /// Number of tracks that were still live
    pub fn live_tracks(&self) -> usize {
        self.audio
            .iter()
            .chain(self.video.iter())
            .filter(|summary| summary.state == TrackState::Live)
            .count()
    }

    /// Render as pretty-printed JSON
    pub fn to_json(&self) -> MirrorResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MirrorError::Configuration {
            reason: format!("Failed to serialize snapshot: {}", e),
        })
    }
}
