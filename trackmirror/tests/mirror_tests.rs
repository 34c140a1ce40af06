//! Integration tests for TrackSetMirror
//!
//! Cover construction from every accepted source, argument validation,
//! per-kind flags, live following of a wrapped stream, and the relayed
//! "ended"/"updated" events.

use std::any::Any;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_test::{assert_pending, assert_ready, task};
use trackmirror::*;

fn make_tracks(count: usize, kind: TrackKind) -> Vec<Arc<MediaStreamTrack>> {
    (0..count)
        .map(|_| Arc::new(MediaStreamTrack::new(Some(kind))))
        .collect()
}

fn handles(tracks: &[Arc<MediaStreamTrack>]) -> Vec<TrackRef> {
    tracks.iter().map(|track| track.handle()).collect()
}

fn same_members(actual: Vec<TrackRef>, expected: Vec<TrackRef>) -> bool {
    actual.len() == expected.len()
        && actual.into_iter().collect::<HashSet<_>>() == expected.into_iter().collect::<HashSet<_>>()
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

#[test]
fn test_constructor_with_stream_copies_tracks() {
    let video = make_tracks(3, TrackKind::Video);
    let audio = make_tracks(3, TrackKind::Audio);
    let source = TrackSetMirror::empty();
    for track in handles(&video).into_iter().chain(handles(&audio)) {
        source.add_track(track).unwrap();
    }

    let mirror = TrackSetMirror::new(&source).unwrap();

    assert!(same_members(mirror.audio_tracks(), handles(&audio)));
    assert!(same_members(mirror.video_tracks(), handles(&video)));
    assert!(mirror.is_following_source());
}

#[test]
fn test_constructor_with_track_list() {
    let video = make_tracks(3, TrackKind::Video);
    let audio = make_tracks(3, TrackKind::Audio);
    let all: Vec<TrackRef> = handles(&video).into_iter().chain(handles(&audio)).collect();

    let mirror = TrackSetMirror::new(all).unwrap();

    assert!(same_members(mirror.audio_tracks(), handles(&audio)));
    assert!(same_members(mirror.video_tracks(), handles(&video)));
    assert!(!mirror.is_following_source());
}

#[test]
fn test_constructor_with_no_argument() {
    let mirror = TrackSetMirror::new(()).unwrap();
    assert!(!mirror.has_audio_track());
    assert!(!mirror.has_video_track());
    assert!(mirror.tracks().is_empty());

    let from_any = MirrorSource::from_any(&()).unwrap();
    assert!(TrackSetMirror::new(from_any).unwrap().tracks().is_empty());
    assert!(TrackSetMirror::default().tracks().is_empty());
}

#[test]
fn test_constructor_with_bad_types_fails() {
    let null: Option<()> = None;
    let object = serde_json::json!({});
    let number = 1i32;
    let empty_string = "";
    let string = "test";

    let inputs: Vec<(&str, &dyn Any)> = vec![
        ("null", &null as &dyn Any),
        ("object", &object as &dyn Any),
        ("number", &number as &dyn Any),
        ("empty string", &empty_string as &dyn Any),
        ("string", &string as &dyn Any),
    ];

    for (name, value) in inputs {
        let err = MirrorSource::from_any(value).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT", "input: {}", name);
    }
}

#[test]
fn test_from_any_accepts_known_shapes() {
    let track = Arc::new(MediaStreamTrack::video());
    let stream = Arc::new(MediaStream::with_tracks([track.handle()]));
    let as_source: Arc<dyn StreamSource> = stream.clone();

    for value in [
        &vec![track.handle()] as &dyn Any,
        &stream as &dyn Any,
        &as_source as &dyn Any,
    ] {
        let mirror = TrackSetMirror::new(MirrorSource::from_any(value).unwrap()).unwrap();
        assert_eq!(mirror.video_tracks(), vec![track.handle()]);
    }
}

#[test]
fn test_constructor_rejects_kindless_tracks() {
    let stray = Arc::new(MediaStreamTrack::without_kind());
    let video = Arc::new(MediaStreamTrack::video());

    let err = TrackSetMirror::new(vec![video.handle(), stray.handle()]).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    // Nothing was registered on the valid track either.
    assert_eq!(video.ended_listener_count(), 0);

    let stream = Arc::new(MediaStream::with_tracks([stray.handle()]));
    let err = TrackSetMirror::new(stream).unwrap_err();
    assert_eq!(err.error_code(), "INVALID_ARGUMENT");
}

// ============================================================================
// LIVE FOLLOWING
// ============================================================================

#[test]
fn test_mirrors_source_after_later_changes() {
    let video = make_tracks(3, TrackKind::Video);
    let audio = make_tracks(3, TrackKind::Audio);
    let source = TrackSetMirror::empty();
    for track in handles(&video).into_iter().chain(handles(&audio)) {
        source.add_track(track).unwrap();
    }
    let mirror = TrackSetMirror::new(&source).unwrap();

    source.remove_track(&video[0].handle()).unwrap();
    source.remove_track(&audio[0].handle()).unwrap();

    assert!(same_members(mirror.audio_tracks(), handles(&audio[1..])));
    assert!(same_members(mirror.video_tracks(), handles(&video[1..])));

    source.add_track(video[0].handle()).unwrap();
    source.add_track(audio[0].handle()).unwrap();

    assert!(same_members(mirror.audio_tracks(), handles(&audio)));
    assert!(same_members(mirror.video_tracks(), handles(&video)));
}

#[test]
fn test_follows_media_stream_per_kind() {
    let stream = Arc::new(MediaStream::new());
    let mirror = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    let video = make_tracks(2, TrackKind::Video);
    let audio = make_tracks(2, TrackKind::Audio);

    for track in handles(&video).into_iter().chain(handles(&audio)) {
        stream.add_track(track).unwrap();
        assert!(same_members(mirror.video_tracks(), stream.get_video_tracks()));
        assert!(same_members(mirror.audio_tracks(), stream.get_audio_tracks()));
    }
    for track in handles(&audio).into_iter().chain(handles(&video)) {
        stream.remove_track(&track).unwrap();
        assert!(same_members(mirror.video_tracks(), stream.get_video_tracks()));
        assert!(same_members(mirror.audio_tracks(), stream.get_audio_tracks()));
        assert_eq!(mirror.has_video_track(), !stream.get_video_tracks().is_empty());
        assert_eq!(mirror.has_audio_track(), !stream.get_audio_tracks().is_empty());
    }
}

#[test]
fn test_multiple_mirrors_share_one_source() {
    let stream = Arc::new(MediaStream::new());
    let first = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    let second = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    assert_eq!(stream.listener_count(TrackChange::Added), 2);

    let track = Arc::new(MediaStreamTrack::audio());
    stream.add_track(track.handle()).unwrap();
    assert!(first.has_audio_track());
    assert!(second.has_audio_track());

    drop(first);
    assert_eq!(stream.listener_count(TrackChange::Added), 1);
    assert_eq!(stream.listener_count(TrackChange::Removed), 1);

    stream.remove_track(&track.handle()).unwrap();
    assert!(!second.has_audio_track());
}

#[test]
fn test_snapshot_config_does_not_follow() {
    let stream = Arc::new(MediaStream::with_tracks(handles(&make_tracks(
        1,
        TrackKind::Video,
    ))));
    let mirror = TrackSetMirror::with_config(Arc::clone(&stream), MirrorConfig::snapshot()).unwrap();
    assert!(!mirror.is_following_source());
    assert_eq!(stream.listener_count(TrackChange::Added), 0);

    stream
        .add_track(Arc::new(MediaStreamTrack::video()).handle())
        .unwrap();
    assert_eq!(mirror.video_track_count(), 1);
}

#[test]
fn test_detach_source_keeps_contents() {
    let stream = Arc::new(MediaStream::new());
    let mirror = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    let kept = Arc::new(MediaStreamTrack::audio());
    stream.add_track(kept.handle()).unwrap();

    assert!(mirror.detach_source());
    assert!(!mirror.detach_source());
    assert_eq!(stream.listener_count(TrackChange::Added), 0);

    stream.remove_track(&kept.handle()).unwrap();
    stream
        .add_track(Arc::new(MediaStreamTrack::video()).handle())
        .unwrap();
    assert_eq!(mirror.audio_tracks(), vec![kept.handle()]);
    assert!(!mirror.has_video_track());
}

#[test]
fn test_forwarded_kindless_track_is_ignored() {
    let stream = Arc::new(MediaStream::new());
    let mirror = TrackSetMirror::new(Arc::clone(&stream)).unwrap();

    stream
        .add_track(Arc::new(MediaStreamTrack::without_kind()).handle())
        .unwrap();
    assert!(mirror.tracks().is_empty());
    assert!(!mirror.has_audio_track());
    assert!(!mirror.has_video_track());
}

// ============================================================================
// ADD / REMOVE
// ============================================================================

#[test]
fn test_add_track_without_argument_fails() {
    let mirror = TrackSetMirror::empty();
    let err = mirror.add_track(None::<TrackRef>).unwrap_err();
    assert_eq!(err.error_code(), "MISSING_ARGUMENT");
    assert_eq!(
        err.to_string(),
        "Failed to execute addTrack: 1 argument required, but only 0 present"
    );
}

#[test]
fn test_remove_track_without_argument_fails() {
    let mirror = TrackSetMirror::empty();
    let err = mirror.remove_track(None::<&TrackRef>).unwrap_err();
    assert_eq!(err.error_code(), "MISSING_ARGUMENT");
}

#[test]
fn test_kindless_track_is_missing_argument() {
    let mirror = TrackSetMirror::empty();
    let stray = Arc::new(MediaStreamTrack::without_kind());

    assert_eq!(
        mirror.add_track(stray.handle()).unwrap_err().error_code(),
        "MISSING_ARGUMENT"
    );
    assert_eq!(
        mirror.remove_track(&stray.handle()).unwrap_err().error_code(),
        "MISSING_ARGUMENT"
    );
    assert_eq!(stray.ended_listener_count(), 0);
}

#[test]
fn test_updates_has_video_track() {
    let mirror = TrackSetMirror::empty();
    let mut updates = mirror.events_filtered(EventFilter::updated_only());
    assert!(!mirror.has_video_track());

    let track = Arc::new(MediaStreamTrack::video());
    mirror.add_track(track.handle()).unwrap();
    assert!(mirror.has_video_track());
    assert_eq!(mirror.video_track_count(), 1);

    mirror.remove_track(&track.handle()).unwrap();
    assert!(!mirror.has_video_track());
    assert_eq!(mirror.video_track_count(), 0);

    let added = updates.try_next().unwrap().unwrap();
    let removed = updates.try_next().unwrap().unwrap();
    assert!(matches!(
        added,
        MirrorEvent::Updated { change: TrackChange::Added, kind: TrackKind::Video, .. }
    ));
    assert!(matches!(
        removed,
        MirrorEvent::Updated { change: TrackChange::Removed, kind: TrackKind::Video, .. }
    ));
}

#[tokio::test]
async fn test_updates_has_audio_track() {
    let mirror = TrackSetMirror::empty();
    assert!(!mirror.has_audio_track());

    let track = Arc::new(MediaStreamTrack::audio());
    mirror.add_track(track.handle()).unwrap();
    assert!(mirror.has_audio_track());
    assert_eq!(mirror.audio_track_count(), 1);

    let mut updated = task::spawn(mirror.wait_for(UPDATED));
    assert_pending!(updated.poll());

    mirror.remove_track(&track.handle()).unwrap();
    assert!(!mirror.has_audio_track());
    assert_eq!(mirror.audio_track_count(), 0);

    assert!(updated.is_woken());
    let event = assert_ready!(updated.poll()).unwrap();
    assert_eq!(event.track(), &track.handle());
}

#[test]
fn test_multiple_tracks_of_same_kind() {
    let mirror = TrackSetMirror::empty();
    assert!(!mirror.has_audio_track());
    let first = Arc::new(MediaStreamTrack::audio());
    let second = Arc::new(MediaStreamTrack::audio());

    mirror.add_track(first.handle()).unwrap();
    mirror.add_track(second.handle()).unwrap();
    assert!(mirror.has_audio_track());
    assert_eq!(mirror.audio_track_count(), 2);

    mirror.remove_track(&first.handle()).unwrap();
    assert!(mirror.has_audio_track());
    mirror.remove_track(&second.handle()).unwrap();
    assert!(!mirror.has_audio_track());
}

#[test]
fn test_flags_match_contents_after_every_operation() {
    let mirror = TrackSetMirror::empty();
    let video = make_tracks(3, TrackKind::Video);
    let audio = make_tracks(2, TrackKind::Audio);
    let check = |mirror: &TrackSetMirror| {
        assert_eq!(mirror.has_video_track(), mirror.video_track_count() > 0);
        assert_eq!(mirror.has_audio_track(), mirror.audio_track_count() > 0);
        assert_eq!(mirror.has_track_of(TrackKind::Video), mirror.has_video_track());
        for track in mirror.tracks() {
            assert_eq!(mirror.kind_of(&track), track.kind());
        }
    };

    for track in handles(&video).into_iter().chain(handles(&audio)) {
        mirror.add_track(track.clone()).unwrap();
        check(&mirror);
        mirror.add_track(track).unwrap();
        check(&mirror);
    }
    for track in handles(&video).into_iter().chain(handles(&audio)) {
        mirror.remove_track(&track).unwrap();
        check(&mirror);
        mirror.remove_track(&track).unwrap();
        check(&mirror);
    }
    assert!(mirror.tracks().is_empty());
}

#[test]
fn test_duplicate_add_emits_single_update() {
    let mirror = TrackSetMirror::empty();
    let mut events = mirror.events();
    let track = Arc::new(MediaStreamTrack::video());

    mirror.add_track(track.handle()).unwrap();
    mirror.add_track(track.handle()).unwrap();
    mirror.remove_track(&Arc::new(MediaStreamTrack::video()).handle()).unwrap();

    assert!(events.try_next().unwrap().is_some());
    assert!(events.try_next().unwrap().is_none());
}

#[test]
fn test_updated_events_can_be_disabled() {
    let config = MirrorConfig::from_json(r#"{ "emit_updated_events": false }"#).unwrap();
    let mirror = TrackSetMirror::with_config((), config).unwrap();
    let mut events = mirror.events();

    mirror
        .add_track(Arc::new(MediaStreamTrack::audio()).handle())
        .unwrap();
    assert!(events.try_next().unwrap().is_none());
}

// ============================================================================
// ENDED RELAY
// ============================================================================

#[tokio::test]
async fn test_emits_ended_when_track_ends() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::video());
    mirror.add_track(track.handle()).unwrap();

    let ended = mirror.wait_for(ENDED);
    track.dispatch_ended();

    let event = ended.await.unwrap();
    assert_eq!(event.event_type(), "ended");
    assert_eq!(event.track(), &track.handle());
}

#[test]
fn test_one_ended_event_per_signal() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::audio());
    mirror.add_track(track.handle()).unwrap();
    mirror.add_track(track.handle()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    mirror.on(ENDED, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    track.dispatch_ended();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    track.dispatch_ended();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_removed_track_end_is_not_relayed() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::video());
    mirror.add_track(track.handle()).unwrap();
    mirror.remove_track(&track.handle()).unwrap();

    let mut ended = mirror.events_filtered(EventFilter::ended_only());
    track.stop();
    assert!(ended.try_next().unwrap().is_none());
}

#[test]
fn test_every_listener_sees_emission_in_order() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::video());
    mirror.add_track(track.handle()).unwrap();

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    for tag in 0..3 {
        let order = Arc::clone(&order);
        mirror.on(ENDED, move |event| {
            assert_eq!(event.event_type(), "ended");
            order.lock().push(tag);
        });
    }
    let once_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&once_calls);
    mirror.once(ENDED, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    track.stop();
    assert_eq!(*order.lock(), vec![0, 1, 2]);
    assert_eq!(once_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_removal_from_ended_handler_is_delivered_after_ended() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::video());
    mirror.add_track(track.handle()).unwrap();

    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let mut events = mirror.events();

    let handle = mirror.clone();
    let log = Arc::clone(&order);
    let remover = mirror.on(ENDED, move |event| {
        log.lock().push("ended#1");
        handle.remove_track(event.track()).unwrap();
    });
    let log = Arc::clone(&order);
    mirror.on(ENDED, move |_| log.lock().push("ended#2"));
    let log = Arc::clone(&order);
    mirror.on(UPDATED, move |_| log.lock().push("updated"));

    track.dispatch_ended();

    assert_eq!(*order.lock(), vec!["ended#1", "ended#2", "updated"]);
    let streamed: Vec<&str> = std::iter::from_fn(|| events.try_next().ok().flatten())
        .map(|event| event.event_type())
        .collect();
    assert_eq!(streamed, vec![ENDED, UPDATED]);
    assert!(!mirror.has_video_track());

    mirror.off(remover);
}

#[test]
fn test_off_removes_callback() {
    let mirror = TrackSetMirror::empty();
    let track = Arc::new(MediaStreamTrack::audio());
    mirror.add_track(track.handle()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let id = mirror.on(ENDED, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(mirror.off(id));

    track.dispatch_ended();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_dropped_mirror_leaves_no_listeners() {
    let stream = Arc::new(MediaStream::new());
    let track = Arc::new(MediaStreamTrack::video());
    stream.add_track(track.handle()).unwrap();

    let mirror = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    let mut events = mirror.events();
    assert_eq!(track.ended_listener_count(), 1);

    drop(mirror);
    assert_eq!(track.ended_listener_count(), 0);
    assert_eq!(stream.listener_count(TrackChange::Added), 0);
    assert_eq!(stream.listener_count(TrackChange::Removed), 0);
    assert!(events.try_next().is_err());
}

// ============================================================================
// MIRROR OF A MIRROR
// ============================================================================

#[test]
fn test_mirror_of_mirror_follows_chain() {
    let stream = Arc::new(MediaStream::new());
    let parent = TrackSetMirror::new(Arc::clone(&stream)).unwrap();
    let child = TrackSetMirror::new(parent.clone()).unwrap();

    let track = Arc::new(MediaStreamTrack::video());
    stream.add_track(track.handle()).unwrap();
    assert!(parent.has_video_track());
    assert!(child.has_video_track());

    stream.remove_track(&track.handle()).unwrap();
    assert!(!parent.has_video_track());
    assert!(!child.has_video_track());
}

#[test]
fn test_mirror_as_stream_source() {
    let mirror = TrackSetMirror::empty();
    let source: Arc<dyn StreamSource> = Arc::new(mirror.clone());
    let track = Arc::new(MediaStreamTrack::audio());

    source.add_track(track.handle()).unwrap();
    assert!(mirror.has_audio_track());
    assert_eq!(source.get_audio_tracks(), vec![track.handle()]);
    assert_eq!(source.id(), mirror.id());

    source.remove_track(&track.handle()).unwrap();
    assert!(!mirror.has_audio_track());
}
