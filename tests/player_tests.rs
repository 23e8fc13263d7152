mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use common::*;
use panflute::{
    EndReason, ErrorKind, EventKind, Player, PlayerConfig, PlayerError, PlayerEvent, PlayerState,
    Song, Track, Transport, TransportState,
};
use panflute::audio::AudioDevice;
use tokio::time::sleep;

fn start(index: usize) -> PlayerEvent {
    PlayerEvent::TrackStart {
        track: buffers(index + 1).remove(index),
        index,
    }
}

fn end(index: usize, reason: EndReason) -> PlayerEvent {
    PlayerEvent::TrackEnd {
        track: buffers(index + 1).remove(index),
        index,
        reason,
    }
}

#[tokio::test(start_paused = true)]
async fn empty_playlist_play_is_a_noop() {
    let (player, transport) = player(0);
    let log = record_events(&player);

    player.play_current_track().unwrap();
    player.next_track().unwrap();
    player.previous_track().unwrap();

    assert!(events(&log).is_empty());
    assert!(transport.loads().is_empty());
    assert_eq!(player.state(), PlayerState::Idle);
    assert_eq!(player.current_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn volume_is_validated_and_delegated() {
    let (player, _transport) = player(1);

    let err = player.set_volume(-0.1).unwrap_err();
    assert!(matches!(err, PlayerError::InvalidVolume(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(player.set_volume(1.01).is_err());
    assert!(player.set_volume(f32::NAN).is_err());

    player.set_volume(0.5).unwrap();
    assert_eq!(player.volume(), 0.5);
}

#[tokio::test(start_paused = true)]
async fn next_track_wraps_when_looping() {
    let (player, _transport) = player(3);
    let log = record_events(&player);
    player.set_loop(true);
    player.play_current_track().unwrap();

    for _ in 0..3 {
        player.next_track().unwrap();
    }

    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Playing);
    assert!(!events(&log).contains(&PlayerEvent::PlaylistEnd));
}

#[tokio::test(start_paused = true)]
async fn next_track_ends_playlist_once_without_loop() {
    let (player, transport) = player(3);
    let log = record_events(&player);
    player.play_current_track().unwrap();

    for _ in 0..3 {
        player.next_track().unwrap();
    }

    let ends = events(&log)
        .iter()
        .filter(|e| **e == PlayerEvent::PlaylistEnd)
        .count();
    assert_eq!(ends, 1);
    assert_eq!(player.current_index(), 2);
    assert_eq!(player.state(), PlayerState::Ended);
    // nothing further was loaded after the last track
    assert_eq!(transport.loads().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn previous_track_clamps_at_first() {
    let (player, _transport) = player(3);
    player.go_to_track(1).unwrap();

    player.previous_track().unwrap();
    assert_eq!(player.current_index(), 0);
    player.previous_track().unwrap();
    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Playing);
}

#[tokio::test(start_paused = true)]
async fn go_to_track_rejects_bad_index() {
    let (player, transport) = player(3);

    let err = player.go_to_track(3).unwrap_err();
    assert!(matches!(err, PlayerError::IndexOutOfRange { index: 3, len: 3 }));
    assert!(err.is_validation());
    assert!(transport.loads().is_empty());
}

#[tokio::test(start_paused = true)]
async fn seek_out_of_bounds_is_ignored() {
    let (player, transport) = player(2);

    // nothing loaded, duration unknown
    assert!(!player.seek(0.5));
    assert!(!player.seek_seconds(1.0));

    player.play_current_track().unwrap();
    assert!(!player.seek(1.5));
    assert!(!player.seek(-0.1));
    assert!(!player.seek(f64::NAN));
    assert!(!player.seek_seconds(TRACK_SECONDS + 1.0));
    assert!(!player.seek_seconds(-1.0));
    assert!(transport.seeks().is_empty());

    assert!(player.seek(0.5));
    assert!(player.seek_seconds(30.0));
    assert_eq!(transport.seeks(), vec![TRACK_SECONDS * 0.5, 30.0]);
    assert!((player.progress() - 30.0 / TRACK_SECONDS).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn removing_before_current_shifts_cursor() {
    let (player, transport) = player(4);
    player.go_to_track(2).unwrap();

    let removed = player.remove_track(0).unwrap();
    assert_eq!(removed, Track::buffer(vec![0u8; 4]));
    assert_eq!(player.current_index(), 1);
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(player.current_track(), Some(Track::buffer(vec![2u8; 4])));

    // after the cursor: untouched
    player.remove_track(2).unwrap();
    assert_eq!(player.current_index(), 1);
    assert_eq!(transport.inner().stop_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn removing_current_stops_and_clamps() {
    let (player, transport) = player(3);
    player.go_to_track(2).unwrap();

    player.remove_track(2).unwrap();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.current_index(), 1);
    assert_eq!(player.total_tracks(), 2);
    assert_eq!(transport.inner().stop_calls, 1);

    player.remove_track(0).unwrap();
    player.remove_track(0).unwrap();
    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Idle);

    let err = player.remove_track(0).unwrap_err();
    assert!(matches!(err, PlayerError::IndexOutOfRange { index: 0, len: 0 }));
}

#[tokio::test(start_paused = true)]
async fn completion_of_last_track_ends_playlist() {
    let (player, transport) = player(3);
    let log = record_events(&player);

    player.go_to_track(2).unwrap();
    transport.finish();
    sleep(Duration::from_millis(600)).await;

    assert_eq!(
        events(&log),
        vec![
            start(2),
            end(2, EndReason::Completed),
            PlayerEvent::PlaylistEnd,
        ]
    );
    assert_eq!(player.current_index(), 2);
    assert_eq!(player.state(), PlayerState::Ended);
}

#[tokio::test(start_paused = true)]
async fn completion_advances_exactly_once() {
    let (player, transport) = player(3);
    let log = record_events(&player);
    player.play_current_track().unwrap();

    // still playing: no advance
    sleep(Duration::from_millis(1200)).await;
    assert_eq!(player.current_index(), 0);

    transport.finish();
    sleep(Duration::from_millis(3000)).await;

    assert_eq!(player.current_index(), 1);
    assert_eq!(
        events(&log),
        vec![start(0), end(0, EndReason::Completed), start(1)]
    );
    assert_eq!(transport.loads().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn completion_wraps_when_looping() {
    let (player, transport) = player(2);
    player.set_loop(true);
    player.go_to_track(1).unwrap();

    transport.finish();
    sleep(Duration::from_millis(600)).await;

    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Playing);
}

#[tokio::test(start_paused = true)]
async fn skip_reports_manual_end() {
    let (player, transport) = player(3);
    let log = record_events(&player);
    player.play_current_track().unwrap();

    player.skip().unwrap();

    assert_eq!(player.current_index(), 1);
    assert_eq!(
        events(&log),
        vec![start(0), end(0, EndReason::Manual), start(1)]
    );
    assert_eq!(transport.inner().stop_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_resets_and_suppresses_pending_completion() {
    let (player, transport) = player(3);
    let log = record_events(&player);
    player.go_to_track(1).unwrap();

    transport.finish();
    player.stop();
    sleep(Duration::from_millis(3000)).await;

    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(events(&log), vec![start(1)]);
    assert_eq!(transport.loads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_survives_engine_failure() {
    let (player, transport) = player(2);
    player.go_to_track(1).unwrap();
    transport.inner().fail_stop = true;

    player.stop();
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.current_index(), 0);

    // still restartable
    transport.inner().fail_stop = false;
    player.play_current_track().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
}

#[tokio::test(start_paused = true)]
async fn pause_is_not_mistaken_for_completion() {
    let (player, transport) = player(3);
    player.play_current_track().unwrap();

    player.pause().unwrap();
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(player.state(), PlayerState::Paused);
    assert_eq!(player.current_index(), 0);

    player.resume().unwrap();
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(transport.loads().len(), 1);
    assert_eq!(transport.inner().play_calls, 2);

    // monitoring is back on after resume
    transport.finish();
    sleep(Duration::from_millis(600)).await;
    assert_eq!(player.current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn resume_without_loaded_track_plays_current() {
    let (player, transport) = player(2);

    player.resume().unwrap();

    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(transport.loads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn settle_delay_defers_play() {
    let config = PlayerConfig {
        settle_delay_ms: 100,
        ..PlayerConfig::default()
    };
    let (player, transport) = player_with(2, config);

    player.play_current_track().unwrap();
    assert_eq!(player.state(), PlayerState::Loading);
    assert_eq!(transport.inner().play_calls, 0);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(player.state(), PlayerState::Playing);
    assert_eq!(transport.inner().play_calls, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_during_settle_cancels_play() {
    let config = PlayerConfig {
        settle_delay_ms: 100,
        ..PlayerConfig::default()
    };
    let (player, transport) = player_with(2, config);

    player.play_current_track().unwrap();
    player.stop();
    sleep(Duration::from_millis(500)).await;

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(transport.inner().play_calls, 0);
}

#[tokio::test(start_paused = true)]
async fn load_failure_is_reported_to_caller() {
    let (player, transport) = player(2);
    transport.inner().fail_load = true;

    let err = player.play_current_track().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resource);
    assert_eq!(player.state(), PlayerState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn load_failure_while_playing_stops_previous_track() {
    let (player, transport) = player(3);
    player.play_current_track().unwrap();
    transport.inner().fail_load = true;

    assert!(player.next_track().is_err());

    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(player.current_index(), 1);
    assert_eq!(transport.inner().state, TransportState::Stopped);
    assert_eq!(transport.inner().stop_calls, 1);

    // nothing left running for a monitor to miss
    sleep(Duration::from_millis(3000)).await;
    assert_eq!(player.current_index(), 1);
}

#[tokio::test(start_paused = true)]
async fn failed_auto_advance_tears_down_monitor() {
    let (player, transport) = player(3);
    player.play_current_track().unwrap();

    transport.inner().fail_load = true;
    transport.finish();
    sleep(Duration::from_millis(3000)).await;

    assert_eq!(player.current_index(), 1);
    assert_eq!(player.state(), PlayerState::Stopped);
    assert_eq!(transport.loads().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn engine_query_failure_stops_monitoring() {
    let (player, transport) = player(3);
    player.play_current_track().unwrap();

    transport.inner().fail_is_playing = true;
    sleep(Duration::from_millis(600)).await;

    transport.inner().fail_is_playing = false;
    transport.finish();
    sleep(Duration::from_millis(3000)).await;

    // the monitor gave up, so the finished track is never advanced past
    assert_eq!(player.current_index(), 0);
}

#[tokio::test(start_paused = true)]
async fn handlers_can_call_back_into_player() {
    let (player, _transport) = player(3);
    let seen = Arc::new(AtomicUsize::new(usize::MAX));

    let handle = player.clone();
    let observed = Arc::clone(&seen);
    player.on(EventKind::TrackStart, move |_| {
        observed.store(handle.current_index(), Ordering::SeqCst);
    });

    player.go_to_track(2).unwrap();
    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn last_registration_wins_and_can_be_removed() {
    let (player, _transport) = player(2);
    let first = Arc::new(AtomicUsize::new(0));
    let second = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&first);
    player.on(EventKind::TrackStart, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let counter = Arc::clone(&second);
    player.on(EventKind::TrackStart, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    player.play_current_track().unwrap();
    assert!(player.remove_listener(EventKind::TrackStart));
    player.next_track().unwrap();

    assert_eq!(first.load(Ordering::SeqCst), 0);
    assert_eq!(second.load(Ordering::SeqCst), 1);
    assert!(!player.remove_listener(EventKind::TrackStart));
}

#[tokio::test(start_paused = true)]
async fn shuffle_visits_every_track_once() {
    let (player, _transport) = player(5);
    let log = record_events(&player);
    player.set_shuffle(true);
    player.play_current_track().unwrap();

    for _ in 0..4 {
        player.next_track().unwrap();
    }
    let mut visited: Vec<usize> = events(&log)
        .iter()
        .filter_map(|e| match e {
            PlayerEvent::TrackStart { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    visited.sort_unstable();
    assert_eq!(visited, vec![0, 1, 2, 3, 4]);

    player.next_track().unwrap();
    assert_eq!(player.state(), PlayerState::Ended);
    assert!(player.is_shuffle());
}

#[tokio::test(start_paused = true)]
async fn looping_shuffle_never_repeats_across_wrap() {
    let (player, _transport) = player(2);
    player.set_loop(true);
    player.set_shuffle(true);
    player.play_current_track().unwrap();

    let mut previous = player.current_index();
    for _ in 0..20 {
        player.next_track().unwrap();
        let current = player.current_index();
        assert_ne!(current, previous);
        previous = current;
    }
}

#[tokio::test(start_paused = true)]
async fn status_reflects_session() {
    let (player, _transport) = player(0);
    let mut song = Song::new("/music/one.mp3");
    song.title = Some("One".to_string());
    player.load_songs(vec![song, Song::new("/music/two.flac")]);
    player.set_loop(true);

    let status = player.status();
    assert_eq!(status.state, PlayerState::Idle);
    assert_eq!(status.total_tracks, 2);
    assert_eq!(status.duration, 0.0);
    assert_eq!(status.progress, 0.0);
    assert!(status.looping);
    assert!(!status.shuffle);
    assert_eq!(status.track, Some(Track::file("/music/one.mp3")));
    assert_eq!(
        status.metadata.and_then(|s| s.title),
        Some("One".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn add_track_checks_files() {
    let (player, _transport) = player(0);
    let dir = tempfile::tempdir().unwrap();
    let song = dir.path().join("song.ogg");
    std::fs::write(&song, b"ogg").unwrap();

    assert_eq!(player.add_track(Track::file(&song)).unwrap(), 0);
    let err = player
        .add_track(Track::file(dir.path().join("gone.ogg")))
        .unwrap_err();
    assert!(matches!(err, PlayerError::FileNotFound(_)));
    let err = player
        .add_track(Track::file(dir.path().join("notes.txt")))
        .unwrap_err();
    assert!(matches!(err, PlayerError::UnsupportedFormat(_)));
    assert_eq!(player.total_tracks(), 1);
}

#[tokio::test(start_paused = true)]
async fn dispose_is_idempotent_and_silences_everything() {
    let (player, transport) = player(3);
    let log = record_events(&player);
    player.go_to_track(1).unwrap();

    transport.finish();
    player.dispose();
    player.dispose();
    sleep(Duration::from_millis(3000)).await;

    assert!(player.is_disposed());
    assert_eq!(player.total_tracks(), 0);
    assert_eq!(player.current_index(), 0);
    assert_eq!(player.state(), PlayerState::Idle);
    assert!(!player.is_loop());
    assert_eq!(events(&log), vec![start(1)]);

    // handlers were dropped along with the tracks
    player.load_tracks(buffers(1));
    player.play_current_track().unwrap();
    assert_eq!(events(&log).len(), 1);
}

#[test]
fn player_needs_a_runtime() {
    let result = Player::new(MockTransport::new(), PlayerConfig::default());
    assert!(matches!(result, Err(PlayerError::NoRuntime)));
}

#[test]
fn transport_reports_default_output_device() {
    let devices = MockTransport::new().devices();
    assert_eq!(devices, vec![AudioDevice::default_output()]);
    assert!(devices[0].is_default);
}
