pub mod test_utils;

use assert_float_eq::assert_float_absolute_eq;
use rand::seq::SliceRandom;
use std::sync::atomic::Ordering;
use test_utils::{
    init_logging, reading, session_at, temp_support_dir, ManualClock, ManualSource,
    RecordingPresenter, T0,
};
use tracklog_core::location::LocationEvent;
use tracklog_core::presentation::Notification;
use tracklog_core::recorder::{Recorder, StopOutcome};
use tracklog_core::storage::Storage;
use tracklog_core::track_session::SessionState;
use tracklog_core::track_store::DB_FILE_NAME;
use tracklog_core::TrackError;

struct Harness {
    recorder: Recorder,
    source: ManualSource,
    presenter: RecordingPresenter,
    clock: ManualClock,
    support_dir: String,
    _temp_dir: tempdir::TempDir,
}

fn harness(name: &str) -> Harness {
    init_logging();
    let (temp_dir, support_dir) = temp_support_dir(name);
    let clock = ManualClock::new(T0);
    let source = ManualSource::default();
    let presenter = RecordingPresenter::default();
    let recorder = Recorder::with_session(
        session_at(&clock),
        Storage::init(support_dir.clone()).unwrap(),
        Box::new(source.clone()),
        Box::new(presenter.clone()),
    );
    Harness {
        recorder,
        source,
        presenter,
        clock,
        support_dir,
        _temp_dir: temp_dir,
    }
}

fn break_track_storage(support_dir: &str, payload: &str) {
    let conn = rusqlite::Connection::open(std::path::Path::new(support_dir).join(DB_FILE_NAME))
        .unwrap();
    conn.execute(
        "INSERT OR REPLACE INTO kv_record (key, value) VALUES ('tracks', ?1);",
        [payload],
    )
    .unwrap();
}

#[test]
fn record_and_save() {
    let mut h = harness("recorder-record_and_save");
    h.recorder.start_recording().unwrap();
    assert!(h.source.is_subscribed());

    assert!(h.source.push_readings(vec![reading(0.0, 0.0, T0)]));
    assert!(h.source.push_readings(vec![reading(0.0, 0.5, T0 + 30_000)]));
    assert_eq!(h.recorder.pump(), 2);

    match h.presenter.last() {
        Some(Notification::Sample(snapshot)) => {
            assert_eq!(snapshot.point_count, 2);
            assert_eq!(snapshot.latitude, 0.0);
            assert_eq!(snapshot.longitude, 0.5);
            assert_float_absolute_eq!(snapshot.speed_kmh.unwrap(), 1.2 * 3.6, 1e-9);
            assert_eq!(snapshot.accuracy_m, Some(4.0));
            assert_eq!(snapshot.elapsed, "00:00:30");
            assert_float_absolute_eq!(snapshot.distance_km, 55.6, 0.5);
        }
        other => panic!("unexpected notification: {:?}", other),
    }

    // delivered but not pumped yet, still part of the track
    h.source.push_readings(vec![reading(0.0, 1.0, T0 + 60_000)]);
    h.clock.advance_ms(60_000);
    let record = match h.recorder.stop_recording().unwrap() {
        StopOutcome::Saved(record) => record,
        StopOutcome::NothingToSave => panic!("expected a saved track"),
    };
    assert!(!h.source.is_subscribed());
    assert_eq!(h.recorder.session().state(), SessionState::Stopped);
    assert_eq!(record.point_count(), 3);
    assert_float_absolute_eq!(record.total_distance_km, 111.19, 0.5);
    assert_eq!(record.duration, "00:01:00");
    assert_eq!(
        h.presenter.last(),
        Some(Notification::Saved {
            distance_km: record.total_distance_km,
            duration: "00:01:00".to_string(),
        })
    );

    assert_eq!(h.recorder.saved_tracks().unwrap(), vec![record]);
    assert!(h.recorder.pending_record().is_none());
}

#[test]
fn nothing_to_save() {
    let mut h = harness("recorder-nothing_to_save");
    h.recorder.start_recording().unwrap();
    h.recorder
        .on_location_update(vec![reading(31.23, 121.47, T0)])
        .unwrap();

    assert_eq!(
        h.recorder.stop_recording().unwrap(),
        StopOutcome::NothingToSave
    );
    assert_eq!(h.presenter.last(), Some(Notification::NothingToSave));
    assert!(h.recorder.saved_tracks().unwrap().is_empty());
    assert_eq!(h.recorder.session().state(), SessionState::Stopped);
}

#[test]
fn lifecycle_misuse() {
    let mut h = harness("recorder-lifecycle_misuse");
    assert!(matches!(
        h.recorder.on_location_update(vec![reading(0.0, 0.0, T0)]),
        Err(TrackError::NotRecording)
    ));
    assert!(matches!(
        h.recorder.stop_recording(),
        Err(TrackError::NotRecording)
    ));
    assert_eq!(h.recorder.current_stats().point_count, 0);
    assert!(h.presenter.notifications().is_empty());
    assert!(h.recorder.saved_tracks().unwrap().is_empty());

    h.recorder.start_recording().unwrap();
    assert!(matches!(
        h.recorder.start_recording(),
        Err(TrackError::AlreadyRecording)
    ));
    assert_eq!(h.source.subscriptions.load(Ordering::SeqCst), 1);
}

#[test]
fn unordered_batch() {
    let mut h = harness("recorder-unordered_batch");
    h.recorder.start_recording().unwrap();

    let mut readings: Vec<_> = (0..200)
        .map(|i| reading(31.0 + i as f64 * 0.0002, 121.0, T0 + i * 1000))
        .collect();
    readings.shuffle(&mut rand::rng());
    assert_eq!(h.recorder.on_location_update(readings).unwrap(), 200);

    let samples = h.recorder.session().samples();
    assert_eq!(samples.len(), 200);
    assert!(samples
        .windows(2)
        .all(|w| w[0].captured_at_ms < w[1].captured_at_ms));
    assert_eq!(h.presenter.samples(), 200);

    // a late reading from before the last one is dropped
    assert_eq!(
        h.recorder
            .on_location_update(vec![reading(31.5, 121.0, T0)])
            .unwrap(),
        0
    );
    assert_eq!(h.recorder.current_stats().point_count, 200);
}

#[test]
fn invalid_readings_do_not_stop_recording() {
    let mut h = harness("recorder-invalid_readings");
    h.recorder.start_recording().unwrap();
    let appended = h
        .recorder
        .on_location_update(vec![
            reading(10.0, 10.0, T0),
            reading(f64::NAN, 10.0, T0 + 1000),
            reading(95.0, 10.0, T0 + 2000),
            reading(10.001, 10.0, T0 + 3000),
        ])
        .unwrap();
    assert_eq!(appended, 2);
    assert!(h.recorder.session().is_recording());
    assert!(matches!(
        h.recorder.stop_recording().unwrap(),
        StopOutcome::Saved(_)
    ));
}

#[test]
fn location_source_failure() {
    let mut h = harness("recorder-location_source_failure");
    h.recorder.start_recording().unwrap();
    h.source.push_readings(vec![
        reading(0.0, 0.0, T0),
        reading(0.0, 0.01, T0 + 1000),
    ]);
    h.source.push(LocationEvent::Unavailable {
        reason: "permission denied".to_string(),
    });
    h.recorder.pump();

    assert_eq!(
        h.presenter.last(),
        Some(Notification::LocationUnavailable {
            reason: "permission denied".to_string()
        })
    );
    assert!(!h.source.is_subscribed());
    assert_eq!(h.source.unsubscriptions.load(Ordering::SeqCst), 1);
    // what was recorded so far can still be saved
    assert!(h.recorder.session().is_recording());
    assert!(matches!(
        h.recorder.stop_recording().unwrap(),
        StopOutcome::Saved(_)
    ));
    assert_eq!(h.source.unsubscriptions.load(Ordering::SeqCst), 1);
}

#[test]
fn subscribe_failure() {
    let mut h = harness("recorder-subscribe_failure");
    *h.source.unavailable.lock().unwrap() = Some("no gps".to_string());
    assert!(matches!(
        h.recorder.start_recording(),
        Err(TrackError::LocationUnavailable { .. })
    ));
    assert_eq!(h.recorder.session().state(), SessionState::Idle);
    assert!(matches!(
        h.presenter.last(),
        Some(Notification::LocationUnavailable { .. })
    ));

    *h.source.unavailable.lock().unwrap() = None;
    h.recorder.start_recording().unwrap();
    assert!(h.recorder.session().is_recording());
}

#[test]
fn save_failure_and_retry() {
    let mut h = harness("recorder-save_failure_and_retry");
    break_track_storage(&h.support_dir, "[{\"id\": ");

    h.recorder.start_recording().unwrap();
    h.recorder
        .on_location_update(vec![reading(0.0, 0.0, T0), reading(0.0, 1.0, T0 + 1000)])
        .unwrap();
    assert!(matches!(
        h.recorder.stop_recording(),
        Err(TrackError::CorruptData { .. })
    ));
    assert!(matches!(
        h.presenter.last(),
        Some(Notification::SaveFailed { .. })
    ));
    assert!(h.recorder.pending_record().is_some());

    // the corrupted collection reads as empty and is reported
    assert!(h.recorder.saved_tracks().unwrap().is_empty());
    assert!(matches!(
        h.presenter.last(),
        Some(Notification::StorageCorrupted { .. })
    ));

    // the user chose to discard the broken collection
    h.recorder.storage_mut().delete_all_tracks().unwrap();
    let record = h.recorder.retry_save().unwrap().unwrap();
    assert!(h.recorder.pending_record().is_none());
    assert_eq!(h.recorder.saved_tracks().unwrap(), vec![record]);
    assert_eq!(h.recorder.retry_save().unwrap(), None);
}

#[test]
fn fresh_session_after_stop() {
    let mut h = harness("recorder-fresh_session_after_stop");
    for round in 0..3 {
        let start = T0 + round * 3_600_000;
        h.recorder.start_recording().unwrap();
        assert_eq!(h.recorder.current_stats().point_count, 0);
        h.source.push_readings(vec![
            reading(0.0, 0.0, start),
            reading(0.0, 0.1, start + 10_000),
        ]);
        h.clock.advance_ms(3_600_000);
        assert!(matches!(
            h.recorder.stop_recording().unwrap(),
            StopOutcome::Saved(_)
        ));
    }
    let tracks = h.recorder.saved_tracks().unwrap();
    assert_eq!(tracks.len(), 3);
    assert!(tracks.windows(2).all(|w| w[0].id < w[1].id));
    assert_eq!(h.source.subscriptions.load(Ordering::SeqCst), 3);
}

fn record_track(h: &mut Harness, start: i64) -> Result<StopOutcome, TrackError> {
    h.recorder.start_recording().unwrap();
    h.source.push_readings(vec![
        reading(0.0, 0.0, start),
        reading(0.0, 0.1, start + 10_000),
    ]);
    h.clock.advance_ms(10_000);
    h.recorder.stop_recording()
}

#[test]
fn clock_going_backwards() {
    let mut h = harness("recorder-clock_going_backwards");
    let first = match record_track(&mut h, T0).unwrap() {
        StopOutcome::Saved(record) => record,
        StopOutcome::NothingToSave => panic!("expected a saved track"),
    };
    assert_eq!(first.id, T0 + 10_000);

    // the second recording stops at the very same millisecond
    h.clock.advance_ms(-10_000);
    let second = match record_track(&mut h, T0 + 100_000).unwrap() {
        StopOutcome::Saved(record) => record,
        StopOutcome::NothingToSave => panic!("expected a saved track"),
    };
    assert_eq!(second.id, T0 + 10_001);
    assert!(h.recorder.pending_record().is_none());

    let tracks = h.recorder.saved_tracks().unwrap();
    assert_eq!(tracks, vec![first, second]);
}

#[test]
fn failed_save_survives_later_saves() {
    let mut h = harness("recorder-failed_save_survives_later_saves");
    break_track_storage(&h.support_dir, "not json");
    assert!(matches!(
        record_track(&mut h, T0),
        Err(TrackError::CorruptData { .. })
    ));
    let pending = h.recorder.pending_record().cloned().unwrap();

    h.recorder.storage_mut().delete_all_tracks().unwrap();
    h.clock.advance_ms(60_000);
    let saved = match record_track(&mut h, T0 + 100_000).unwrap() {
        StopOutcome::Saved(record) => record,
        StopOutcome::NothingToSave => panic!("expected a saved track"),
    };
    // saving another track leaves the failed one pending
    assert_eq!(h.recorder.pending_records(), &[pending.clone()]);

    // a second failure queues behind the first one
    break_track_storage(&h.support_dir, "not json");
    h.clock.advance_ms(60_000);
    assert!(record_track(&mut h, T0 + 200_000).is_err());
    assert_eq!(h.recorder.pending_records().len(), 2);
    assert!(h.recorder.retry_save().is_err());
    assert_eq!(h.recorder.pending_records().len(), 2);

    h.recorder.storage_mut().delete_all_tracks().unwrap();
    let retried = h.recorder.retry_save().unwrap().unwrap();
    assert_eq!(retried, pending);
    assert!(h.recorder.retry_save().unwrap().is_some());
    assert_eq!(h.recorder.retry_save().unwrap(), None);
    assert!(h.recorder.pending_record().is_none());

    let tracks = h.recorder.saved_tracks().unwrap();
    assert_eq!(tracks.len(), 2);
    assert_eq!(tracks[0], pending);
    assert!(!tracks.contains(&saved));
}

#[test]
fn raw_data_is_recorded() {
    let mut h = harness("recorder-raw_data_is_recorded");
    h.recorder.storage_mut().toggle_raw_data_mode(true).unwrap();
    h.recorder.start_recording().unwrap();
    h.recorder
        .on_location_update(vec![
            reading(10.0, 10.0, T0),
            reading(95.0, 10.0, T0 + 1000),
            reading(10.0, 10.001, T0 + 2000),
        ])
        .unwrap();
    h.recorder.storage_mut().flush().unwrap();

    assert!(h.recorder.storage().get_raw_data_mode());
    let files = h.recorder.storage().list_all_raw_data().unwrap();
    assert_eq!(files.len(), 1);
    let content = std::fs::read_to_string(&files[0].path).unwrap();
    // header, two accepted readings and the rejected one
    assert_eq!(content.lines().count(), 4);
    assert!(content.lines().any(|line| line.starts_with("1697349117000,95,")));
}
