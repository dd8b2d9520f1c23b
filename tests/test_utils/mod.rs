use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use tempdir::TempDir;
use tracklog_core::geo_sample::{normalize, GeoSample, RawReading};
use tracklog_core::location::{LocationEvent, LocationSource};
use tracklog_core::presentation::{Notification, Presenter};
use tracklog_core::track_session::TrackSession;
use tracklog_core::utils::Clock;

// 2023-10-15T05:51:56Z
pub const T0: i64 = 1697349116000;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn temp_support_dir(name: &str) -> (TempDir, String) {
    let temp_dir = TempDir::new(name).unwrap();
    println!("temp dir: {:?}", temp_dir.path());
    let path = temp_dir.path().to_str().unwrap().to_owned();
    (temp_dir, path)
}

pub fn reading(latitude: f64, longitude: f64, timestamp_ms: i64) -> RawReading {
    RawReading {
        latitude,
        longitude,
        speed: Some(1.2),
        accuracy: Some(4.0),
        timestamp_ms,
    }
}

pub fn sample(latitude: f64, longitude: f64, timestamp_ms: i64) -> GeoSample {
    normalize(latitude, longitude, None, None, timestamp_ms).unwrap()
}

#[derive(Clone)]
pub struct ManualClock(Arc<AtomicI64>);

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        ManualClock(Arc::new(AtomicI64::new(now_ms)))
    }

    pub fn advance_ms(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn session_at(clock: &ManualClock) -> TrackSession {
    TrackSession::with_clock(Box::new(clock.clone()))
}

#[derive(Clone, Default)]
pub struct RecordingPresenter(Arc<Mutex<Vec<Notification>>>);

impl RecordingPresenter {
    pub fn notifications(&self) -> Vec<Notification> {
        self.0.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.0.lock().unwrap().last().cloned()
    }

    pub fn samples(&self) -> usize {
        self.0
            .lock()
            .unwrap()
            .iter()
            .filter(|x| matches!(x, Notification::Sample(_)))
            .count()
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&mut self, notification: Notification) {
        self.0.lock().unwrap().push(notification);
    }
}

/// A location source driven by the test through `push`.
#[derive(Clone, Default)]
pub struct ManualSource {
    sink: Arc<Mutex<Option<Sender<LocationEvent>>>>,
    pub subscriptions: Arc<AtomicUsize>,
    pub unsubscriptions: Arc<AtomicUsize>,
    pub unavailable: Arc<Mutex<Option<String>>>,
}

impl ManualSource {
    pub fn push(&self, event: LocationEvent) -> bool {
        match self.sink.lock().unwrap().as_ref() {
            None => false,
            Some(sink) => sink.send(event).is_ok(),
        }
    }

    pub fn push_readings(&self, readings: Vec<RawReading>) -> bool {
        self.push(LocationEvent::Readings(readings))
    }

    pub fn is_subscribed(&self) -> bool {
        self.sink.lock().unwrap().is_some()
    }
}

impl LocationSource for ManualSource {
    fn subscribe(&mut self, sink: Sender<LocationEvent>) -> anyhow::Result<()> {
        if let Some(reason) = self.unavailable.lock().unwrap().as_ref() {
            anyhow::bail!("{}", reason);
        }
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.unsubscriptions.fetch_add(1, Ordering::SeqCst);
        *self.sink.lock().unwrap() = None;
    }
}
