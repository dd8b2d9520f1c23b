//! What the recorder tells the UI. Rendering is up to the implementor of
//! [`Presenter`].

use crate::geo_sample::GeoSample;
use crate::track_session::SessionStats;
use crate::utils;

/// Live state after each accepted sample.
#[derive(Clone, Debug, PartialEq)]
pub struct LiveSnapshot {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_kmh: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub distance_km: f64,
    pub elapsed_seconds: i64,
    /// `elapsed_seconds` as "HH:MM:SS"
    pub elapsed: String,
    pub point_count: usize,
}

impl LiveSnapshot {
    pub fn new(sample: &GeoSample, stats: &SessionStats) -> Self {
        LiveSnapshot {
            latitude: sample.latitude,
            longitude: sample.longitude,
            speed_kmh: sample.speed_kmh(),
            accuracy_m: sample.accuracy_m,
            distance_km: stats.distance_km,
            elapsed_seconds: stats.elapsed_seconds,
            elapsed: utils::format_duration(stats.elapsed_seconds),
            point_count: stats.point_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    Sample(LiveSnapshot),
    Saved { distance_km: f64, duration: String },
    NothingToSave,
    SaveFailed { reason: String },
    LocationUnavailable { reason: String },
    StorageCorrupted { reason: String },
}

pub trait Presenter: Send {
    fn notify(&mut self, notification: Notification);
}

/// Writes every notification to the log.
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn notify(&mut self, notification: Notification) {
        match notification {
            Notification::Sample(snapshot) => debug!(
                "({:.6}, {:.6}) {:.3} km, {}, {} points",
                snapshot.latitude,
                snapshot.longitude,
                snapshot.distance_km,
                snapshot.elapsed,
                snapshot.point_count
            ),
            Notification::Saved {
                distance_km,
                duration,
            } => info!("track saved: {:.2} km in {}", distance_km, duration),
            Notification::NothingToSave => info!("nothing to save"),
            Notification::SaveFailed { reason } => error!("failed to save track: {}", reason),
            Notification::LocationUnavailable { reason } => {
                warn!("location unavailable: {}", reason)
            }
            Notification::StorageCorrupted { reason } => {
                error!("saved tracks are unreadable: {}", reason)
            }
        }
    }
}
