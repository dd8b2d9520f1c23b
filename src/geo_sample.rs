use serde::{Deserialize, Serialize};

use crate::distance::Coordinate;
use crate::error::{Result, TrackError};

/// One reading as delivered by the location source. Nothing is validated yet.
#[derive(Clone, Debug, PartialEq)]
pub struct RawReading {
    pub latitude: f64,
    pub longitude: f64,
    /// meters per second
    pub speed: Option<f64>,
    /// meters
    pub accuracy: Option<f64>,
    pub timestamp_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_mps: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy_m: Option<f64>,
    pub captured_at_ms: i64,
}

impl GeoSample {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn speed_kmh(&self) -> Option<f64> {
        self.speed_mps.map(|speed| speed * 3.6)
    }
}

// missing or garbage sensor values are "unknown", not an error
fn optional_measurement(value: Option<f64>) -> Option<f64> {
    value.filter(|x| x.is_finite() && *x >= 0.0)
}

pub fn normalize(
    raw_latitude: f64,
    raw_longitude: f64,
    raw_speed: Option<f64>,
    raw_accuracy: Option<f64>,
    captured_at_ms: i64,
) -> Result<GeoSample> {
    if !raw_latitude.is_finite() || !raw_longitude.is_finite() {
        return Err(TrackError::invalid_sample(format!(
            "non-finite coordinate ({}, {})",
            raw_latitude, raw_longitude
        )));
    }
    if !(-90.0..=90.0).contains(&raw_latitude) {
        return Err(TrackError::invalid_sample(format!(
            "latitude out of range: {}",
            raw_latitude
        )));
    }
    if !(-180.0..=180.0).contains(&raw_longitude) {
        return Err(TrackError::invalid_sample(format!(
            "longitude out of range: {}",
            raw_longitude
        )));
    }
    Ok(GeoSample {
        latitude: raw_latitude,
        longitude: raw_longitude,
        speed_mps: optional_measurement(raw_speed),
        accuracy_m: optional_measurement(raw_accuracy),
        captured_at_ms,
    })
}

impl TryFrom<&RawReading> for GeoSample {
    type Error = TrackError;

    fn try_from(raw: &RawReading) -> Result<Self> {
        normalize(
            raw.latitude,
            raw.longitude,
            raw.speed,
            raw.accuracy,
            raw.timestamp_ms,
        )
    }
}
