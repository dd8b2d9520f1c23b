use serde::{Deserialize, Serialize};

use crate::geo_sample::GeoSample;
use crate::utils;

/// A finished recording. Never modified after it is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    /// creation time in epoch millis, moved forward by the store when taken
    pub id: i64,
    pub created_at: String,
    pub started_at: String,
    pub samples: Vec<GeoSample>,
    pub total_distance_km: f64,
    pub duration: String,
    // records written before this field existed only have `duration`
    #[serde(default)]
    pub duration_seconds: i64,
}

impl TrackRecord {
    pub fn new(
        created_at_ms: i64,
        started_at_ms: i64,
        samples: Vec<GeoSample>,
        total_distance_km: f64,
        duration_seconds: i64,
    ) -> Self {
        TrackRecord {
            id: created_at_ms,
            created_at: utils::format_local_datetime(created_at_ms),
            started_at: utils::format_local_datetime(started_at_ms),
            samples,
            total_distance_km,
            duration: utils::format_duration(duration_seconds),
            duration_seconds,
        }
    }

    pub fn point_count(&self) -> usize {
        self.samples.len()
    }
}
