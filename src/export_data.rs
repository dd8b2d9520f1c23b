use anyhow::Result;
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Time, Track, TrackSegment, Waypoint};
use std::io::Write;
use time::OffsetDateTime;

use crate::track_record::TrackRecord;

pub fn track_record_to_gpx(record: &TrackRecord) -> Result<Gpx> {
    let mut segment = TrackSegment::new();
    for sample in &record.samples {
        let mut waypoint = Waypoint::new(Point::new(sample.longitude, sample.latitude));
        let captured_at =
            OffsetDateTime::from_unix_timestamp_nanos(sample.captured_at_ms as i128 * 1_000_000)?;
        waypoint.time = Some(Time::from(captured_at));
        waypoint.speed = sample.speed_mps;
        waypoint.hdop = sample.accuracy_m;
        segment.points.push(waypoint);
    }

    let mut track = Track::new();
    track.name = Some(format!("Track {}", record.started_at));
    track.description = Some(format!(
        "{:.2} km in {}",
        record.total_distance_km, record.duration
    ));
    track.segments.push(segment);

    Ok(Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("tracklog".to_string()),
        tracks: vec![track],
        ..Default::default()
    })
}

pub fn track_record_to_gpx_file<T: Write>(record: &TrackRecord, writer: &mut T) -> Result<()> {
    let gpx = track_record_to_gpx(record)?;
    gpx::write(&gpx, writer)?;
    Ok(())
}
