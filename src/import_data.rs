use anyhow::Result;
use chrono::{DateTime, Utc};
use gpx::read;
use std::{fs::File, io::BufReader, io::Read};

use crate::geo_sample::RawReading;

/// One `Vec` per GPX track segment. Points without a time are skipped, a
/// reading without a capture time is not usable for recording.
pub fn load_gpx_from_reader<R: Read>(reader: R) -> Result<Vec<Vec<RawReading>>> {
    let gpx_data = read(reader)?;
    let mut segments = Vec::new();
    let mut skipped = 0;
    for track in &gpx_data.tracks {
        for segment in &track.segments {
            let mut readings = Vec::with_capacity(segment.points.len());
            for point in &segment.points {
                let timestamp = match &point.time {
                    Some(time) => {
                        DateTime::<Utc>::from(DateTime::parse_from_rfc3339(&time.format()?)?)
                    }
                    None => {
                        skipped += 1;
                        continue;
                    }
                };
                readings.push(RawReading {
                    latitude: point.point().y(),
                    longitude: point.point().x(),
                    speed: point.speed,
                    // hdop is the closest thing gpx has to an accuracy
                    accuracy: point.hdop,
                    timestamp_ms: timestamp.timestamp_millis(),
                });
            }
            if !readings.is_empty() {
                segments.push(readings);
            }
        }
    }
    if skipped > 0 {
        warn!("[import_data] skipped {} points without time", skipped);
    }
    Ok(segments)
}

pub fn load_gpx(file_path: &str) -> Result<Vec<Vec<RawReading>>> {
    load_gpx_from_reader(BufReader::new(File::open(file_path)?))
}
