use crate::distance::haversine_distance_km;
use crate::error::{Result, TrackError};
use crate::geo_sample::GeoSample;
use crate::track_record::TrackRecord;
use crate::utils::{Clock, SystemClock};

/// A track needs at least this many samples to be worth saving.
pub const MIN_SAMPLES_FOR_RECORD: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq, strum_macros::Display)]
pub enum SessionState {
    Idle,
    Recording,
    Stopped,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(i8)]
pub enum IngestResult {
    Append = 0,
    // stale or out of order, not stored
    Ignore = -1,
}

impl IngestResult {
    pub fn to_int(&self) -> i8 {
        *self as i8
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SessionStats {
    pub point_count: usize,
    pub elapsed_seconds: i64,
    pub distance_km: f64,
}

pub struct TrackSession {
    state: SessionState,
    samples: Vec<GeoSample>,
    started_at_ms: Option<i64>,
    stopped_at_ms: Option<i64>,
    distance_km: f64,
    clock: Box<dyn Clock>,
}

impl TrackSession {
    pub fn new() -> Self {
        Self::with_clock(Box::new(SystemClock))
    }

    pub fn with_clock(clock: Box<dyn Clock>) -> Self {
        TrackSession {
            state: SessionState::Idle,
            samples: Vec::new(),
            started_at_ms: None,
            stopped_at_ms: None,
            distance_km: 0.0,
            clock,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn samples(&self) -> &[GeoSample] {
        &self.samples
    }

    pub fn last_sample(&self) -> Option<&GeoSample> {
        self.samples.last()
    }

    pub fn started_at_ms(&self) -> Option<i64> {
        self.started_at_ms
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state == SessionState::Recording {
            return Err(TrackError::AlreadyRecording);
        }
        self.samples.clear();
        self.distance_km = 0.0;
        self.started_at_ms = Some(self.clock.now_ms());
        self.stopped_at_ms = None;
        self.state = SessionState::Recording;
        info!("[track_session] recording started");
        Ok(())
    }

    pub fn ingest(&mut self, sample: GeoSample) -> Result<IngestResult> {
        if self.state != SessionState::Recording {
            return Err(TrackError::NotRecording);
        }
        if let Some(last) = self.samples.last() {
            if sample.captured_at_ms < last.captured_at_ms {
                // NOTE: location sources occasionally hand back a fix from a
                // while ago. Keeping it would make the track zigzag, so drop it.
                debug!(
                    "[track_session] dropping stale sample: captured_at_ms={}, last={}",
                    sample.captured_at_ms, last.captured_at_ms
                );
                return Ok(IngestResult::Ignore);
            }
            self.distance_km += haversine_distance_km(&last.coordinate(), &sample.coordinate());
        }
        self.samples.push(sample);
        Ok(IngestResult::Append)
    }

    fn elapsed_ms(&self) -> i64 {
        let started_at_ms = match self.started_at_ms {
            None => return 0,
            Some(x) => x,
        };
        let elapsed = match (self.samples.first(), self.samples.last()) {
            (Some(first), Some(last)) if self.samples.len() >= 2 => {
                last.captured_at_ms.saturating_sub(first.captured_at_ms)
            }
            _ => {
                let end = self.stopped_at_ms.unwrap_or_else(|| self.clock.now_ms());
                end.saturating_sub(started_at_ms)
            }
        };
        elapsed.max(0)
    }

    pub fn current_stats(&self) -> SessionStats {
        SessionStats {
            point_count: self.samples.len(),
            elapsed_seconds: self.elapsed_ms() / 1000,
            distance_km: self.distance_km,
        }
    }

    pub fn stop(&mut self) -> Result<TrackRecord> {
        if self.state != SessionState::Recording {
            return Err(TrackError::NotRecording);
        }
        let now_ms = self.clock.now_ms();
        self.stopped_at_ms = Some(now_ms);
        self.state = SessionState::Stopped;

        let point_count = self.samples.len();
        info!("[track_session] recording stopped: point_count={}", point_count);
        if point_count < MIN_SAMPLES_FOR_RECORD {
            return Err(TrackError::InsufficientData {
                point_count,
                minimum: MIN_SAMPLES_FOR_RECORD,
            });
        }

        Ok(TrackRecord::new(
            now_ms,
            self.started_at_ms.unwrap_or(now_ms),
            self.samples.clone(),
            self.distance_km,
            self.elapsed_ms() / 1000,
        ))
    }
}

impl Default for TrackSession {
    fn default() -> Self {
        Self::new()
    }
}
