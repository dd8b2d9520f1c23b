use std::sync::mpsc::{self, Receiver};

use crate::error::{Result, TrackError};
use crate::geo_sample::{GeoSample, RawReading};
use crate::location::{LocationEvent, LocationSource};
use crate::presentation::{LiveSnapshot, Notification, Presenter};
use crate::storage::Storage;
use crate::track_record::TrackRecord;
use crate::track_session::{IngestResult, SessionStats, TrackSession};

#[derive(Debug, PartialEq)]
pub enum StopOutcome {
    Saved(TrackRecord),
    NothingToSave,
}

/// Ties a location source, a recording session, storage and the UI together.
/// Owns all of them, a host that needs to share it across threads can put it
/// behind a `Mutex`.
pub struct Recorder {
    session: TrackSession,
    storage: Storage,
    source: Box<dyn LocationSource>,
    events: Option<Receiver<LocationEvent>>,
    presenter: Box<dyn Presenter>,
    // stopped tracks whose save failed, oldest first, kept for `retry_save`
    pending_records: Vec<TrackRecord>,
}

impl Recorder {
    pub fn new(
        storage: Storage,
        source: Box<dyn LocationSource>,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        Self::with_session(TrackSession::new(), storage, source, presenter)
    }

    pub fn with_session(
        session: TrackSession,
        storage: Storage,
        source: Box<dyn LocationSource>,
        presenter: Box<dyn Presenter>,
    ) -> Self {
        Recorder {
            session,
            storage,
            source,
            events: None,
            presenter,
            pending_records: Vec::new(),
        }
    }

    pub fn session(&self) -> &TrackSession {
        &self.session
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut Storage {
        &mut self.storage
    }

    /// The oldest track that still needs to be saved, see `retry_save`.
    pub fn pending_record(&self) -> Option<&TrackRecord> {
        self.pending_records.first()
    }

    pub fn pending_records(&self) -> &[TrackRecord] {
        &self.pending_records
    }

    pub fn current_stats(&self) -> SessionStats {
        self.session.current_stats()
    }

    pub fn start_recording(&mut self) -> Result<()> {
        if self.session.is_recording() {
            return Err(TrackError::AlreadyRecording);
        }
        let (sender, receiver) = mpsc::channel();
        if let Err(error) = self.source.subscribe(sender) {
            let reason = format!("{:#}", error);
            self.presenter.notify(Notification::LocationUnavailable {
                reason: reason.clone(),
            });
            return Err(TrackError::LocationUnavailable { reason });
        }
        self.events = Some(receiver);
        self.session.start()
    }

    /// Handles everything the current subscription delivered so far. Returns
    /// the number of events handled.
    pub fn pump(&mut self) -> usize {
        let events: Vec<LocationEvent> = match &self.events {
            None => return 0,
            Some(receiver) => receiver.try_iter().collect(),
        };
        let count = events.len();
        for event in events {
            match event {
                LocationEvent::Readings(readings) => {
                    if let Err(error) = self.on_location_update(readings) {
                        debug!("[recorder] readings dropped: {}", error);
                    }
                }
                LocationEvent::Unavailable { reason } => {
                    self.on_location_unavailable(&reason);
                    break;
                }
            }
        }
        count
    }

    /// Returns the number of readings appended to the track.
    pub fn on_location_update(&mut self, mut readings: Vec<RawReading>) -> Result<usize> {
        if !self.session.is_recording() {
            return Err(TrackError::NotRecording);
        }
        // NOTE: batches are not always in capture order
        readings.sort_by_key(|x| x.timestamp_ms);

        let mut appended = 0;
        for raw_reading in readings {
            let sample = match GeoSample::try_from(&raw_reading) {
                Ok(sample) => sample,
                Err(error) => {
                    warn!("[recorder] {}", error);
                    self.storage.record_raw_data(&raw_reading, None);
                    continue;
                }
            };
            let ingest_result = self.session.ingest(sample)?;
            self.storage.record_raw_data(&raw_reading, Some(ingest_result));
            if ingest_result == IngestResult::Append {
                appended += 1;
                if let Some(last) = self.session.last_sample() {
                    let snapshot = LiveSnapshot::new(last, &self.session.current_stats());
                    self.presenter.notify(Notification::Sample(snapshot));
                }
            }
        }
        Ok(appended)
    }

    /// The source gave up. The samples collected so far stay in the session,
    /// which can still be stopped and saved.
    pub fn on_location_unavailable(&mut self, reason: &str) {
        warn!("[recorder] location source unavailable: {}", reason);
        self.unsubscribe();
        self.presenter.notify(Notification::LocationUnavailable {
            reason: reason.to_string(),
        });
    }

    fn unsubscribe(&mut self) {
        if self.events.take().is_some() {
            self.source.unsubscribe();
        }
    }

    pub fn stop_recording(&mut self) -> Result<StopOutcome> {
        if !self.session.is_recording() {
            return Err(TrackError::NotRecording);
        }
        // readings delivered before the stop still belong to this track
        self.pump();
        self.unsubscribe();

        match self.session.stop() {
            Ok(record) => match self.save(&record) {
                Ok(stored) => Ok(StopOutcome::Saved(stored)),
                Err(error) => {
                    self.pending_records.push(record);
                    Err(error)
                }
            },
            Err(TrackError::InsufficientData { point_count, .. }) => {
                info!("[recorder] nothing to save: point_count={}", point_count);
                self.presenter.notify(Notification::NothingToSave);
                Ok(StopOutcome::NothingToSave)
            }
            Err(error) => Err(error),
        }
    }

    fn save(&mut self, record: &TrackRecord) -> Result<TrackRecord> {
        match self.storage.append_track(record) {
            Ok(stored) => {
                self.presenter.notify(Notification::Saved {
                    distance_km: stored.total_distance_km,
                    duration: stored.duration.clone(),
                });
                Ok(stored)
            }
            Err(error) => {
                error!("[recorder] failed to save track {}: {}", record.id, error);
                self.presenter.notify(Notification::SaveFailed {
                    reason: error.to_string(),
                });
                Err(error)
            }
        }
    }

    /// Saves the oldest track of a failed save again. `None` if there is
    /// nothing pending. A track stays pending until it is saved.
    pub fn retry_save(&mut self) -> Result<Option<TrackRecord>> {
        let record = match self.pending_records.first() {
            None => return Ok(None),
            Some(record) => record.clone(),
        };
        let stored = self.save(&record)?;
        self.pending_records.remove(0);
        Ok(Some(stored))
    }

    /// Saved tracks, oldest first. An unreadable collection is reported to the
    /// presenter and treated as empty.
    pub fn saved_tracks(&mut self) -> Result<Vec<TrackRecord>> {
        match self.storage.load_tracks() {
            Ok(tracks) => Ok(tracks),
            Err(TrackError::CorruptData { reason }) => {
                error!("[recorder] saved tracks are corrupted: {}", reason);
                self.presenter.notify(Notification::StorageCorrupted { reason });
                Ok(Vec::new())
            }
            Err(error) => Err(error),
        }
    }
}
