use anyhow::Context;
use chrono::Utc;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, TrackError};
use crate::geo_sample::RawReading;
use crate::track_record::TrackRecord;
use crate::track_session::IngestResult;
use crate::track_store::{Setting, TrackStore};

pub struct RawDataFile {
    pub name: String,
    pub path: String,
}

/* Optional and off by default: keep every raw reading we got from the location
   source, with the ingest result, in a csv file. Meant for debugging location
   sources. A new file is used every time the recorder is enabled.
*/
struct RawDataRecorder {
    dir: PathBuf,
    file: Option<File>,
}

impl RawDataRecorder {
    fn init(support_dir: &str) -> anyhow::Result<RawDataRecorder> {
        let dir = Path::new(support_dir).join("raw_data/");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        Ok(RawDataRecorder { dir, file: None })
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }

    fn open_new_file(&self) -> anyhow::Result<File> {
        let timestamp_sec = Utc::now().timestamp();
        let mut i = 0;
        let filename = loop {
            let filename = self.dir.join(format!("gps-{}-{}.csv", timestamp_sec, i));
            if std::fs::metadata(&filename).is_err() {
                break filename;
            }
            i += 1;
        };
        let mut file = File::create(filename)?;
        file.write_all(
            "timestamp_ms,latitude,longitude,accuracy,speed,ingest_result\n".as_bytes(),
        )?;
        Ok(file)
    }

    fn record(
        &mut self,
        raw_reading: &RawReading,
        ingest_result: Option<IngestResult>,
    ) -> anyhow::Result<()> {
        let file = match self.file.take() {
            Some(file) => file,
            None => self.open_new_file()?,
        };
        let file = self.file.insert(file);
        file.write_all(
            format!(
                "{},{},{},{},{},{}\n",
                raw_reading.timestamp_ms,
                raw_reading.latitude,
                raw_reading.longitude,
                &raw_reading.accuracy.map(|x| x.to_string()).unwrap_or_default(),
                &raw_reading.speed.map(|x| x.to_string()).unwrap_or_default(),
                // empty when the reading was rejected before ingest
                &ingest_result.map(|x| x.to_int().to_string()).unwrap_or_default(),
            )
            .as_bytes(),
        )?;
        Ok(())
    }
}

pub struct Storage {
    support_dir: String,
    track_store: TrackStore,
    raw_data_recorder: Option<RawDataRecorder>, // `None` means disabled
}

impl Storage {
    pub fn init(support_dir: String) -> Result<Self> {
        let track_store = TrackStore::open(&support_dir)?;
        let raw_data_recorder =
            if track_store.get_setting_with_default(Setting::RawDataMode, false) {
                Some(RawDataRecorder::init(&support_dir).map_err(TrackError::Persistence)?)
            } else {
                None
            };
        Ok(Storage {
            support_dir,
            track_store,
            raw_data_recorder,
        })
    }

    pub fn track_store(&self) -> &TrackStore {
        &self.track_store
    }

    pub fn toggle_raw_data_mode(&mut self, enable: bool) -> Result<()> {
        if enable {
            if self.raw_data_recorder.is_none() {
                let recorder =
                    RawDataRecorder::init(&self.support_dir).map_err(TrackError::Persistence)?;
                self.raw_data_recorder = Some(recorder);
                debug!("[storage] raw data mode enabled");
                self.track_store.set_setting(Setting::RawDataMode, true)?;
            }
        } else if self.raw_data_recorder.is_some() {
            debug!("[storage] raw data mode disabled");
            // `drop` closes the file
            self.raw_data_recorder = None;
            self.track_store.set_setting(Setting::RawDataMode, false)?;
        }
        Ok(())
    }

    pub fn get_raw_data_mode(&self) -> bool {
        self.raw_data_recorder.is_some()
    }

    // Best effort, a debugging aid should never interrupt recording.
    pub fn record_raw_data(
        &mut self,
        raw_reading: &RawReading,
        ingest_result: Option<IngestResult>,
    ) {
        if let Some(ref mut recorder) = self.raw_data_recorder {
            if let Err(error) = recorder.record(raw_reading, ingest_result) {
                warn!("[storage] failed to record raw data: {:#}", error);
            }
        }
    }

    pub fn list_all_raw_data(&self) -> Result<Vec<RawDataFile>> {
        let dir = Path::new(&self.support_dir).join("raw_data/");
        let mut result = Vec::new();
        if !dir.exists() {
            return Ok(result);
        }
        for entry in std::fs::read_dir(dir).map_err(|e| TrackError::Persistence(e.into()))? {
            let entry = entry.map_err(|e| TrackError::Persistence(e.into()))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".csv") {
                result.push(RawDataFile {
                    name,
                    path: entry.path().to_string_lossy().into_owned(),
                })
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Returns the track as stored, its id may differ from `record.id`.
    pub fn append_track(&mut self, record: &TrackRecord) -> Result<TrackRecord> {
        self.track_store.append(record)
    }

    pub fn load_tracks(&self) -> Result<Vec<TrackRecord>> {
        self.track_store.load_all()
    }

    pub fn delete_all_tracks(&mut self) -> Result<()> {
        self.track_store.delete_all()
    }

    pub fn flush(&mut self) -> Result<()> {
        debug!("[storage] flushing");
        self.track_store.flush()?;
        if let Some(ref mut recorder) = self.raw_data_recorder {
            recorder.flush().map_err(TrackError::Persistence)?;
        }
        Ok(())
    }
}
