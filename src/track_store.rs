use anyhow::Context;
use rusqlite::{Connection, OptionalExtension, Transaction};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::error::Error;
use std::path::Path;
use std::str::FromStr;

use crate::error::{Result, TrackError};
use crate::track_record::TrackRecord;
use crate::utils;

/* SQLite is only used as a key-value store with proper transactions here. All
finished tracks live in a single JSON document under the `tracks` key, which is
rewritten as a whole on every append. Tracks are small and rarely written, so
the read-modify-write is fine, and a failed write never leaves a partially
updated collection behind.

The document carries a version so the layout can evolve. Payloads written
before versioning existed are a bare JSON array of records.
*/

pub const DB_FILE_NAME: &str = "tracks.db";
const TRACKS_KEY: &str = "tracks";
pub const COLLECTION_VERSION: u32 = 1;

#[derive(Serialize)]
struct CollectionRef<'a> {
    version: u32,
    tracks: &'a [TrackRecord],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredCollection {
    Versioned {
        version: u32,
        tracks: Vec<TrackRecord>,
    },
    Unversioned(Vec<TrackRecord>),
}

fn parse_collection(payload: &str) -> Result<Vec<TrackRecord>> {
    let collection: StoredCollection =
        serde_json::from_str(payload).map_err(TrackError::corrupt_data)?;
    match collection {
        StoredCollection::Unversioned(tracks) => Ok(tracks),
        StoredCollection::Versioned { version, tracks } => {
            if version > COLLECTION_VERSION {
                Err(TrackError::corrupt_data(format!(
                    "unsupported collection version: {}, expected at most {}",
                    version, COLLECTION_VERSION
                )))
            } else {
                Ok(tracks)
            }
        }
    }
}

#[allow(clippy::type_complexity)]
fn run_migration(
    conn: &mut Connection,
    migrations: &[&dyn Fn(&Transaction) -> anyhow::Result<()>],
) -> anyhow::Result<()> {
    let tx = conn.transaction()?;

    let version = utils::db::init_metadata_and_get_version(&tx)? as usize;
    let target_version = migrations.len();
    debug!(
        "current version = {}, target_version = {}",
        version, target_version
    );
    match version.cmp(&target_version) {
        Ordering::Equal => (),
        Ordering::Less => {
            for (i, migration) in migrations.iter().enumerate().skip(version) {
                info!("running migration for version: {}", i + 1);
                migration(&tx)?;
            }
            utils::db::set_version_in_metadata(&tx, target_version as i32)?;
        }
        Ordering::Greater => {
            bail!(
                "version too high: current version = {}, target_version = {}",
                version,
                target_version
            );
        }
    }
    tx.commit()?;
    Ok(())
}

fn migrate(conn: &mut Connection) -> anyhow::Result<()> {
    run_migration(
        conn,
        &[&|tx| {
            let sql = "
            CREATE TABLE kv_record (
                key               TEXT    PRIMARY KEY
                                          NOT NULL
                                          UNIQUE,
                value             TEXT    NOT NULL
            );
            CREATE TABLE setting (
                key               TEXT    PRIMARY KEY
                                          NOT NULL
                                          UNIQUE,
                value             TEXT
            );
            ";
            for s in sql_split::split(sql) {
                tx.execute(&s, ())?;
            }
            Ok(())
        }],
    )
}

fn read_payload(conn: &Connection) -> rusqlite::Result<Option<String>> {
    conn.query_row(
        "SELECT value FROM kv_record WHERE key = ?1;",
        [TRACKS_KEY],
        |row| row.get(0),
    )
    .optional()
}

#[derive(Debug, Clone, Copy)]
pub enum Setting {
    RawDataMode,
}

impl Setting {
    fn to_db_key(self) -> &'static str {
        match self {
            Self::RawDataMode => "RAW_DATA_MODE",
        }
    }
}

pub struct TrackStore {
    conn: Connection,
}

impl TrackStore {
    pub fn open(support_dir: &str) -> Result<TrackStore> {
        debug!("opening track store in {}", support_dir);
        let path = Path::new(support_dir).join(DB_FILE_NAME);
        let mut conn = Connection::open(&path)?;
        migrate(&mut conn)
            .with_context(|| format!("failed to migrate {}", path.display()))
            .map_err(TrackError::Persistence)?;
        Ok(TrackStore { conn })
    }

    pub fn open_in_memory() -> Result<TrackStore> {
        let mut conn = Connection::open_in_memory()?;
        migrate(&mut conn).map_err(TrackError::Persistence)?;
        Ok(TrackStore { conn })
    }

    pub fn load_all(&self) -> Result<Vec<TrackRecord>> {
        match read_payload(&self.conn)? {
            None => Ok(Vec::new()),
            Some(payload) => parse_collection(&payload),
        }
    }

    /// Same as `load_all`, but a corrupted collection is logged and treated as
    /// empty instead of failing.
    pub fn load_all_or_empty(&self) -> Vec<TrackRecord> {
        match self.load_all() {
            Ok(tracks) => tracks,
            Err(error) => {
                error!("[track_store] failed to load tracks: {}", error);
                Vec::new()
            }
        }
    }

    /// Appends `record` and returns it as stored. The stored id is
    /// `max(record.id, largest stored id + 1)`, so ids stay unique even when
    /// the clock goes backwards. Appending a record that is already stored
    /// unchanged is a no-op.
    pub fn append(&mut self, record: &TrackRecord) -> Result<TrackRecord> {
        let tx = self.conn.transaction()?;
        let mut tracks = match read_payload(&tx)? {
            None => Vec::new(),
            // never overwrite what we cannot read
            Some(payload) => parse_collection(&payload)?,
        };

        if tracks.iter().any(|x| x == record) {
            info!(
                "Track with id {} already exists with the same content, skip append",
                record.id
            );
            return Ok(record.clone());
        }

        let mut stored = record.clone();
        if let Some(max_id) = tracks.iter().map(|x| x.id).max() {
            if stored.id <= max_id {
                stored.id = max_id.checked_add(1).ok_or_else(|| {
                    TrackError::Persistence(anyhow!("no track id left after {}", max_id))
                })?;
                warn!(
                    "Track id {} is already taken, using {} instead",
                    record.id, stored.id
                );
            }
        }

        tracks.push(stored.clone());
        let payload = serde_json::to_string(&CollectionRef {
            version: COLLECTION_VERSION,
            tracks: &tracks,
        })
        .map_err(|e| TrackError::Persistence(e.into()))?;
        tx.execute(
            "INSERT OR REPLACE INTO kv_record (key, value) VALUES (?1, ?2);",
            (TRACKS_KEY, payload),
        )?;
        tx.commit()?;

        info!(
            "Track appended: id={}, point_count={}, total={}",
            stored.id,
            stored.point_count(),
            tracks.len()
        );
        Ok(stored)
    }

    pub fn delete_all(&mut self) -> Result<()> {
        info!("Deleting all tracks");
        self.conn.execute("DELETE FROM kv_record WHERE key = ?1;", [TRACKS_KEY])?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        self.conn.cache_flush()?;
        Ok(())
    }

    fn get_setting<T: FromStr>(&self, setting: Setting) -> anyhow::Result<Option<T>>
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        let result: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM setting WHERE key = ?1;",
                [setting.to_db_key()],
                |row| row.get(0),
            )
            .optional()?;
        match result {
            None => Ok(None),
            Some(s) => Ok(Some(FromStr::from_str(&s)?)),
        }
    }

    pub fn get_setting_with_default<T: FromStr>(&self, setting: Setting, default: T) -> T
    where
        <T as FromStr>::Err: Error + Send + Sync + 'static,
    {
        match self.get_setting(setting) {
            Ok(v) => v,
            Err(error) => {
                warn!(
                    "[track_store.get_setting_with_default] setting:{:?}, error:{}",
                    setting, error
                );
                None
            }
        }
        .unwrap_or(default)
    }

    pub fn set_setting<T: ToString>(&mut self, setting: Setting, value: T) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO setting (key, value) VALUES (?1, ?2);",
            (setting.to_db_key(), value.to_string()),
        )?;
        Ok(())
    }
}
