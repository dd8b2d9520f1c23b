#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;

pub mod distance;
pub mod error;
pub mod export_data;
pub mod geo_sample;
pub mod import_data;
pub mod location;
pub mod logs;
pub mod presentation;
pub mod recorder;
pub mod storage;
pub mod track_record;
pub mod track_session;
pub mod track_store;
pub mod utils;

pub use error::{Result, TrackError};
