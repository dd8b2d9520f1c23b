use anyhow::Result;
use std::sync::mpsc::Sender;

use crate::geo_sample::RawReading;
use crate::import_data;

#[derive(Clone, Debug, PartialEq)]
pub enum LocationEvent {
    /// Readings may arrive in batches, and not necessarily in capture order.
    Readings(Vec<RawReading>),
    /// The source stopped working. Nothing else is delivered on this
    /// subscription.
    Unavailable { reason: String },
}

/// Pushes location events into `sink` from `subscribe` until `unsubscribe`.
/// Every subscription gets its own channel, so events of an earlier
/// subscription are never mixed into a later one.
pub trait LocationSource: Send {
    fn subscribe(&mut self, sink: Sender<LocationEvent>) -> Result<()>;
    fn unsubscribe(&mut self);
}

/// Replays a recorded GPX file, one batch per track segment.
pub struct GpxReplaySource {
    segments: Vec<Vec<RawReading>>,
    subscribed: bool,
}

impl GpxReplaySource {
    pub fn new(segments: Vec<Vec<RawReading>>) -> Self {
        GpxReplaySource {
            segments,
            subscribed: false,
        }
    }

    pub fn open(file_path: &str) -> Result<Self> {
        Ok(Self::new(import_data::load_gpx(file_path)?))
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }
}

impl LocationSource for GpxReplaySource {
    fn subscribe(&mut self, sink: Sender<LocationEvent>) -> Result<()> {
        if self.segments.is_empty() {
            bail!("nothing to replay");
        }
        self.subscribed = true;
        for segment in &self.segments {
            // the receiving side is gone, nobody is listening anymore
            if sink.send(LocationEvent::Readings(segment.clone())).is_err() {
                break;
            }
        }
        Ok(())
    }

    fn unsubscribe(&mut self) {
        self.subscribed = false;
    }
}
