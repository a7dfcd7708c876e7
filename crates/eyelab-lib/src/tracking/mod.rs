//! Gaze recording: buffers samples delivered by the device next to named
//! event columns and writes both out as one TSV record.

pub mod events;
pub mod tsv;

pub use events::{EventLog, EventValue};
pub use tsv::{gaze_fields, write_tsv, GAZE_COLUMNS};

use crate::bridge::lock;
use crate::clock::SyncAdapter;
use crate::device::{EyeTracker, GazeSample, GazeSink, SubscriptionId};
use crate::error::{Result, TrackerError};
use log::{debug, info, warn};
use serde::Serialize;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Latest gaze in screen-relative coordinates: x right, y up, both in [-1, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GazePosition {
    pub left: (f64, f64),
    pub right: (f64, f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PupilReading {
    pub left_pupil: f64,
    pub left_validity: u8,
    pub right_pupil: f64,
    pub right_validity: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlushReport {
    /// No data file was set; nothing written.
    Skipped,
    /// No samples were buffered; nothing written.
    Empty,
    Written { rows: usize },
}

struct ActiveSubscription {
    tracker: Arc<dyn EyeTracker>,
    id: SubscriptionId,
}

pub struct TrackingSession {
    sync: SyncAdapter,
    samples: Arc<Mutex<Vec<GazeSample>>>,
    events: EventLog,
    data_file: Option<Box<dyn Write + Send>>,
    active: Option<ActiveSubscription>,
}

impl TrackingSession {
    pub fn new(sync: SyncAdapter) -> Self {
        Self {
            sync,
            samples: Arc::new(Mutex::new(Vec::new())),
            events: EventLog::new(),
            data_file: None,
            active: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn sample_count(&self) -> usize {
        lock(&self.samples).len()
    }

    pub fn configure_channels<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.events.configure(names);
        debug!("event channels: {:?}", self.events.names());
    }

    pub fn set_data_file(&mut self, file: Box<dyn Write + Send>) {
        self.data_file = Some(file);
    }

    pub fn has_data_file(&self) -> bool {
        self.data_file.is_some()
    }

    /// Flush what is buffered, then release the data file.
    pub fn close_data_file(&mut self) -> Result<FlushReport> {
        let report = if self.data_file.is_some() {
            self.flush()
        } else {
            Ok(FlushReport::Skipped)
        };
        self.data_file = None;
        report
    }

    pub fn start(&mut self, tracker: Arc<dyn EyeTracker>) -> Result<()> {
        if self.active.is_some() {
            return Err(TrackerError::SessionBusy);
        }
        lock(&self.samples).clear();
        self.events.clear_values();
        let samples = Arc::clone(&self.samples);
        let sink: GazeSink = Arc::new(move |sample: GazeSample| lock(&samples).push(sample));
        let id = tracker.subscribe_gaze(sink);
        tracker.start_tracking();
        info!("Tracking started");
        self.active = Some(ActiveSubscription { tracker, id });
        Ok(())
    }

    /// Stop the device, flush to the data file and clear the buffers.
    pub fn stop(&mut self) -> Result<FlushReport> {
        let active = self.active.take().ok_or(TrackerError::NotTracking)?;
        active.tracker.stop_tracking();
        active.tracker.unsubscribe_gaze(active.id);
        info!("Tracking stopped with {} samples", self.sample_count());
        let report = self.flush();
        lock(&self.samples).clear();
        self.events.clear_values();
        report
    }

    /// Stamp `name` with the current time on the device clock.
    pub fn record_event(&mut self, name: &str) -> Result<()> {
        let timestamp = self.sync.remote_now()?;
        self.events.append(name, EventValue::Int(timestamp))
    }

    pub fn set_param(&mut self, name: &str, value: impl Into<EventValue>) -> Result<()> {
        self.events.set(name, value.into())
    }

    pub fn append_param(&mut self, name: &str, value: impl Into<EventValue>) -> Result<()> {
        self.events.append(name, value.into())
    }

    pub fn set_vector<I, V>(&mut self, name: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<EventValue>,
    {
        self.events
            .set_vector(name, values.into_iter().map(Into::into).collect())
    }

    /// Write the buffered samples and event columns to the data file.
    pub fn flush(&mut self) -> Result<FlushReport> {
        let Some(file) = self.data_file.as_mut() else {
            warn!("data file is not set.");
            return Ok(FlushReport::Skipped);
        };
        let samples = lock(&self.samples).clone();
        if samples.is_empty() {
            return Ok(FlushReport::Empty);
        }
        let rows = write_tsv(&mut *file, &samples, &self.events)?;
        file.flush()?;
        Ok(FlushReport::Written { rows })
    }

    pub fn latest_sample(&self) -> Option<GazeSample> {
        lock(&self.samples).last().copied()
    }

    pub fn current_gaze_position(&self) -> Option<GazePosition> {
        self.latest_sample().map(|sample| {
            let relative = |x: f64, y: f64| ((x - 0.5) * 2.0, (0.5 - y) * 2.0);
            GazePosition {
                left: relative(sample.left.gaze_point_2d.x, sample.left.gaze_point_2d.y),
                right: relative(sample.right.gaze_point_2d.x, sample.right.gaze_point_2d.y),
            }
        })
    }

    pub fn current_pupil_and_validity(&self) -> Option<PupilReading> {
        self.latest_sample().map(|sample| PupilReading {
            left_pupil: sample.left.pupil,
            left_validity: sample.left.validity,
            right_pupil: sample.right.pupil,
            right_validity: sample.right.validity,
        })
    }
}
