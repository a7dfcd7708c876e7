//! Device model for the eye tracker: the records it produces and the
//! callback-style interfaces it exposes.
//!
//! Every request to the hardware completes asynchronously on a device worker
//! thread by invoking a one-shot [`Completion`]. Nothing here blocks; the
//! blocking facade lives in [`crate::bridge`].

use crate::clock::ClockSync;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Validity code the tracker reports when an eye was not found at all.
pub const VALIDITY_NO_DATA: u8 = 4;

/// Calibration status code of a usable per-eye calibration sample.
pub const CALIBRATION_STATUS_VALID: i32 = 1;

/// Error code reported by the tracker for a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorCode(pub u32);

impl ErrorCode {
    /// The unit does not speak protocol version 1.0.
    pub const UNIT_TOO_OLD: ErrorCode = ErrorCode(0x2000_0402);
    /// Calibration compute failed because too little data was collected.
    pub const INSUFFICIENT_DATA: ErrorCode = ErrorCode(0x2000_0502);

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// One-shot callback resolving an asynchronous device request.
pub type Completion<T> = Box<dyn FnOnce(Result<T, ErrorCode>) + Send + 'static>;

/// Receives gaze samples on the device's worker thread.
pub type GazeSink = Arc<dyn Fn(GazeSample) + Send + Sync>;

/// Receives discovery events on the browser's worker thread.
pub type BrowseListener = Arc<dyn Fn(BrowseEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub product_id: String,
    pub model: String,
    pub generation: String,
    pub firmware_version: String,
    pub address: String,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}, firmware {}) at {}",
            self.product_id, self.model, self.generation, self.firmware_version, self.address
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BrowseEvent {
    Found(DeviceDescriptor),
    Lost(DeviceDescriptor),
    Updated(DeviceDescriptor),
}

impl BrowseEvent {
    pub fn descriptor(&self) -> &DeviceDescriptor {
        match self {
            BrowseEvent::Found(d) | BrowseEvent::Lost(d) | BrowseEvent::Updated(d) => d,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point2D {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<[f64; 2]> for Point2D {
    fn from([x, y]: [f64; 2]) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point2D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3D {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3D {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point3D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, {:?}, {:?})", self.x, self.y, self.z)
    }
}

/// Per-eye portion of a gaze sample.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeGaze {
    pub eye_position_3d: Point3D,
    pub eye_position_3d_relative: Point3D,
    pub gaze_point_3d: Point3D,
    /// Normalized display coordinates, origin top-left.
    pub gaze_point_2d: Point2D,
    pub pupil: f64,
    /// 0 (certain) through 4 (no data).
    pub validity: u8,
}

impl EyeGaze {
    pub fn has_data(&self) -> bool {
        self.validity != VALIDITY_NO_DATA
    }
}

/// One tracking tick. `timestamp` is in device-clock microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazeSample {
    pub timestamp: i64,
    pub left: EyeGaze,
    pub right: EyeGaze,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSample {
    pub map_point: Point2D,
    pub status: i32,
}

impl CalibrationSample {
    pub fn is_valid(&self) -> bool {
        self.status == CALIBRATION_STATUS_VALID
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationPlotItem {
    pub true_point: Point2D,
    pub left: CalibrationSample,
    pub right: CalibrationSample,
}

/// Calibration as reported back by the device. The calibration blob itself
/// stays on the device; only the plot data crosses over.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    pub plot_data: Vec<CalibrationPlotItem>,
}

/// Watches the network for eye trackers.
pub trait DeviceBrowser: Send + Sync {
    fn start(&self, listener: BrowseListener);
    fn stop(&self);
}

/// Opens a connection to a discovered device.
pub trait DeviceConnector: Send + Sync {
    fn connect(&self, descriptor: &DeviceDescriptor, done: Completion<Arc<dyn EyeTracker>>);
}

/// A connected eye tracker.
pub trait EyeTracker: Send + Sync {
    fn start_calibration(&self, done: Completion<()>);
    fn add_calibration_point(&self, point: Point2D, done: Completion<()>);
    fn compute_calibration(&self, done: Completion<()>);
    fn stop_calibration(&self, done: Completion<()>);
    fn get_calibration(&self, done: Completion<CalibrationData>);

    fn subscribe_gaze(&self, sink: GazeSink) -> SubscriptionId;
    fn unsubscribe_gaze(&self, id: SubscriptionId);
    fn start_tracking(&self);
    fn stop_tracking(&self);

    /// Clock synchronization against this device's time base.
    fn clock_sync(&self) -> Arc<dyn ClockSync>;
}
