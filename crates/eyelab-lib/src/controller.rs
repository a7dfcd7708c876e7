//! Facade owning discovery, the active tracker, clock sync and the tracking
//! session. Experiment tasks talk to this type only.

use crate::bridge;
use crate::calibration::{CalibrationDecision, CalibrationSession, CalibrationSurface, KeySource};
use crate::clock::{Clock, SyncAdapter};
use crate::config::SessionConfig;
use crate::device::{DeviceBrowser, DeviceConnector, DeviceDescriptor, ErrorCode, EyeTracker, Point2D};
use crate::discovery::DeviceDiscovery;
use crate::error::{Result, TrackerError};
use crate::tracking::{EventValue, FlushReport, GazePosition, PupilReading, TrackingSession};
use log::{error, info, warn};
use std::io::Write;
use std::sync::Arc;

pub struct TrackerController {
    config: SessionConfig,
    discovery: DeviceDiscovery,
    connector: Arc<dyn DeviceConnector>,
    sync: SyncAdapter,
    tracker: Option<Arc<dyn EyeTracker>>,
    active_id: Option<String>,
    tracking: TrackingSession,
}

impl TrackerController {
    /// Build the controller and start browsing for devices right away.
    pub fn new(
        browser: Arc<dyn DeviceBrowser>,
        connector: Arc<dyn DeviceConnector>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        let mut discovery = DeviceDiscovery::new(browser, config.poll_interval());
        discovery.start_browsing();
        let sync = SyncAdapter::new(clock);
        let tracking = TrackingSession::new(sync.clone());
        Self {
            config,
            discovery,
            connector,
            sync,
            tracker: None,
            active_id: None,
            tracking,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.discovery.devices()
    }

    pub fn wait_for_device(&self) -> Result<Vec<DeviceDescriptor>> {
        self.discovery.wait_for_device(self.config.discovery_timeout())
    }

    pub fn active_device(&self) -> Option<&str> {
        self.active_id.as_deref()
    }

    pub fn is_synchronized(&self) -> bool {
        self.sync.is_synchronized()
    }

    /// Connect to a discovered device and synchronize clocks with it.
    pub fn activate(&mut self, product_id: &str) -> Result<()> {
        if self.tracking.is_running() {
            return Err(TrackerError::SessionBusy);
        }
        let descriptor = self
            .discovery
            .get(product_id)
            .ok_or_else(|| TrackerError::UnknownDevice(product_id.to_string()))?;
        info!("Connecting to: {}", descriptor);
        let (done, pending) = bridge::request("connect");
        self.connector.connect(&descriptor, done);
        let tracker = match pending.wait(self.config.request_timeout())? {
            Ok(tracker) => tracker,
            Err(ErrorCode::UNIT_TOO_OLD) => {
                error!("Eye tracker {} is too old", product_id);
                return Err(TrackerError::DeviceTooOld(product_id.to_string()));
            }
            Err(code) => {
                error!("Could not connect to eye tracker {} ({})", product_id, code);
                return Err(TrackerError::ConnectFailed {
                    id: product_id.to_string(),
                    code,
                });
            }
        };
        self.sync.establish(tracker.clock_sync());
        self.tracker = Some(tracker);
        self.active_id = Some(product_id.to_string());
        info!("Eye tracker {} activated", product_id);
        Ok(())
    }

    fn tracker(&self) -> Result<Arc<dyn EyeTracker>> {
        self.tracker.clone().ok_or(TrackerError::NotActivated)
    }

    pub fn do_calibration(
        &mut self,
        points: &[Point2D],
        surface: &mut dyn CalibrationSurface,
        keys: &mut dyn KeySource,
    ) -> Result<CalibrationDecision> {
        if self.tracking.is_running() {
            return Err(TrackerError::SessionBusy);
        }
        let tracker = self.tracker()?;
        let mut session = CalibrationSession::new(tracker.as_ref(), &self.config);
        let decision = session.run(points, surface, keys)?;
        info!("Calibration finished: {}", decision.as_str());
        Ok(decision)
    }

    pub fn configure_channels<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tracking.configure_channels(names);
    }

    pub fn start_tracking(&mut self) -> Result<()> {
        let tracker = self.tracker()?;
        self.tracking.start(tracker)
    }

    pub fn stop_tracking(&mut self) -> Result<FlushReport> {
        self.tracking.stop()
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.is_running()
    }

    pub fn record_event(&mut self, name: &str) -> Result<()> {
        self.tracking.record_event(name)
    }

    pub fn set_param(&mut self, name: &str, value: impl Into<EventValue>) -> Result<()> {
        self.tracking.set_param(name, value)
    }

    pub fn append_param(&mut self, name: &str, value: impl Into<EventValue>) -> Result<()> {
        self.tracking.append_param(name, value)
    }

    pub fn set_vector<I, V>(&mut self, name: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<EventValue>,
    {
        self.tracking.set_vector(name, values)
    }

    pub fn set_data_file(&mut self, file: Box<dyn Write + Send>) {
        self.tracking.set_data_file(file);
    }

    pub fn close_data_file(&mut self) -> Result<FlushReport> {
        self.tracking.close_data_file()
    }

    pub fn sample_count(&self) -> usize {
        self.tracking.sample_count()
    }

    pub fn current_gaze_position(&self) -> Option<GazePosition> {
        self.tracking.current_gaze_position()
    }

    pub fn current_pupil_and_validity(&self) -> Option<PupilReading> {
        self.tracking.current_pupil_and_validity()
    }

    /// Stop any running session, stop browsing and drop the device.
    pub fn destroy(&mut self) {
        if self.tracking.is_running() {
            if let Err(err) = self.tracking.stop() {
                warn!("stopping tracking on shutdown failed: {}", err);
            }
        }
        self.discovery.stop_browsing();
        self.sync.reset();
        if self.tracker.take().is_some() {
            info!("Eye tracker released");
        }
        self.active_id = None;
    }
}

impl Drop for TrackerController {
    fn drop(&mut self) {
        self.destroy();
    }
}
