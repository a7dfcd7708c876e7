//! In-process simulated eye tracker.
//!
//! Every callback fires on a spawned worker thread after `callback_delay`,
//! and gaze samples stream from a dedicated thread, so the simulated device
//! exercises the same cross-thread paths as hardware.

use crate::bridge::lock;
use crate::clock::{ClockSync, OffsetSync};
use crate::device::{
    BrowseEvent, BrowseListener, CalibrationData, CalibrationPlotItem, CalibrationSample,
    Completion, DeviceBrowser, DeviceConnector, DeviceDescriptor, ErrorCode, EyeGaze, EyeTracker,
    GazeSample, GazeSink, Point2D, Point3D, SubscriptionId, CALIBRATION_STATUS_VALID,
};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Calibration requests whose answer can be withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimRequest {
    StartCalibration,
    AddPoint,
    Compute,
    FetchResult,
}

/// How a withheld request misbehaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stall {
    /// The completion is kept but never invoked.
    Silent,
    /// The completion is dropped without being invoked.
    Dropped,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub callback_delay: Duration,
    pub connect_error: Option<ErrorCode>,
    pub start_error: Option<ErrorCode>,
    pub add_point_error: Option<ErrorCode>,
    pub compute_error: Option<ErrorCode>,
    pub fetch_error: Option<ErrorCode>,
    /// The device still acts on this request but never answers it.
    pub stall: Option<(SimRequest, Stall)>,
    /// Report a calibration without any plot data.
    pub empty_plot: bool,
    /// Calibration status reported for the right eye at every point.
    pub right_eye_status: i32,
    pub sample_interval: Duration,
    /// Left-eye validity codes, cycled per sample.
    pub validity_pattern: Vec<u8>,
    /// Device clock minus local clock, in microseconds.
    pub clock_offset: i64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            callback_delay: Duration::from_millis(1),
            connect_error: None,
            start_error: None,
            add_point_error: None,
            compute_error: None,
            fetch_error: None,
            stall: None,
            empty_plot: false,
            right_eye_status: CALIBRATION_STATUS_VALID,
            sample_interval: Duration::from_millis(8),
            validity_pattern: vec![0],
            clock_offset: 1_000_000,
            seed: 42,
        }
    }
}

pub fn default_devices() -> Vec<DeviceDescriptor> {
    vec![DeviceDescriptor {
        product_id: "TX120-203-81900130".into(),
        model: "Tobii X120".into(),
        generation: "TX".into(),
        firmware_version: "2.0.0".into(),
        address: "tx120-203-81900130.local".into(),
    }]
}

fn respond<T: Send + 'static>(delay: Duration, done: Completion<T>, result: Result<T, ErrorCode>) {
    thread::spawn(move || {
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        done(result);
    });
}

/// Browser announcing a fixed device list shortly after it starts.
pub struct SimulatedBrowser {
    devices: Vec<DeviceDescriptor>,
    delay: Duration,
    listener: Mutex<Option<BrowseListener>>,
}

impl SimulatedBrowser {
    pub fn new(devices: Vec<DeviceDescriptor>, delay: Duration) -> Self {
        Self {
            devices,
            delay,
            listener: Mutex::new(None),
        }
    }

    /// Deliver an arbitrary event from a worker thread.
    pub fn emit(&self, event: BrowseEvent) {
        if let Some(listener) = lock(&self.listener).clone() {
            thread::spawn(move || listener(event));
        }
    }
}

impl DeviceBrowser for SimulatedBrowser {
    fn start(&self, listener: BrowseListener) {
        *lock(&self.listener) = Some(Arc::clone(&listener));
        let devices = self.devices.clone();
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            for descriptor in devices {
                listener(BrowseEvent::Found(descriptor));
            }
        });
    }

    fn stop(&self) {
        lock(&self.listener).take();
    }
}

pub struct SimulatedConnector {
    config: SimConfig,
    last: Mutex<Option<Arc<SimulatedTracker>>>,
}

impl SimulatedConnector {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            last: Mutex::new(None),
        }
    }

    /// The most recently connected tracker.
    pub fn tracker(&self) -> Option<Arc<SimulatedTracker>> {
        lock(&self.last).clone()
    }
}

impl DeviceConnector for SimulatedConnector {
    fn connect(&self, descriptor: &DeviceDescriptor, done: Completion<Arc<dyn EyeTracker>>) {
        let result = match self.config.connect_error {
            Some(code) => Err(code),
            None => {
                info!("Simulated eye tracker {} connected", descriptor.product_id);
                let tracker = Arc::new(SimulatedTracker::new(self.config.clone()));
                *lock(&self.last) = Some(Arc::clone(&tracker));
                Ok(tracker as Arc<dyn EyeTracker>)
            }
        };
        respond(self.config.callback_delay, done, result);
    }
}

struct StreamHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl StreamHandle {
    fn stop(mut self) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Default)]
struct Subscribers {
    sinks: BTreeMap<SubscriptionId, GazeSink>,
    next_id: u64,
}

#[derive(Default)]
struct CalibrationState {
    calibrating: bool,
    added: Vec<Point2D>,
}

pub struct SimulatedTracker {
    config: SimConfig,
    origin: Instant,
    calibration: Mutex<CalibrationState>,
    subscribers: Arc<Mutex<Subscribers>>,
    stream: Mutex<Option<StreamHandle>>,
    withheld: Mutex<Vec<Box<dyn Any + Send>>>,
}

impl SimulatedTracker {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            origin: Instant::now(),
            calibration: Mutex::new(CalibrationState::default()),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
            stream: Mutex::new(None),
            withheld: Mutex::new(Vec::new()),
        }
    }

    fn answer<T: Send + 'static>(
        &self,
        request: SimRequest,
        done: Completion<T>,
        result: Result<T, ErrorCode>,
    ) {
        match self.config.stall {
            Some((stalled, Stall::Silent)) if stalled == request => {
                debug!("Withholding answer to {:?}", request);
                lock(&self.withheld).push(Box::new(done));
            }
            Some((stalled, Stall::Dropped)) if stalled == request => {
                debug!("Dropping answer to {:?}", request);
                drop(done);
            }
            _ => respond(self.config.callback_delay, done, result),
        }
    }

    pub fn added_points(&self) -> Vec<Point2D> {
        lock(&self.calibration).added.clone()
    }

    pub fn is_calibrating(&self) -> bool {
        lock(&self.calibration).calibrating
    }

    pub fn is_tracking(&self) -> bool {
        lock(&self.stream).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).sinks.len()
    }

    fn plot_data(&self) -> CalibrationData {
        if self.config.empty_plot {
            return CalibrationData::default();
        }
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut jitter = |p: Point2D| {
            Point2D::new(
                p.x + rng.gen_range(-0.02..0.02),
                p.y + rng.gen_range(-0.02..0.02),
            )
        };
        let mut plot_data = Vec::new();
        for true_point in self.added_points() {
            plot_data.push(CalibrationPlotItem {
                true_point,
                left: CalibrationSample {
                    map_point: jitter(true_point),
                    status: CALIBRATION_STATUS_VALID,
                },
                right: CalibrationSample {
                    map_point: jitter(true_point),
                    status: self.config.right_eye_status,
                },
            });
        }
        CalibrationData { plot_data }
    }
}

impl EyeTracker for SimulatedTracker {
    fn start_calibration(&self, done: Completion<()>) {
        let result = match self.config.start_error {
            Some(code) => Err(code),
            None => {
                let mut state = lock(&self.calibration);
                state.calibrating = true;
                state.added.clear();
                Ok(())
            }
        };
        self.answer(SimRequest::StartCalibration, done, result);
    }

    fn add_calibration_point(&self, point: Point2D, done: Completion<()>) {
        let result = match self.config.add_point_error {
            Some(code) => Err(code),
            None => {
                lock(&self.calibration).added.push(point);
                Ok(())
            }
        };
        self.answer(SimRequest::AddPoint, done, result);
    }

    fn compute_calibration(&self, done: Completion<()>) {
        let result = self.config.compute_error.map_or(Ok(()), Err);
        self.answer(SimRequest::Compute, done, result);
    }

    fn stop_calibration(&self, done: Completion<()>) {
        lock(&self.calibration).calibrating = false;
        respond(self.config.callback_delay, done, Ok(()));
    }

    fn get_calibration(&self, done: Completion<CalibrationData>) {
        let result = match self.config.fetch_error {
            Some(code) => Err(code),
            None => Ok(self.plot_data()),
        };
        self.answer(SimRequest::FetchResult, done, result);
    }

    fn subscribe_gaze(&self, sink: GazeSink) -> SubscriptionId {
        let mut subscribers = lock(&self.subscribers);
        subscribers.next_id += 1;
        let id = SubscriptionId(subscribers.next_id);
        subscribers.sinks.insert(id, sink);
        id
    }

    fn unsubscribe_gaze(&self, id: SubscriptionId) {
        lock(&self.subscribers).sinks.remove(&id);
    }

    fn start_tracking(&self) {
        let mut stream = lock(&self.stream);
        if stream.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = bounded(1);
        let subscribers = Arc::clone(&self.subscribers);
        let config = self.config.clone();
        let origin = self.origin;
        let handle = thread::spawn(move || {
            let mut rng = StdRng::seed_from_u64(config.seed);
            let mut tick: usize = 0;
            loop {
                match stop_rx.recv_timeout(config.sample_interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    _ => break,
                }
                let timestamp = origin.elapsed().as_micros() as i64 + config.clock_offset;
                let sample = synth_sample(&config, &mut rng, timestamp, tick);
                tick += 1;
                let sinks: Vec<GazeSink> = lock(&subscribers).sinks.values().cloned().collect();
                for sink in sinks {
                    sink(sample);
                }
            }
            debug!("simulated gaze stream stopped after {} samples", tick);
        });
        *stream = Some(StreamHandle {
            stop_tx,
            handle: Some(handle),
        });
    }

    fn stop_tracking(&self) {
        let handle = lock(&self.stream).take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    fn clock_sync(&self) -> Arc<dyn ClockSync> {
        Arc::new(OffsetSync {
            offset: self.config.clock_offset,
        })
    }
}

impl Drop for SimulatedTracker {
    fn drop(&mut self) {
        self.stop_tracking();
    }
}

fn synth_sample(config: &SimConfig, rng: &mut StdRng, timestamp: i64, tick: usize) -> GazeSample {
    let left_validity = if config.validity_pattern.is_empty() {
        0
    } else {
        config.validity_pattern[tick % config.validity_pattern.len()]
    };
    let mut eye = |x_offset: f64, validity: u8| {
        let gaze = Point2D::new(
            0.5 + rng.gen_range(-0.05..0.05),
            0.5 + rng.gen_range(-0.05..0.05),
        );
        EyeGaze {
            eye_position_3d: Point3D::new(x_offset, 10.0, 650.0 + rng.gen_range(-5.0..5.0)),
            eye_position_3d_relative: Point3D::new(0.5 + x_offset / 600.0, 0.5, 0.5),
            gaze_point_3d: Point3D::new((gaze.x - 0.5) * 340.0, (0.5 - gaze.y) * 270.0, 0.0),
            gaze_point_2d: gaze,
            pupil: 3.0 + rng.gen_range(0.0..1.0),
            validity,
        }
    };
    let left = eye(-32.0, left_validity);
    let right = eye(32.0, 0);
    GazeSample {
        timestamp,
        left,
        right,
    }
}
