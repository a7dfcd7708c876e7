//! Multi-point calibration against a connected tracker.
//!
//! A run walks `Idle → Starting → AwaitingUserReady → PresentingPoint(i)… →
//! Computing → FetchingResult → ResultReady` and ends in one of
//! `Accepted`, `Retry` or `Aborted`. Each device step is a request whose
//! completion the controlling thread waits on through [`crate::bridge`].

pub mod result;
pub mod surface;

pub use result::{
    accuracy_figure, CalibrationOutcome, CalibrationResult, ComputeOutcome, EyePair,
};
pub use surface::{CalibrationSurface, HeadlessSurface, Key, KeySource, ScriptedKeys};

use crate::bridge;
use crate::config::SessionConfig;
use crate::device::{EyeTracker, Point2D};
use crate::error::{Result, TrackerError};
use log::{error, info, warn};
use serde::Serialize;
use std::time::Instant;

pub const PROMPT_READY: &str = "Press space bar when ready to calibrate.";
pub const PROMPT_FOCUS: &str = "Focus your eyes on the center of the circles that appear.";

const READY_OUTER_RADIUS: f64 = 64.0;
const INNER_RADIUS: f64 = 2.0;
const SHRINK_RATE: f64 = 40.0;
const MIN_OUTER_RADIUS: f64 = 4.0;
const PROMPT_SPACING: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationState {
    Idle,
    Starting,
    AwaitingUserReady,
    PresentingPoint(usize),
    Computing,
    FetchingResult,
    ResultReady,
    Accepted,
    Retry,
    Aborted,
}

/// The operator's verdict on a calibration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationDecision {
    Accept,
    Retry,
    Abort,
}

impl CalibrationDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Retry => "retry",
            Self::Abort => "abort",
        }
    }
}

pub struct CalibrationSession<'a> {
    tracker: &'a dyn EyeTracker,
    config: &'a SessionConfig,
    state: CalibrationState,
}

impl<'a> CalibrationSession<'a> {
    pub fn new(tracker: &'a dyn EyeTracker, config: &'a SessionConfig) -> Self {
        Self {
            tracker,
            config,
            state: CalibrationState::Idle,
        }
    }

    pub fn state(&self) -> CalibrationState {
        self.state
    }

    /// Run a full calibration and return the operator's decision.
    pub fn run(
        &mut self,
        points: &[Point2D],
        surface: &mut dyn CalibrationSurface,
        keys: &mut dyn KeySource,
    ) -> Result<CalibrationDecision> {
        self.start()?;
        self.wait_for_ready(surface, keys)?;
        self.present_points(points, surface, keys)?;
        let compute = self.compute()?;
        let result = self.fetch_result()?;
        let outcome = CalibrationOutcome::resolve(compute, result, surface.size());
        Ok(self.decide(&outcome, surface, keys))
    }

    pub fn start(&mut self) -> Result<()> {
        self.state = CalibrationState::Starting;
        info!("StartCalibration");
        let (done, pending) = bridge::request("start calibration");
        self.tracker.start_calibration(done);
        match pending.wait(self.config.request_timeout()) {
            Ok(Ok(())) => {
                self.state = CalibrationState::AwaitingUserReady;
                Ok(())
            }
            Ok(Err(code)) => {
                error!("Could not start calibration because of error. ({})", code);
                self.state = CalibrationState::Idle;
                Err(TrackerError::CalibrationStart(code))
            }
            Err(err) => {
                // the device may have started without answering
                self.abandon();
                Err(err)
            }
        }
    }

    /// Leave calibration mode without waiting for the device and go idle.
    /// Used on every failure once a start request has been sent.
    fn abandon(&mut self) {
        warn!("Abandoning calibration in state {:?}", self.state);
        self.tracker.stop_calibration(Box::new(|_| {}));
        self.state = CalibrationState::Idle;
    }

    /// Hold the ready prompt on screen until the operator presses space.
    pub fn wait_for_ready(
        &mut self,
        surface: &mut dyn CalibrationSurface,
        keys: &mut dyn KeySource,
    ) -> Result<()> {
        let (_, height) = surface.size();
        let prompt_y = -height / 4.0;
        loop {
            surface.draw_target((0.0, 0.0), READY_OUTER_RADIUS, INNER_RADIUS);
            surface.draw_text(PROMPT_READY, (0.0, prompt_y));
            surface.draw_text(PROMPT_FOCUS, (0.0, prompt_y + PROMPT_SPACING));
            surface.flip();
            let pressed = keys.poll_keys();
            if pressed.contains(&Key::Space) {
                return Ok(());
            }
            if pressed.is_empty() && keys.is_closed() {
                self.abandon();
                return Err(TrackerError::InputClosed);
            }
            std::thread::sleep(self.config.poll_interval());
        }
    }

    /// Show each target in the given order and add it to the calibration.
    pub fn present_points(
        &mut self,
        points: &[Point2D],
        surface: &mut dyn CalibrationSurface,
        keys: &mut dyn KeySource,
    ) -> Result<()> {
        let (width, height) = surface.size();
        let duration = self.config.point_duration().as_secs_f64();
        let poll = self.config.poll_interval();
        for (index, point) in points.iter().enumerate() {
            self.state = CalibrationState::PresentingPoint(index);
            let center = ((point.x - 0.5) * width, (0.5 - point.y) * height);

            let shown = Instant::now();
            loop {
                let t = shown.elapsed().as_secs_f64();
                if t >= duration {
                    break;
                }
                keys.discard();
                surface.draw_target(
                    center,
                    SHRINK_RATE * (duration - t) + MIN_OUTER_RADIUS,
                    INNER_RADIUS,
                );
                surface.flip();
                std::thread::sleep(poll);
            }

            let (done, pending) = bridge::request("add calibration point");
            self.tracker.add_calibration_point(*point, done);
            let status = pending.wait_while(self.config.request_timeout(), poll, || {
                keys.discard();
                surface.draw_target(center, MIN_OUTER_RADIUS, INNER_RADIUS);
                surface.flip();
            });
            match status {
                Ok(Ok(())) => {}
                Ok(Err(code)) => {
                    error!(
                        "Add Calibration Point failed because of error. ({})",
                        code
                    );
                    self.abandon();
                    return Err(TrackerError::AddPoint { index, code });
                }
                Err(err) => {
                    self.abandon();
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    /// Ask the device to compute the calibration, then stop calibrating.
    pub fn compute(&mut self) -> Result<ComputeOutcome> {
        self.state = CalibrationState::Computing;
        let (done, pending) = bridge::request("compute calibration");
        self.tracker.compute_calibration(done);
        let status = match pending.wait(self.config.request_timeout()) {
            Ok(status) => status,
            Err(err) => {
                self.abandon();
                return Err(err);
            }
        };
        let outcome = ComputeOutcome::from_status(status);
        match outcome {
            ComputeOutcome::Success => {}
            ComputeOutcome::InsufficientData => {
                warn!("CalibCompute failed because not enough data was collected")
            }
            ComputeOutcome::ServerError(code) => {
                warn!("CalibCompute failed because of a server error: {}", code)
            }
        }
        self.tracker.stop_calibration(Box::new(|_| {}));
        Ok(outcome)
    }

    pub fn fetch_result(&mut self) -> Result<Option<CalibrationResult>> {
        self.state = CalibrationState::FetchingResult;
        let (done, pending) = bridge::request("get calibration");
        self.tracker.get_calibration(done);
        let status = match pending.wait(self.config.request_timeout()) {
            Ok(status) => status,
            Err(err) => {
                self.abandon();
                return Err(err);
            }
        };
        let result = match status {
            Ok(data) => {
                info!("Calibration result received");
                Some(CalibrationResult::from_data(&data))
            }
            Err(code) => {
                warn!("Calibration result unavailable: {}", code);
                None
            }
        };
        self.state = CalibrationState::ResultReady;
        Ok(result)
    }

    /// Show the outcome and listen for accept, retry or abort. Accept is
    /// ignored unless the outcome carries a plotted result; a closed key
    /// source aborts.
    pub fn decide(
        &mut self,
        outcome: &CalibrationOutcome,
        surface: &mut dyn CalibrationSurface,
        keys: &mut dyn KeySource,
    ) -> CalibrationDecision {
        self.state = CalibrationState::ResultReady;
        let (_, height) = surface.size();
        let decision = loop {
            if let Some(figure) = outcome.figure() {
                surface.draw_figure(figure);
            }
            surface.draw_text(outcome.message(), (0.0, -height / 4.0));
            surface.flip();
            let pressed = keys.poll_keys();
            let chosen = pressed.iter().find_map(|key| match key {
                Key::Char('a') if outcome.can_accept() => Some(CalibrationDecision::Accept),
                Key::Char('r') => Some(CalibrationDecision::Retry),
                Key::Escape => Some(CalibrationDecision::Abort),
                _ => None,
            });
            if let Some(decision) = chosen {
                break decision;
            }
            if pressed.is_empty() && keys.is_closed() {
                break CalibrationDecision::Abort;
            }
            std::thread::sleep(self.config.poll_interval());
        };
        self.state = match decision {
            CalibrationDecision::Accept => CalibrationState::Accepted,
            CalibrationDecision::Retry => CalibrationState::Retry,
            CalibrationDecision::Abort => CalibrationState::Aborted,
        };
        info!("Calibration {}", decision.as_str());
        decision
    }
}

#[cfg(test)]
mod tests {
    use super::result::{MSG_ACCEPT_PROMPT, MSG_INSUFFICIENT_DATA, MSG_NO_TRUE_CALIBRATION_DATA};
    use super::surface::DrawOp;
    use super::*;
    use crate::device::{ErrorCode, EyeTracker};
    use crate::sim::{SimConfig, SimRequest, SimulatedTracker, Stall};

    fn fast_config() -> SessionConfig {
        SessionConfig {
            request_timeout_ms: 2_000,
            poll_interval_ms: 1,
            point_duration_s: 0.005,
            ..SessionConfig::default()
        }
    }

    fn stalled(request: SimRequest, stall: Stall) -> SimulatedTracker {
        SimulatedTracker::new(SimConfig {
            stall: Some((request, stall)),
            ..SimConfig::default()
        })
    }

    fn short_timeout() -> SessionConfig {
        SessionConfig {
            request_timeout_ms: 50,
            ..fast_config()
        }
    }

    fn three_points() -> Vec<Point2D> {
        vec![
            Point2D::new(0.1, 0.1),
            Point2D::new(0.5, 0.5),
            Point2D::new(0.9, 0.9),
        ]
    }

    #[test]
    fn accepts_with_one_valid_eye_per_point() {
        let tracker = SimulatedTracker::new(SimConfig {
            right_eye_status: 0,
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut surface = HeadlessSurface::new(1280.0, 1024.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let mut session = CalibrationSession::new(&tracker, &config);
        let decision = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap();
        assert_eq!(decision, CalibrationDecision::Accept);
        assert_eq!(session.state(), CalibrationState::Accepted);
        assert!(surface.texts().iter().any(|t| t == MSG_ACCEPT_PROMPT));
        assert!(surface.texts().iter().any(|t| t == PROMPT_READY));

        let figure = surface.last_figure().expect("accuracy plot");
        let lines: Vec<_> = figure.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines.iter().all(|l| l.name == "left"));
        assert_eq!(figure.circles().count(), 3);
    }

    #[test]
    fn points_are_added_in_caller_order() {
        let tracker = SimulatedTracker::new(SimConfig::default());
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let points = vec![
            Point2D::new(0.9, 0.9),
            Point2D::new(0.1, 0.1),
            Point2D::new(0.9, 0.9),
        ];
        CalibrationSession::new(&tracker, &config)
            .run(&points, &mut surface, &mut keys)
            .unwrap();
        assert_eq!(tracker.added_points(), points);
    }

    #[test]
    fn empty_result_blocks_accept() {
        let tracker = SimulatedTracker::new(SimConfig {
            empty_plot: true,
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        // the "a" is ignored, "r" is honoured
        let mut keys = ScriptedKeys::parse("space,a,r");
        let mut session = CalibrationSession::new(&tracker, &config);
        let decision = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap();
        assert_eq!(decision, CalibrationDecision::Retry);
        assert!(surface
            .texts()
            .iter()
            .any(|t| t == MSG_NO_TRUE_CALIBRATION_DATA));
        assert!(surface.last_figure().is_none());
    }

    #[test]
    fn insufficient_data_is_absorbed_into_outcome() {
        let tracker = SimulatedTracker::new(SimConfig {
            compute_error: Some(ErrorCode::INSUFFICIENT_DATA),
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        session.start().unwrap();
        let outcome = session.compute().unwrap();
        assert_eq!(outcome, ComputeOutcome::InsufficientData);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn start_error_is_reported() {
        let tracker = SimulatedTracker::new(SimConfig {
            start_error: Some(ErrorCode(0x2000_0101)),
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session.start().unwrap_err();
        assert!(matches!(err, TrackerError::CalibrationStart(ErrorCode(0x2000_0101))));
        assert_eq!(session.state(), CalibrationState::Idle);
    }

    #[test]
    fn add_point_error_stops_presentation() {
        let tracker = SimulatedTracker::new(SimConfig {
            add_point_error: Some(ErrorCode(0x2000_0201)),
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space");
        let err = CalibrationSession::new(&tracker, &config)
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::AddPoint { index: 0, .. }));
        assert!(!tracker.is_calibrating());
        assert!(tracker.added_points().is_empty());
    }

    #[test]
    fn closed_input_aborts_decision() {
        let tracker = SimulatedTracker::new(SimConfig::default());
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space");
        let decision = CalibrationSession::new(&tracker, &config)
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap();
        assert_eq!(decision, CalibrationDecision::Abort);
    }

    #[test]
    fn missing_result_reports_no_data() {
        let tracker = SimulatedTracker::new(SimConfig {
            fetch_error: Some(ErrorCode(0x2000_0601)),
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        tracker.start_calibration(Box::new(|_| {}));
        assert!(session.fetch_result().unwrap().is_none());
        assert_eq!(session.state(), CalibrationState::ResultReady);
    }

    #[test]
    fn ready_prompt_is_drawn_before_space_is_read() {
        let tracker = SimulatedTracker::new(SimConfig::default());
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space");
        let mut session = CalibrationSession::new(&tracker, &config);
        session.start().unwrap();
        session.wait_for_ready(&mut surface, &mut keys).unwrap();
        assert_eq!(surface.frames(), 1);
        assert_eq!(
            surface.last_frame(),
            [
                DrawOp::Target {
                    center: (0.0, 0.0),
                    outer_radius: READY_OUTER_RADIUS,
                    inner_radius: INNER_RADIUS,
                },
                DrawOp::Text {
                    text: PROMPT_READY.to_string(),
                    position: (0.0, -150.0),
                },
                DrawOp::Text {
                    text: PROMPT_FOCUS.to_string(),
                    position: (0.0, -50.0),
                },
            ]
        );
    }

    #[test]
    fn closed_input_at_ready_gate_stops_calibration() {
        let tracker = SimulatedTracker::new(SimConfig::default());
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("");
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::InputClosed));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn unanswered_start_times_out_and_stops() {
        let tracker = stalled(SimRequest::StartCalibration, Stall::Silent);
        let config = short_timeout();
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session.start().unwrap_err();
        assert!(matches!(err, TrackerError::Timeout("start calibration")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn dropped_start_is_abandoned() {
        let tracker = stalled(SimRequest::StartCalibration, Stall::Dropped);
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session.start().unwrap_err();
        assert!(matches!(err, TrackerError::Abandoned("start calibration")));
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn unanswered_add_point_times_out_and_stops() {
        let tracker = stalled(SimRequest::AddPoint, Stall::Silent);
        let config = short_timeout();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Timeout("add calibration point")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
        // the shrunken target stays up while waiting
        assert!(matches!(
            surface.last_frame(),
            [DrawOp::Target { outer_radius, .. }] if *outer_radius == MIN_OUTER_RADIUS
        ));
    }

    #[test]
    fn dropped_add_point_is_abandoned() {
        let tracker = stalled(SimRequest::AddPoint, Stall::Dropped);
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Abandoned("add calibration point")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn unanswered_compute_times_out_and_stops() {
        let tracker = stalled(SimRequest::Compute, Stall::Silent);
        let config = short_timeout();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Timeout("compute calibration")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
        assert_eq!(tracker.added_points().len(), 3);
    }

    #[test]
    fn dropped_compute_is_abandoned() {
        let tracker = stalled(SimRequest::Compute, Stall::Dropped);
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        session.start().unwrap();
        let err = session.compute().unwrap_err();
        assert!(matches!(err, TrackerError::Abandoned("compute calibration")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn unanswered_fetch_times_out() {
        let tracker = stalled(SimRequest::FetchResult, Stall::Silent);
        let config = short_timeout();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        let mut keys = ScriptedKeys::parse("space,a");
        let mut session = CalibrationSession::new(&tracker, &config);
        let err = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap_err();
        assert!(matches!(err, TrackerError::Timeout("get calibration")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn dropped_fetch_is_abandoned() {
        let tracker = stalled(SimRequest::FetchResult, Stall::Dropped);
        let config = fast_config();
        let mut session = CalibrationSession::new(&tracker, &config);
        session.start().unwrap();
        session.compute().unwrap();
        let err = session.fetch_result().unwrap_err();
        assert!(matches!(err, TrackerError::Abandoned("get calibration")));
        assert_eq!(session.state(), CalibrationState::Idle);
        assert!(!tracker.is_calibrating());
    }

    #[test]
    fn server_error_offers_only_retry_or_abort() {
        let tracker = SimulatedTracker::new(SimConfig {
            compute_error: Some(ErrorCode(0x2000_0503)),
            ..SimConfig::default()
        });
        let config = fast_config();
        let mut surface = HeadlessSurface::new(800.0, 600.0);
        // the "a" is ignored, "r" is honoured
        let mut keys = ScriptedKeys::parse("space,a,r");
        let mut session = CalibrationSession::new(&tracker, &config);
        let decision = session
            .run(&three_points(), &mut surface, &mut keys)
            .unwrap();
        assert_eq!(decision, CalibrationDecision::Retry);
        assert_eq!(session.state(), CalibrationState::Retry);
        assert!(surface.texts().iter().any(|t| t == MSG_INSUFFICIENT_DATA));
        assert!(!surface.texts().iter().any(|t| t == MSG_ACCEPT_PROMPT));
        assert!(surface.last_figure().is_none());
        assert!(!tracker.is_calibrating());
        assert_eq!(keys.remaining(), 0);
    }
}
