use crate::device::Point2D;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and calibration parameters of a tracker session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// How long any single device request may take before giving up.
    pub request_timeout_ms: u64,
    /// How long to wait for discovery to report a device.
    pub discovery_timeout_ms: u64,
    /// Sleep between polls of flags, keys and the display.
    pub poll_interval_ms: u64,
    /// Seconds each calibration target shrinks before its point is added.
    pub point_duration_s: f64,
    /// Normalized calibration targets, in presentation order.
    pub calibration_points: Vec<[f64; 2]>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            discovery_timeout_ms: 30_000,
            poll_interval_ms: 10,
            point_duration_s: 1.5,
            calibration_points: vec![
                [0.1, 0.1],
                [0.9, 0.1],
                [0.5, 0.5],
                [0.1, 0.9],
                [0.9, 0.9],
            ],
        }
    }
}

impl SessionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_millis(self.discovery_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn point_duration(&self) -> Duration {
        Duration::from_secs_f64(self.point_duration_s.max(0.0))
    }

    pub fn points(&self) -> Vec<Point2D> {
        self.calibration_points
            .iter()
            .copied()
            .map(Point2D::from)
            .collect()
    }
}
