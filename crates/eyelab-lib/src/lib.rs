//! Eye-tracker session management for experiment runners: discovery,
//! activation, calibration, clock sync and gaze recording.

pub mod bridge;
pub mod calibration;
pub mod clock;
pub mod config;
pub mod controller;
pub mod device;
pub mod discovery;
pub mod error;
pub mod plot;
pub mod sim;
pub mod tracking;

pub use config::SessionConfig;
pub use controller::TrackerController;
pub use error::{Result, TrackerError};
