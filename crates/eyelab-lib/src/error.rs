use crate::device::ErrorCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TrackerError>;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("no eye tracker was found")]
    DeviceNotFound,
    #[error("unknown eye tracker '{0}'")]
    UnknownDevice(String),
    #[error("eye tracker '{0}' is too old; a unit supporting protocol version 1.0 is required")]
    DeviceTooOld(String),
    #[error("could not connect to '{id}' ({code})")]
    ConnectFailed { id: String, code: ErrorCode },
    #[error("no eye tracker has been activated")]
    NotActivated,
    #[error("clock is not synchronized with an active eye tracker")]
    NotSynchronized,
    #[error("could not start calibration ({0})")]
    CalibrationStart(ErrorCode),
    #[error("adding calibration point {index} failed ({code})")]
    AddPoint { index: usize, code: ErrorCode },
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("device dropped the {0} request without answering")]
    Abandoned(&'static str),
    #[error("key input closed while waiting for the operator")]
    InputClosed,
    #[error("event channel '{0}' was not declared")]
    UnknownChannel(String),
    #[error("another calibration or tracking session is active")]
    SessionBusy,
    #[error("tracking is not running")]
    NotTracking,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
