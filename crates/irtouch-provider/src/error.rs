use irtouch_core::{CalibrationIoError, WarpError};

/// The sensor could not be opened or configured.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("no sensor device found")]
    DeviceNotFound,
    #[error("could not open sensor: {0}")]
    Open(String),
    #[error("could not configure sensor: {0}")]
    Configure(String),
}

/// A sensor report the coordinator cannot interpret.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedReport {
    #[error("report carries {got} blob slots, sensor supports {max}")]
    TooManyBlobs { got: usize, max: usize },
    #[error("blob slot {slot} at ({x}, {y}) is outside the sensor area")]
    OutOfRange { slot: usize, x: i32, y: i32 },
}

/// Errors raised when changing the calibration.
#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error(transparent)]
    Warp(#[from] WarpError),
    #[error("invalid screen size {width}x{height}")]
    InvalidScreenSize { width: f64, height: f64 },
    #[error("calibration incomplete: {collected} of 4 points collected")]
    Incomplete { collected: usize },
    #[error(transparent)]
    Io(#[from] CalibrationIoError),
}
