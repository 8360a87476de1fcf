//! Persistent calibration data.
//!
//! A calibration is the pair of quads captured by a calibration session plus
//! the screen size used to normalise contact positions. It is stored as
//! pretty JSON so that a session can be restored at the next reconnect
//! without asking the user to calibrate again.

use crate::{CalibrationRectangle, WarpError, Warper};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

#[derive(thiserror::Error, Debug)]
pub enum CalibrationIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Reference screen size used to normalise warped positions into `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: f64,
    pub height: f64,
}

impl Default for ScreenSize {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl ScreenSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Divide a position by the screen size.
    #[inline]
    pub fn normalize(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(p.x / self.width, p.y / self.height)
    }

    /// Both dimensions finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }
}

/// Result of a calibration session. Immutable once created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationData {
    source: CalibrationRectangle,
    destination: CalibrationRectangle,
    screen_size: ScreenSize,
    /// Creation time in milliseconds since the Unix epoch.
    created_unix_ms: u64,
}

impl CalibrationData {
    /// Capture a calibration, stamping it with the current wall-clock time.
    pub fn new(
        source: CalibrationRectangle,
        destination: CalibrationRectangle,
        screen_size: ScreenSize,
    ) -> Self {
        let created_unix_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::with_timestamp(source, destination, screen_size, created_unix_ms)
    }

    pub fn with_timestamp(
        source: CalibrationRectangle,
        destination: CalibrationRectangle,
        screen_size: ScreenSize,
        created_unix_ms: u64,
    ) -> Self {
        Self {
            source,
            destination,
            screen_size,
            created_unix_ms,
        }
    }

    #[inline]
    pub fn source(&self) -> &CalibrationRectangle {
        &self.source
    }

    #[inline]
    pub fn destination(&self) -> &CalibrationRectangle {
        &self.destination
    }

    #[inline]
    pub fn screen_size(&self) -> ScreenSize {
        self.screen_size
    }

    #[inline]
    pub fn created_unix_ms(&self) -> u64 {
        self.created_unix_ms
    }

    /// Build a warper for this calibration, failing on degenerate quads.
    pub fn warper(&self) -> Result<Warper, WarpError> {
        Warper::from_quads(self.source, self.destination)
    }

    /// Load calibration data from a JSON file.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, CalibrationIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write calibration data to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// File-backed calibration storage.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    path: PathBuf,
}

impl CalibrationStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist `data`, replacing any previous calibration.
    pub fn save(&self, data: &CalibrationData) -> Result<(), CalibrationIoError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        data.write_json(&self.path)?;
        log::info!("saved calibration to {}", self.path.display());
        Ok(())
    }

    /// Load the stored calibration. A missing file is `Ok(None)`.
    pub fn load(&self) -> Result<Option<CalibrationData>, CalibrationIoError> {
        if !self.path.exists() {
            log::debug!("no calibration at {}", self.path.display());
            return Ok(None);
        }
        CalibrationData::load_json(&self.path).map(Some)
    }
}
