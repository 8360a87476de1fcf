//! Seam between the coordinator and the sensor driver.

use crate::{ConnectionError, MalformedReport};
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Blob slots reported per sensor sample.
pub const MAX_BLOBS: usize = 4;

/// Report layout requested from the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// IR blobs plus accelerometer.
    IrAccel,
    /// IR blobs, accelerometer and the attached extension.
    IrExtensionAccel,
}

/// A connection to the physical sensor.
///
/// The driver delivers samples on its own thread by calling
/// [`Provider::handle_report`](crate::Provider::handle_report). Implementations
/// of [`HardwareSession::disconnect`] must not wait for an in-flight
/// callback: the coordinator calls it while holding its lock.
pub trait HardwareSession: Send {
    fn connect(&mut self) -> Result<(), ConnectionError>;

    fn set_report_mode(&mut self, mode: ReportMode) -> Result<(), ConnectionError>;

    /// Switch the four player indicator LEDs.
    fn set_leds(&mut self, leds: [bool; 4]) -> Result<(), ConnectionError>;

    /// Close the connection. Must be safe to call when not connected.
    fn disconnect(&mut self);
}

/// One blob slot of a sensor report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrBlob {
    pub found: bool,
    pub x: i32,
    pub y: i32,
    /// Blob extent, only present in extended report formats.
    #[serde(default)]
    pub size: Option<u8>,
}

impl IrBlob {
    pub fn at(x: i32, y: i32) -> Self {
        Self {
            found: true,
            x,
            y,
            size: None,
        }
    }
}

/// One sensor sample.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorReport {
    pub blobs: Vec<IrBlob>,
    /// Raw battery reading.
    #[serde(default)]
    pub battery: u8,
}

impl SensorReport {
    pub fn new(blobs: Vec<IrBlob>, battery: u8) -> Self {
        Self { blobs, battery }
    }
}

/// A found blob pulled out of a report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct RawBlob {
    pub slot: usize,
    pub position: Point2<f64>,
    pub size: Option<f64>,
}

/// Pull the found blobs out of a report, rejecting the whole report when a
/// slot is out of range.
pub(crate) fn extract_blobs(
    report: &SensorReport,
    sensor_size: [i32; 2],
) -> Result<Vec<RawBlob>, MalformedReport> {
    if report.blobs.len() > MAX_BLOBS {
        return Err(MalformedReport::TooManyBlobs {
            got: report.blobs.len(),
            max: MAX_BLOBS,
        });
    }

    let [w, h] = sensor_size;
    let mut out = Vec::with_capacity(report.blobs.len());
    for (slot, blob) in report.blobs.iter().enumerate() {
        if !blob.found {
            continue;
        }
        if blob.x < 0 || blob.y < 0 || blob.x >= w || blob.y >= h {
            return Err(MalformedReport::OutOfRange {
                slot,
                x: blob.x,
                y: blob.y,
            });
        }
        out.push(RawBlob {
            slot,
            position: Point2::new(blob.x as f64, blob.y as f64),
            size: blob.size.map(f64::from),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_slots_without_blobs() {
        let report = SensorReport::new(
            vec![
                IrBlob::default(),
                IrBlob::at(10, 20),
                IrBlob {
                    size: Some(3),
                    ..IrBlob::at(1000, 700)
                },
            ],
            100,
        );
        let blobs = extract_blobs(&report, [1024, 768]).unwrap();
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[0].slot, 1);
        assert_eq!(blobs[0].position, Point2::new(10.0, 20.0));
        assert_eq!(blobs[1].size, Some(3.0));
    }

    #[test]
    fn rejects_out_of_range_and_oversized_reports() {
        let report = SensorReport::new(vec![IrBlob::at(1024, 5)], 0);
        assert_eq!(
            extract_blobs(&report, [1024, 768]),
            Err(MalformedReport::OutOfRange {
                slot: 0,
                x: 1024,
                y: 5
            })
        );

        let report = SensorReport::new(vec![IrBlob::at(1, 1); MAX_BLOBS + 1], 0);
        assert!(matches!(
            extract_blobs(&report, [1024, 768]),
            Err(MalformedReport::TooManyBlobs { got: 5, max: 4 })
        ));
    }

    #[test]
    fn report_deserializes_with_defaults() {
        let report: SensorReport =
            serde_json::from_str(r#"{"blobs":[{"found":true,"x":3,"y":4}]}"#).unwrap();
        assert_eq!(report.battery, 0);
        assert_eq!(report.blobs[0], IrBlob::at(3, 4));
    }
}
