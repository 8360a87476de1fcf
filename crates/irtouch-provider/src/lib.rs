//! Acquisition coordinator for IR touch sensors.
//!
//! Glue between a sensor driver and touch consumers:
//!
//! - [`HardwareSession`] is the driver seam (connect, report mode, LEDs).
//! - [`Provider`] turns each [`SensorReport`] into a calibrated, tracked
//!   [`Frame`] and sends it over a channel.
//! - [`CalibrationSession`] collects the four-point calibration.
//! - [`BundleSequencer`] shapes frames for a cursor transport.
//!
//! ```
//! use irtouch_provider::{
//!     ConnectionError, HardwareSession, IrBlob, Provider, ProviderParams, ReportMode,
//!     SensorReport,
//! };
//!
//! struct Replay;
//!
//! impl HardwareSession for Replay {
//!     fn connect(&mut self) -> Result<(), ConnectionError> { Ok(()) }
//!     fn set_report_mode(&mut self, _: ReportMode) -> Result<(), ConnectionError> { Ok(()) }
//!     fn set_leds(&mut self, _: [bool; 4]) -> Result<(), ConnectionError> { Ok(()) }
//!     fn disconnect(&mut self) {}
//! }
//!
//! let (provider, events) = Provider::new(Replay, ProviderParams::default());
//! provider.start()?;
//! provider.handle_report(&SensorReport::new(vec![IrBlob::at(512, 384)], 180));
//!
//! let frame = events.frames.recv().unwrap();
//! assert_eq!(frame.sequence(), 0);
//! assert_eq!(frame.contacts().len(), 1);
//! assert_eq!(events.battery.recv().unwrap(), 180);
//! provider.stop();
//! # Ok::<(), ConnectionError>(())
//! ```

mod bundle;
mod calibration_session;
mod contact;
mod error;
mod params;
mod provider;
mod session;

pub use bundle::{BundleSequencer, ContactBundle, ContactSet};
pub use calibration_session::{CalibrationProgress, CalibrationSession, CalibrationTargets};
pub use contact::{Contact, ContactKind, Frame};
pub use error::{CalibrationError, ConnectionError, MalformedReport};
pub use params::ProviderParams;
pub use provider::{Diagnostic, Provider, ProviderEvents};
pub use session::{HardwareSession, IrBlob, ReportMode, SensorReport, MAX_BLOBS};
