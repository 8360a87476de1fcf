//! High-level facade crate for the `irtouch-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry, tracking and acquisition crates
//! - [`ProviderConfig`], a JSON configuration that builds a ready provider
//! - a replay session that plays recorded sensor input through a provider
//! - the `irtouch` command-line tool (feature `cli`)
//!
//! ## Quickstart
//!
//! ```
//! use irtouch::provider::{IrBlob, SensorReport};
//! use irtouch::{replay, ProviderConfig, ReplayScript};
//!
//! # fn main() -> Result<(), irtouch::ReplayError> {
//! let script = ReplayScript::from_reports([
//!     SensorReport::new(vec![IrBlob::at(512, 384)], 150),
//!     SensorReport::new(vec![IrBlob::at(515, 386)], 150),
//! ]);
//! let out = replay(&ProviderConfig::default(), None, script)?;
//! assert_eq!(out.frames.len(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `irtouch::core`: calibration rectangles, the projective warper,
//!   calibration persistence, logging helpers.
//! - `irtouch::tracker`: frame-to-frame contact tracking.
//! - `irtouch::provider`: the acquisition coordinator, frames, calibration
//!   sessions and transport bundles.

pub use irtouch_core as core;
pub use irtouch_provider as provider;
pub use irtouch_tracker as tracker;

pub use irtouch_core::{CalibrationData, CalibrationRectangle, ScreenSize, Warper};
pub use irtouch_provider::{Contact, ContactKind, Frame, Provider, ProviderParams};
pub use irtouch_tracker::TrackerParams;

mod config;
mod replay;

pub use config::{ConfigIoError, ProviderConfig};
pub use replay::{
    play, replay, spawn_player, ReplayError, ReplayEvent, ReplayOutput, ReplayScript,
    ReplaySession,
};
