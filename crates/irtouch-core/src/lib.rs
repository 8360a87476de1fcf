//! Core geometry for IR touch sensing.
//!
//! This crate is small and purely geometric: the calibration quads, the
//! quad-to-quad projective [`Warper`], and the persisted [`CalibrationData`].
//! It knows nothing about sensors, tracks or threads.
//!
//! ```
//! use irtouch_core::{CalibrationRectangle, Warper};
//! use nalgebra::Point2;
//!
//! let mut warper = Warper::from_quads(
//!     CalibrationRectangle::unit(),
//!     CalibrationRectangle::from_size(1920.0, 1080.0),
//! )?;
//! let p = warper.warp(Point2::new(0.5, 0.5))?;
//! assert!((p.x - 960.0).abs() < 1e-9 && (p.y - 540.0).abs() < 1e-9);
//! # Ok::<(), irtouch_core::WarpError>(())
//! ```

mod calibration;
mod logger;
mod rect;
mod warper;

pub use calibration::{CalibrationData, CalibrationIoError, CalibrationStore, ScreenSize};
pub use rect::{CalibrationRectangle, Corner};
pub use warper::{
    apply_warp, quad_to_square, square_to_quad, warp_matrix, QuadRole, WarpError, Warper,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
