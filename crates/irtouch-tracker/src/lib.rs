//! Spatio-temporal contact tracker.
//!
//! ## Quickstart
//!
//! ```
//! use irtouch_tracker::{BlobObservation, ContactTracker, TrackEventKind, TrackerParams};
//!
//! let mut tracker = ContactTracker::new(TrackerParams::default());
//! let events = tracker.process(&[BlobObservation::new(512.0, 384.0)]);
//! assert_eq!(events[0].kind, TrackEventKind::Start);
//!
//! let events = tracker.process(&[BlobObservation::new(515.0, 380.0)]);
//! assert_eq!(events[0].kind, TrackEventKind::Update);
//!
//! let events = tracker.process(&[]);
//! assert_eq!(events[0].kind, TrackEventKind::End);
//! ```
//!
//! Per tick:
//! 1. Drop non-finite observations.
//! 2. Collect every (track, observation) pair closer than the gating radius.
//! 3. Visit pairs by increasing distance (ties: lower track id) and assign
//!    greedily, one observation per track.
//! 4. Matched tracks push the raw position into a moving-average window.
//! 5. Unmatched tracks coast for `grace_ticks`, then end.
//! 6. Unmatched observations open new tracks with fresh ids.
//! 7. Emit one event per affected track, sorted by id.

mod params;
mod track;
mod tracker;

pub use params::TrackerParams;
pub use track::{BlobObservation, Track, TrackId, TrackState};
pub use tracker::{ContactTracker, TrackEvent, TrackEventKind};
