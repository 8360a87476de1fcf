use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Track identifier, unique among live tracks and never reused by a tracker.
pub type TrackId = u32;

/// Lifecycle stage of a live track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackState {
    /// Opened this tick, not yet continued.
    #[default]
    Pending,
    /// Continued by an observation on its latest tick.
    Active,
    /// Missed at least one tick and is coasting through its grace period.
    Ending,
}

/// One blob reported by the sensor for a single tick.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlobObservation {
    pub position: Point2<f64>,
    /// Blob extent, when the sensor reports one.
    #[serde(default)]
    pub size: Option<f64>,
}

impl BlobObservation {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            size: None,
        }
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }
}

/// A blob identity followed across ticks.
#[derive(Clone, Debug)]
pub struct Track {
    id: TrackId,
    state: TrackState,
    position: Point2<f64>,
    raw_position: Point2<f64>,
    size: Option<f64>,
    first_seen_tick: u64,
    last_seen_tick: u64,
    missed: u32,
    history: VecDeque<Point2<f64>>,
}

impl Track {
    pub(crate) fn open(id: TrackId, obs: &BlobObservation, tick: u64, window: usize) -> Self {
        let mut history = VecDeque::with_capacity(window.max(1));
        history.push_back(obs.position);
        Self {
            id,
            state: TrackState::Pending,
            position: obs.position,
            raw_position: obs.position,
            size: obs.size,
            first_seen_tick: tick,
            last_seen_tick: tick,
            missed: 0,
            history,
        }
    }

    /// Continue the track with a matched observation.
    pub(crate) fn observe(&mut self, obs: &BlobObservation, tick: u64, window: usize) {
        let window = window.max(1);
        self.history.push_back(obs.position);
        while self.history.len() > window {
            self.history.pop_front();
        }
        self.position = mean(&self.history);
        self.raw_position = obs.position;
        if obs.size.is_some() {
            self.size = obs.size;
        }
        self.last_seen_tick = tick;
        self.missed = 0;
        self.state = TrackState::Active;
    }

    /// Record a tick without a match. Returns the number of consecutive misses.
    pub(crate) fn miss(&mut self) -> u32 {
        self.missed += 1;
        self.state = TrackState::Ending;
        self.missed
    }

    #[inline]
    pub fn id(&self) -> TrackId {
        self.id
    }

    #[inline]
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Smoothed position.
    #[inline]
    pub fn position(&self) -> Point2<f64> {
        self.position
    }

    /// Most recent matched observation.
    #[inline]
    pub fn raw_position(&self) -> Point2<f64> {
        self.raw_position
    }

    #[inline]
    pub fn size(&self) -> Option<f64> {
        self.size
    }

    #[inline]
    pub fn first_seen_tick(&self) -> u64 {
        self.first_seen_tick
    }

    #[inline]
    pub fn last_seen_tick(&self) -> u64 {
        self.last_seen_tick
    }

    #[inline]
    pub fn missed_ticks(&self) -> u32 {
        self.missed
    }
}

fn mean(points: &VecDeque<Point2<f64>>) -> Point2<f64> {
    let n = points.len().max(1) as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Point2::new(sx / n, sy / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn smoothing_averages_last_window_positions() {
        let mut t = Track::open(1, &BlobObservation::new(0.0, 0.0), 1, 3);
        assert_eq!(t.state(), TrackState::Pending);
        t.observe(&BlobObservation::new(3.0, 3.0), 2, 3);
        t.observe(&BlobObservation::new(6.0, 0.0), 3, 3);
        assert_abs_diff_eq!(t.position().x, 3.0);
        assert_abs_diff_eq!(t.position().y, 1.0);

        // Oldest sample falls out of the window.
        t.observe(&BlobObservation::new(9.0, 3.0), 4, 3);
        assert_abs_diff_eq!(t.position().x, 6.0);
        assert_abs_diff_eq!(t.position().y, 2.0);
        assert_eq!(t.raw_position(), Point2::new(9.0, 3.0));
        assert_eq!(t.state(), TrackState::Active);
    }

    #[test]
    fn window_of_one_reports_raw_positions() {
        let mut t = Track::open(7, &BlobObservation::new(1.0, 2.0), 1, 1);
        t.observe(&BlobObservation::new(5.0, 8.0), 2, 1);
        assert_eq!(t.position(), Point2::new(5.0, 8.0));
    }

    #[test]
    fn miss_counts_consecutive_ticks_and_observe_clears() {
        let mut t = Track::open(2, &BlobObservation::new(1.0, 1.0).with_size(3.0), 1, 4);
        assert_eq!(t.miss(), 1);
        assert_eq!(t.miss(), 2);
        assert_eq!(t.state(), TrackState::Ending);
        t.observe(&BlobObservation::new(1.5, 1.0), 4, 4);
        assert_eq!(t.missed_ticks(), 0);
        assert_eq!(t.last_seen_tick(), 4);
        assert_eq!(t.first_seen_tick(), 1);
        assert_eq!(t.size(), Some(3.0));
    }
}
