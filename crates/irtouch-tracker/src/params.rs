use serde::{Deserialize, Serialize};

/// Parameters of the contact tracker.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerParams {
    /// Maximum distance between a track's last raw position and a new
    /// observation for the observation to continue that track. Measured in
    /// the coordinate space of the observations.
    pub gating_radius: f64,

    /// Number of most recent raw positions averaged into the reported
    /// position. `1` reports raw positions.
    pub smoothing_window: usize,

    /// Ticks a track may go unobserved before it ends. `0` ends a track on
    /// the first tick without a matching observation.
    pub grace_ticks: u32,

    /// Upper bound on simultaneously live tracks. Observations that would
    /// open a track beyond this bound are dropped.
    pub max_tracks: usize,
}

impl Default for TrackerParams {
    fn default() -> Self {
        Self {
            gating_radius: 100.0,
            smoothing_window: 4,
            grace_ticks: 0,
            max_tracks: 8,
        }
    }
}
