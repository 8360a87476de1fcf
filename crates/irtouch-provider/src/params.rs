use irtouch_tracker::TrackerParams;
use serde::{Deserialize, Serialize};

/// Acquisition coordinator configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderParams {
    pub tracker: TrackerParams,
    /// Warp blob positions through the calibration before tracking.
    pub transform_enabled: bool,
    /// Raw sensor coordinate range; blobs outside it make the report malformed.
    pub sensor_size: [i32; 2],
    /// Normalised contact size used when the sensor reports no blob size.
    pub contact_size: [f64; 2],
    /// Normalised contact size per unit of reported blob size.
    pub blob_size_scale: f64,
    /// Battery readings are clamped to this value.
    pub battery_max: u8,
    /// Close live contacts with a frame of `End` contacts when the session
    /// stops or the coordinate space changes. Otherwise they are dropped
    /// silently.
    pub end_contacts_on_stop: bool,
}

impl Default for ProviderParams {
    fn default() -> Self {
        Self {
            tracker: TrackerParams::default(),
            transform_enabled: true,
            sensor_size: [1024, 768],
            contact_size: [0.02, 0.02],
            blob_size_scale: 0.01,
            battery_max: 0xC8,
            end_contacts_on_stop: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params: ProviderParams =
            serde_json::from_str(r#"{"transform_enabled":false,"tracker":{"grace_ticks":2}}"#)
                .unwrap();
        assert!(!params.transform_enabled);
        assert_eq!(params.tracker.grace_ticks, 2);
        assert_eq!(params.tracker.smoothing_window, 4);
        assert_eq!(params.battery_max, 0xC8);
        assert_eq!(params.sensor_size, [1024, 768]);
    }
}
