//! JSON configuration for a touch provider.

use irtouch_core::{CalibrationStore, ScreenSize};
use irtouch_provider::{
    CalibrationError, CalibrationTargets, HardwareSession, Provider, ProviderEvents,
    ProviderParams,
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum ConfigIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Everything needed to bring up a provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub provider: ProviderParams,
    /// Stored calibration applied when the provider is built.
    pub calibration_path: Option<PathBuf>,
    /// Fiducial inset for calibration sessions, as a fraction of each screen
    /// dimension.
    pub calibration_inset: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: ProviderParams::default(),
            calibration_path: None,
            calibration_inset: 0.1,
        }
    }
}

impl ProviderConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn calibration_store(&self) -> Option<CalibrationStore> {
        self.calibration_path.as_ref().map(CalibrationStore::new)
    }

    pub fn calibration_targets(&self, screen_size: ScreenSize) -> CalibrationTargets {
        CalibrationTargets::for_screen(screen_size, self.calibration_inset)
    }

    /// Build a stopped provider, applying the stored calibration if one
    /// exists.
    pub fn build<S>(&self, session: S) -> Result<(Provider, ProviderEvents), CalibrationError>
    where
        S: HardwareSession + 'static,
    {
        let (provider, events) = Provider::new(session, self.provider.clone());
        if let Some(store) = self.calibration_store() {
            if let Some(data) = store.load()? {
                provider.apply_calibration(&data)?;
                log::info!("restored calibration from {}", store.path().display());
            }
        }
        Ok((provider, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ReplaySession;
    use irtouch_core::{CalibrationData, CalibrationRectangle};

    #[test]
    fn config_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = ProviderConfig::default();
        config.provider.tracker.gating_radius = 42.0;
        config.calibration_path = Some(dir.path().join("cal.json"));
        config.write_json(&path).unwrap();
        assert_eq!(ProviderConfig::load_json(&path).unwrap(), config);
    }

    #[test]
    fn empty_object_is_default_config() {
        let config: ProviderConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ProviderConfig::default());
    }

    #[test]
    fn build_restores_stored_calibration() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("cal.json"));
        let data = CalibrationData::with_timestamp(
            CalibrationRectangle::from_size(1024.0, 768.0),
            CalibrationRectangle::from_size(1920.0, 1080.0),
            ScreenSize::new(1920.0, 1080.0),
            0,
        );
        store.save(&data).unwrap();

        let config = ProviderConfig {
            calibration_path: Some(store.path().to_path_buf()),
            ..ProviderConfig::default()
        };
        let (provider, _events) = config.build(ReplaySession::default()).unwrap();
        assert_eq!(provider.screen_size(), ScreenSize::new(1920.0, 1080.0));
        assert_eq!(provider.quads().1, *data.destination());
    }

    #[test]
    fn missing_calibration_file_keeps_identity() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProviderConfig {
            calibration_path: Some(dir.path().join("absent.json")),
            ..ProviderConfig::default()
        };
        let (provider, _events) = config.build(ReplaySession::default()).unwrap();
        assert_eq!(provider.screen_size(), ScreenSize::default());
    }
}
