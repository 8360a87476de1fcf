//! Recorded sensor input played back through a provider.
//!
//! A [`ReplayScript`] is a JSON list of sensor reports and extension
//! plug events. [`ReplaySession`] stands in for the hardware, and
//! [`spawn_player`] feeds the script to a provider from its own thread the
//! way a real driver would.

use crate::config::{ConfigIoError, ProviderConfig};
use irtouch_core::CalibrationData;
use irtouch_provider::{
    CalibrationError, ConnectionError, Diagnostic, Frame, HardwareSession, Provider, ReportMode,
    SensorReport,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, sync::Arc, thread};

#[cfg(feature = "tracing")]
use tracing::instrument;

#[derive(thiserror::Error, Debug)]
pub enum ReplayError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] ConfigIoError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error("replay driver thread panicked")]
    DriverPanicked,
}

/// One scripted hardware callback.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayEvent {
    Report(SensorReport),
    Extension { inserted: bool },
}

/// Ordered hardware callbacks.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplayScript {
    pub events: Vec<ReplayEvent>,
}

impl ReplayScript {
    pub fn from_reports(reports: impl IntoIterator<Item = SensorReport>) -> Self {
        Self {
            events: reports.into_iter().map(ReplayEvent::Report).collect(),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ReplayError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ReplayError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Number of sensor reports in the script.
    pub fn report_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ReplayEvent::Report(_)))
            .count()
    }
}

/// Hardware session with no device behind it.
#[derive(Debug, Default)]
pub struct ReplaySession {
    connected: bool,
    mode: Option<ReportMode>,
}

impl ReplaySession {
    fn require_connection(&self) -> Result<(), ConnectionError> {
        if self.connected {
            Ok(())
        } else {
            Err(ConnectionError::Configure("replay session not connected".into()))
        }
    }
}

impl HardwareSession for ReplaySession {
    fn connect(&mut self) -> Result<(), ConnectionError> {
        self.connected = true;
        log::debug!("replay session connected");
        Ok(())
    }

    fn set_report_mode(&mut self, mode: ReportMode) -> Result<(), ConnectionError> {
        self.require_connection()?;
        self.mode = Some(mode);
        log::debug!("replay report mode {mode:?}");
        Ok(())
    }

    fn set_leds(&mut self, leds: [bool; 4]) -> Result<(), ConnectionError> {
        self.require_connection()?;
        log::trace!("replay leds {leds:?}");
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.connected {
            log::debug!("replay session disconnected");
        }
        self.connected = false;
        self.mode = None;
    }
}

/// Feed `script` to `provider` on the calling thread. Returns the number of
/// reports delivered.
pub fn play(provider: &Provider, script: &ReplayScript) -> usize {
    let mut reports = 0;
    for event in &script.events {
        match event {
            ReplayEvent::Report(report) => {
                provider.handle_report(report);
                reports += 1;
            }
            ReplayEvent::Extension { inserted } => provider.handle_extension_changed(*inserted),
        }
    }
    reports
}

/// Feed `script` to `provider` from a dedicated driver thread.
pub fn spawn_player(provider: Arc<Provider>, script: ReplayScript) -> thread::JoinHandle<usize> {
    thread::spawn(move || play(&provider, &script))
}

/// Everything a replay produced.
#[derive(Debug, Default)]
pub struct ReplayOutput {
    pub frames: Vec<Frame>,
    pub battery: Vec<u8>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run `script` through a provider built from `config`.
///
/// `calibration`, when given, replaces whatever `config` points at. The
/// provider is stopped before returning, so the output ends with the closing
/// frame of any contact still live.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip_all, fields(events = script.events.len()))
)]
pub fn replay(
    config: &ProviderConfig,
    calibration: Option<&CalibrationData>,
    script: ReplayScript,
) -> Result<ReplayOutput, ReplayError> {
    let (provider, events) = config.build(ReplaySession::default())?;
    if let Some(data) = calibration {
        provider.apply_calibration(data)?;
    }
    let provider = Arc::new(provider);
    provider.start()?;

    let driver = spawn_player(Arc::clone(&provider), script);
    let joined = driver.join();
    provider.stop();
    let reports = joined.map_err(|_| ReplayError::DriverPanicked)?;

    let output = ReplayOutput {
        frames: events.frames.try_iter().collect(),
        battery: events.battery.try_iter().collect(),
        diagnostics: events.diagnostics.try_iter().collect(),
    };
    log::info!(
        "replayed {reports} reports into {} frames ({} diagnostics)",
        output.frames.len(),
        output.diagnostics.len()
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use irtouch_provider::IrBlob;

    #[test]
    fn script_json_is_externally_tagged() {
        let raw = r#"{"events":[
            {"report":{"blobs":[{"found":true,"x":1,"y":2}],"battery":10}},
            {"extension":{"inserted":true}}
        ]}"#;
        let script: ReplayScript = serde_json::from_str(raw).unwrap();
        assert_eq!(script.report_count(), 1);
        assert_eq!(script.events[1], ReplayEvent::Extension { inserted: true });
    }

    #[test]
    fn replay_session_refuses_configuration_before_connect() {
        let mut session = ReplaySession::default();
        assert!(session.set_report_mode(ReportMode::IrAccel).is_err());
        session.connect().unwrap();
        session.set_report_mode(ReportMode::IrAccel).unwrap();
        session.set_leds([true; 4]).unwrap();
        session.disconnect();
        assert!(session.set_leds([false; 4]).is_err());
    }

    #[test]
    fn replay_collects_frames_battery_and_closing_frame() {
        let script = ReplayScript::from_reports([
            SensorReport::new(vec![IrBlob::at(100, 100)], 90),
            SensorReport::new(vec![IrBlob::at(104, 100)], 90),
            SensorReport::new(vec![IrBlob::at(5000, 0)], 90),
            SensorReport::new(vec![IrBlob::at(108, 100)], 80),
        ]);
        let out = replay(&ProviderConfig::default(), None, script).unwrap();
        // Three good ticks plus the closing frame.
        assert_eq!(out.frames.len(), 4);
        assert_eq!(out.battery, vec![90, 80]);
        assert_eq!(out.diagnostics.len(), 1);
        let sequences: Vec<u64> = out.frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(sequences, vec![0, 1, 2, 3]);
    }
}
