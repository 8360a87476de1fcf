//! Acquisition coordinator.
//!
//! A [`Provider`] owns the hardware session, the warper and the contact
//! tracker behind a single lock. The driver thread calls
//! [`Provider::handle_report`] for every sensor sample; control calls
//! ([`Provider::start`], [`Provider::stop`], [`Provider::set_calibration_data`])
//! may come from any other thread. Frames, battery changes and diagnostics are
//! delivered through the channels returned by [`Provider::new`].

use crate::contact::{Contact, Frame};
use crate::session::{extract_blobs, HardwareSession, ReportMode, SensorReport};
use crate::{CalibrationError, ConnectionError, MalformedReport, ProviderParams};
use crossbeam_channel::{unbounded, Receiver, Sender};
use irtouch_core::{CalibrationData, CalibrationRectangle, ScreenSize, WarpError, Warper};
use irtouch_tracker::{BlobObservation, ContactTracker, TrackEvent};
use nalgebra::Vector2;
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// LED pattern shown while a session is running.
const SESSION_LEDS: [bool; 4] = [false, false, false, true];

/// A recoverable problem observed while processing sensor input.
#[derive(Clone, Debug, PartialEq)]
pub enum Diagnostic {
    /// The whole report was skipped.
    MalformedReport(MalformedReport),
    /// One blob could not be warped and was dropped from its tick.
    WarpFailed { slot: usize, error: WarpError },
    /// The sensor refused a report mode change.
    ReportMode {
        mode: ReportMode,
        error: ConnectionError,
    },
}

/// Receiving ends of the coordinator's output channels.
///
/// The channels are unbounded: a consumer must keep draining every receiver
/// it holds, or drop it, otherwise the queue grows with every tick.
#[derive(Debug)]
pub struct ProviderEvents {
    pub frames: Receiver<Frame>,
    /// Clamped battery level, sent only when it changes.
    pub battery: Receiver<u8>,
    pub diagnostics: Receiver<Diagnostic>,
}

struct ProviderState {
    session: Box<dyn HardwareSession>,
    params: ProviderParams,
    running: bool,
    connected: bool,
    warper: Warper,
    screen_size: ScreenSize,
    tracker: ContactTracker,
    next_sequence: u64,
    last_timestamp: Option<Duration>,
    battery: u8,
}

impl ProviderState {
    fn connect(&mut self) -> Result<(), ConnectionError> {
        self.session.connect()?;
        self.connected = true;
        self.session.set_report_mode(ReportMode::IrAccel)?;
        self.session.set_leds(SESSION_LEDS)?;
        Ok(())
    }

    fn disconnect(&mut self) {
        self.session.disconnect();
        self.connected = false;
    }

    /// Strictly increasing timestamp, bumped by a nanosecond when the clock
    /// has not advanced since the previous frame.
    fn next_timestamp(&mut self, now: Duration) -> Duration {
        let ts = match self.last_timestamp {
            Some(last) if now <= last => last + Duration::from_nanos(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }

    fn seal(&mut self, contacts: Vec<Contact>, now: Duration) -> Frame {
        let timestamp = self.next_timestamp(now);
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Frame::new(sequence, timestamp, contacts)
    }

    fn contact(&self, event: &TrackEvent) -> Contact {
        let size = match event.size {
            Some(s) => Vector2::repeat(s * self.params.blob_size_scale),
            None => Vector2::from(self.params.contact_size),
        };
        Contact {
            id: event.id,
            kind: event.kind.into(),
            position: event.position,
            normalized: self.screen_size.normalize(event.position),
            size,
        }
    }

    fn update_battery(&mut self, raw: u8) -> Option<u8> {
        let level = raw.min(self.params.battery_max);
        if level == self.battery {
            return None;
        }
        self.battery = level;
        Some(level)
    }
}

/// Thread-safe acquisition coordinator.
pub struct Provider {
    state: Mutex<ProviderState>,
    frames: Sender<Frame>,
    battery: Sender<u8>,
    diagnostics: Sender<Diagnostic>,
    epoch: Instant,
}

impl Provider {
    /// Create a stopped coordinator with an identity calibration and a
    /// `1 x 1` screen.
    pub fn new<S>(session: S, params: ProviderParams) -> (Self, ProviderEvents)
    where
        S: HardwareSession + 'static,
    {
        let (frames_tx, frames_rx) = unbounded();
        let (battery_tx, battery_rx) = unbounded();
        let (diag_tx, diag_rx) = unbounded();

        let state = ProviderState {
            session: Box::new(session),
            tracker: ContactTracker::new(params.tracker.clone()),
            params,
            running: false,
            connected: false,
            warper: Warper::new(),
            screen_size: ScreenSize::default(),
            next_sequence: 0,
            last_timestamp: None,
            battery: 0,
        };

        let provider = Self {
            state: Mutex::new(state),
            frames: frames_tx,
            battery: battery_tx,
            diagnostics: diag_tx,
            epoch: Instant::now(),
        };
        let events = ProviderEvents {
            frames: frames_rx,
            battery: battery_rx,
            diagnostics: diag_rx,
        };
        (provider, events)
    }

    /// Connect to the sensor and begin emitting frames.
    ///
    /// A running session is stopped first. On failure the coordinator is
    /// left stopped and disconnected.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn start(&self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        self.shutdown(&mut state);

        log::info!("connecting to sensor");
        if let Err(err) = state.connect() {
            log::warn!("sensor connection failed: {err}");
            state.disconnect();
            return Err(err);
        }

        state.tracker.clear();
        state.next_sequence = 0;
        state.running = true;
        log::info!("sensor session started");
        Ok(())
    }

    /// Stop the session and disconnect. Calling it while stopped does nothing.
    ///
    /// With [`ProviderParams::end_contacts_on_stop`] set, live contacts are
    /// closed by one last frame of `End` contacts.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.running && !state.connected {
            return;
        }
        self.shutdown(&mut state);
        log::info!("sensor session stopped");
    }

    fn shutdown(&self, state: &mut ProviderState) {
        if state.running {
            state.running = false;
            self.drop_tracks(state);
        }
        if state.connected {
            state.disconnect();
        }
    }

    /// End every live track, closing it with an `End` frame when
    /// [`ProviderParams::end_contacts_on_stop`] is set.
    fn drop_tracks(&self, state: &mut ProviderState) {
        if state.params.end_contacts_on_stop {
            let ends = state.tracker.reset();
            if !ends.is_empty() {
                let contacts = ends.iter().map(|e| state.contact(e)).collect();
                let frame = state.seal(contacts, self.epoch.elapsed());
                self.emit(frame);
            }
        } else {
            state.tracker.clear();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    /// Replace the calibration used for subsequent ticks.
    ///
    /// Both quads and the screen size are validated before anything is
    /// committed; on error the previous calibration stays in effect. When the
    /// mapping changes while warping is on, live contacts are ended so that no
    /// smoothing window mixes the old and new coordinate spaces.
    pub fn set_calibration_data(
        &self,
        source: CalibrationRectangle,
        destination: CalibrationRectangle,
        screen_size: ScreenSize,
    ) -> Result<(), CalibrationError> {
        if !screen_size.is_valid() {
            return Err(CalibrationError::InvalidScreenSize {
                width: screen_size.width,
                height: screen_size.height,
            });
        }

        let mut state = self.state.lock();
        let remapped =
            *state.warper.source() != source || *state.warper.destination() != destination;
        state.warper.set_quads(source, destination)?;
        state.screen_size = screen_size;
        log::debug!(
            "calibration updated, screen {}x{}",
            screen_size.width,
            screen_size.height
        );
        if remapped && state.params.transform_enabled {
            self.drop_tracks(&mut state);
        }
        Ok(())
    }

    /// Apply a stored calibration.
    pub fn apply_calibration(&self, data: &CalibrationData) -> Result<(), CalibrationError> {
        self.set_calibration_data(*data.source(), *data.destination(), data.screen_size())
    }

    /// Current source and destination quads.
    pub fn quads(&self) -> (CalibrationRectangle, CalibrationRectangle) {
        let state = self.state.lock();
        (*state.warper.source(), *state.warper.destination())
    }

    pub fn screen_size(&self) -> ScreenSize {
        self.state.lock().screen_size
    }

    /// Toggle warping. While disabled, contacts carry raw sensor positions,
    /// which is what a calibration session needs.
    ///
    /// Switching ends live contacts; they restart in the new space on the
    /// next tick.
    pub fn set_transform_enabled(&self, enabled: bool) {
        let mut state = self.state.lock();
        if state.params.transform_enabled == enabled {
            return;
        }
        state.params.transform_enabled = enabled;
        log::debug!("transform enabled={enabled}");
        self.drop_tracks(&mut state);
    }

    pub fn transform_enabled(&self) -> bool {
        self.state.lock().params.transform_enabled
    }

    /// Last clamped battery level.
    pub fn battery_level(&self) -> u8 {
        self.state.lock().battery
    }

    /// Number of contacts currently tracked.
    pub fn live_contacts(&self) -> usize {
        self.state.lock().tracker.tracks().len()
    }

    /// Process one sensor sample. Called from the driver thread.
    ///
    /// Emits exactly one frame while running, even when no blob is visible.
    /// Malformed reports are skipped entirely and reported as diagnostics.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "trace", skip_all, fields(blobs = report.blobs.len()))
    )]
    pub fn handle_report(&self, report: &SensorReport) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }

        let blobs = match extract_blobs(report, state.params.sensor_size) {
            Ok(blobs) => blobs,
            Err(err) => {
                log::warn!("skipping sensor report: {err}");
                self.diagnose(Diagnostic::MalformedReport(err));
                return;
            }
        };

        let transform = state.params.transform_enabled;
        let mut observations = Vec::with_capacity(blobs.len());
        for blob in blobs {
            let position = if transform {
                match state.warper.warp(blob.position) {
                    Ok(p) => p,
                    Err(error) => {
                        log::warn!("dropping blob in slot {}: {error}", blob.slot);
                        self.diagnose(Diagnostic::WarpFailed {
                            slot: blob.slot,
                            error,
                        });
                        continue;
                    }
                }
            } else {
                blob.position
            };
            observations.push(BlobObservation {
                position,
                size: blob.size,
            });
        }

        let events = state.tracker.process(&observations);
        let contacts = events.iter().map(|e| state.contact(e)).collect();
        let frame = state.seal(contacts, self.epoch.elapsed());
        self.emit(frame);

        if let Some(level) = state.update_battery(report.battery) {
            log::debug!("battery level {level}");
            if self.battery.send(level).is_err() {
                log::trace!("battery receiver dropped");
            }
        }
    }

    /// React to an extension being plugged in or removed. Ignored while
    /// stopped.
    pub fn handle_extension_changed(&self, inserted: bool) {
        let mut state = self.state.lock();
        if !state.running {
            return;
        }
        let mode = if inserted {
            ReportMode::IrExtensionAccel
        } else {
            ReportMode::IrAccel
        };
        log::debug!("extension inserted={inserted}, switching to {mode:?}");
        if let Err(error) = state.session.set_report_mode(mode) {
            log::warn!("report mode change failed: {error}");
            self.diagnose(Diagnostic::ReportMode { mode, error });
        }
    }

    fn emit(&self, frame: Frame) {
        if self.frames.send(frame).is_err() {
            log::trace!("frame receiver dropped");
        }
    }

    fn diagnose(&self, diagnostic: Diagnostic) {
        if self.diagnostics.send(diagnostic).is_err() {
            log::trace!("diagnostic receiver dropped");
        }
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if state.connected {
            state.disconnect();
        }
    }
}
