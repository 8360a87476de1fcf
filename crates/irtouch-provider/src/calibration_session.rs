//! Four-point calibration workflow.
//!
//! The session disables warping so that contacts carry raw sensor positions,
//! collects one touch per on-screen target in [`Corner::ALL`] order, then
//! installs the resulting mapping on the coordinator and optionally persists
//! it.

use crate::contact::{ContactKind, Frame};
use crate::{CalibrationError, Provider};
use irtouch_core::{CalibrationData, CalibrationRectangle, CalibrationStore, Corner, ScreenSize};
use nalgebra::Point2;

/// Where the calibration fiducials are drawn, in screen units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationTargets {
    destination: CalibrationRectangle,
    screen_size: ScreenSize,
}

impl CalibrationTargets {
    pub fn new(destination: CalibrationRectangle, screen_size: ScreenSize) -> Self {
        Self {
            destination,
            screen_size,
        }
    }

    /// Targets inset from the screen edges by `inset` times each dimension.
    ///
    /// `inset` is clamped to `[0, 0.45]`.
    pub fn for_screen(screen_size: ScreenSize, inset: f64) -> Self {
        let inset = if inset.is_finite() {
            inset.clamp(0.0, 0.45)
        } else {
            0.0
        };
        let (w, h) = (screen_size.width, screen_size.height);
        let (dx, dy) = (w * inset, h * inset);
        let destination = CalibrationRectangle::new(
            Point2::new(dx, dy),
            Point2::new(w - dx, dy),
            Point2::new(dx, h - dy),
            Point2::new(w - dx, h - dy),
        );
        Self::new(destination, screen_size)
    }

    #[inline]
    pub fn destination(&self) -> &CalibrationRectangle {
        &self.destination
    }

    #[inline]
    pub fn screen_size(&self) -> ScreenSize {
        self.screen_size
    }
}

/// Outcome of feeding one input to a [`CalibrationSession`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CalibrationProgress {
    /// A point was recorded for `corner`.
    Collected { corner: Corner, remaining: usize },
    /// All four points are recorded.
    Complete,
    /// Nothing usable in the input, or the session is already complete.
    Ignored,
}

/// Collects the source quad by asking the user to touch four targets.
#[derive(Debug)]
pub struct CalibrationSession {
    targets: CalibrationTargets,
    source: CalibrationRectangle,
    collected: usize,
    restore_transform: bool,
    store: Option<CalibrationStore>,
}

impl CalibrationSession {
    /// Start collecting. Warping is disabled on `provider` until the session
    /// ends.
    pub fn begin(provider: &Provider, targets: CalibrationTargets) -> Self {
        let restore_transform = provider.transform_enabled();
        provider.set_transform_enabled(false);
        log::info!("calibration started");
        Self {
            targets,
            source: CalibrationRectangle::default(),
            collected: 0,
            restore_transform,
            store: None,
        }
    }

    /// Persist the calibration to `store` when the session finishes.
    pub fn with_store(mut self, store: CalibrationStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn targets(&self) -> &CalibrationTargets {
        &self.targets
    }

    /// The corner to touch next and where its fiducial is on screen.
    pub fn current_target(&self) -> Option<(Corner, Point2<f64>)> {
        Corner::ALL
            .get(self.collected)
            .map(|&c| (c, self.targets.destination.corner(c)))
    }

    #[inline]
    pub fn collected(&self) -> usize {
        self.collected
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.collected == Corner::ALL.len()
    }

    /// Record a raw sensor position for the current target.
    pub fn add_point(&mut self, raw: Point2<f64>) -> CalibrationProgress {
        let Some((corner, _)) = self.current_target() else {
            return CalibrationProgress::Ignored;
        };
        if !(raw.x.is_finite() && raw.y.is_finite()) {
            return CalibrationProgress::Ignored;
        }

        self.source.set_corner(corner, raw);
        self.collected += 1;
        log::debug!("calibration point {corner:?} at ({}, {})", raw.x, raw.y);

        if self.is_complete() {
            CalibrationProgress::Complete
        } else {
            CalibrationProgress::Collected {
                corner,
                remaining: Corner::ALL.len() - self.collected,
            }
        }
    }

    /// Record the first new contact of `frame`, if any.
    pub fn observe_frame(&mut self, frame: &Frame) -> CalibrationProgress {
        match frame
            .contacts()
            .iter()
            .find(|c| c.kind == ContactKind::Start)
        {
            Some(contact) => self.add_point(contact.position),
            None => CalibrationProgress::Ignored,
        }
    }

    /// Install the collected calibration on `provider`, restore its transform
    /// setting and persist the data when a store is attached.
    ///
    /// The transform setting is restored on every path. A persistence
    /// failure is returned after the calibration has been applied.
    pub fn finish(self, provider: &Provider) -> Result<CalibrationData, CalibrationError> {
        let result = self.apply(provider);
        provider.set_transform_enabled(self.restore_transform);
        let data = result?;

        if let Some(store) = &self.store {
            store.save(&data)?;
        }
        Ok(data)
    }

    fn apply(&self, provider: &Provider) -> Result<CalibrationData, CalibrationError> {
        if !self.is_complete() {
            return Err(CalibrationError::Incomplete {
                collected: self.collected,
            });
        }
        let data = CalibrationData::new(
            self.source,
            self.targets.destination,
            self.targets.screen_size,
        );
        provider.apply_calibration(&data)?;
        log::info!("calibration applied");
        Ok(data)
    }

    /// Abandon the session, restoring the transform setting.
    pub fn cancel(self, provider: &Provider) {
        provider.set_transform_enabled(self.restore_transform);
        log::info!("calibration cancelled after {} points", self.collected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{HardwareSession, IrBlob, ReportMode, SensorReport};
    use crate::{ConnectionError, ProviderParams};
    use approx::assert_abs_diff_eq;

    struct Loopback;

    impl HardwareSession for Loopback {
        fn connect(&mut self) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn set_report_mode(&mut self, _mode: ReportMode) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn set_leds(&mut self, _leds: [bool; 4]) -> Result<(), ConnectionError> {
            Ok(())
        }
        fn disconnect(&mut self) {}
    }

    fn tap(provider: &Provider, x: i32, y: i32) {
        provider.handle_report(&SensorReport::new(vec![IrBlob::at(x, y)], 0));
        provider.handle_report(&SensorReport::default());
    }

    #[test]
    fn inset_targets_follow_screen() {
        let t = CalibrationTargets::for_screen(ScreenSize::new(1000.0, 500.0), 0.1);
        assert_eq!(t.destination().top_left, Point2::new(100.0, 50.0));
        assert_eq!(t.destination().bottom_right, Point2::new(900.0, 450.0));
        let clamped = CalibrationTargets::for_screen(ScreenSize::new(10.0, 10.0), 3.0);
        assert!(!clamped.destination().is_degenerate());
    }

    #[test]
    fn four_taps_calibrate_the_provider() {
        let (provider, events) = Provider::new(Loopback, ProviderParams::default());
        provider.start().unwrap();
        let targets = CalibrationTargets::for_screen(ScreenSize::new(1920.0, 1080.0), 0.1);
        let mut session = CalibrationSession::begin(&provider, targets);
        assert!(!provider.transform_enabled());
        assert_eq!(session.current_target().unwrap().0, Corner::TopLeft);

        // Raw sensor positions of the four fiducials, in Corner::ALL order.
        let taps = [(100, 80), (900, 80), (100, 680), (900, 680)];
        let mut last = CalibrationProgress::Ignored;
        for (x, y) in taps {
            tap(&provider, x, y);
            for frame in events.frames.try_iter() {
                let progress = session.observe_frame(&frame);
                if progress != CalibrationProgress::Ignored {
                    last = progress;
                }
            }
        }
        assert_eq!(last, CalibrationProgress::Complete);

        let data = session.finish(&provider).unwrap();
        assert!(provider.transform_enabled());
        assert_eq!(data.source().top_right, Point2::new(900.0, 80.0));

        // Touching the top-left fiducial now lands on its screen target.
        tap(&provider, 100, 80);
        let frame = events.frames.try_recv().unwrap();
        let c = frame.contacts()[0];
        assert_abs_diff_eq!(c.position.x, 192.0, epsilon = 1e-6);
        assert_abs_diff_eq!(c.position.y, 108.0, epsilon = 1e-6);
    }

    #[test]
    fn incomplete_session_fails_and_restores_transform() {
        let (provider, _events) = Provider::new(Loopback, ProviderParams::default());
        let mut session = CalibrationSession::begin(
            &provider,
            CalibrationTargets::for_screen(ScreenSize::new(800.0, 600.0), 0.0),
        );
        session.add_point(Point2::new(1.0, 1.0));
        let err = session.finish(&provider).unwrap_err();
        assert!(matches!(err, CalibrationError::Incomplete { collected: 1 }));
        assert!(provider.transform_enabled());
    }

    #[test]
    fn repeated_touch_yields_degenerate_quad() {
        let (provider, _events) = Provider::new(Loopback, ProviderParams::default());
        let before = provider.quads();
        let mut session = CalibrationSession::begin(
            &provider,
            CalibrationTargets::for_screen(ScreenSize::new(800.0, 600.0), 0.1),
        );
        for _ in 0..4 {
            session.add_point(Point2::new(50.0, 50.0));
        }
        assert_eq!(
            session.add_point(Point2::new(1.0, 1.0)),
            CalibrationProgress::Ignored
        );
        assert!(matches!(
            session.finish(&provider),
            Err(CalibrationError::Warp(_))
        ));
        assert_eq!(provider.quads(), before);
    }

    #[test]
    fn finished_session_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::new(dir.path().join("calibration.json"));
        let (provider, _events) = Provider::new(Loopback, ProviderParams::default());
        let mut session = CalibrationSession::begin(
            &provider,
            CalibrationTargets::for_screen(ScreenSize::new(800.0, 600.0), 0.0),
        )
        .with_store(store.clone());
        for (x, y) in [(0.0, 0.0), (1000.0, 0.0), (0.0, 700.0), (1000.0, 700.0)] {
            session.add_point(Point2::new(x, y));
        }
        let data = session.finish(&provider).unwrap();
        assert_eq!(store.load().unwrap(), Some(data));
    }
}
