//! Adjustment coordinator: decides when the steppers run and when motion
//! detection must stand aside.
//!
//! Two triggers open a pause window of `pause_sec`:
//! - scheduled, every `period_sec` (the first one on the first tick)
//! - failsafe, when no window is open, exposure is Under/Over and some
//!   stepper is due and would move
//!
//! Opening a window resets the detector baseline and marks a reseed. Steppers
//! run on every tick while the window is open; each applied change pushes the
//! window end out by another `pause_sec`. On the first tick after the window
//! closes the detector is seeded instead of run.

use contracts::{AdjustConfig, AdjustmentWindow, CameraDriver, DriverResult, ExposureState};
use tracing::{debug, info};

use crate::{AppliedChange, CameraControlAdapter};

/// What the detector should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionGate {
    /// Inside a pause window; do not call `detect()`
    Paused,
    /// Window just closed; call `seed()` with this frame and report nothing
    Seed,
    /// Ordinary detection
    Run,
}

/// Why a window was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowTrigger {
    Scheduled,
    Failsafe,
}

/// Outcome of one coordinator tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    pub gate: DetectionGate,

    /// Discard the detector baseline before gating
    pub reset_detector: bool,

    pub opened: Option<WindowTrigger>,
    pub applied: Vec<AppliedChange>,
}

/// Adjustment coordinator
#[derive(Debug, Clone)]
pub struct AdjustmentCoordinator {
    config: AdjustConfig,
    window: AdjustmentWindow,
    adapter: CameraControlAdapter,
}

impl AdjustmentCoordinator {
    pub fn new(config: &AdjustConfig, adapter: CameraControlAdapter) -> Self {
        Self {
            config: config.clone(),
            window: AdjustmentWindow::default(),
            adapter,
        }
    }

    pub fn window(&self) -> AdjustmentWindow {
        self.window
    }

    pub fn adapter(&self) -> &CameraControlAdapter {
        &self.adapter
    }

    pub fn is_paused(&self, now: f64) -> bool {
        self.window.is_paused(now)
    }

    /// Ask for a seed at the next unpaused tick; setting it twice is the same as once
    pub fn request_reseed(&mut self) {
        self.window.reseed_pending = true;
    }

    /// Run the window logic and steppers for one tick.
    ///
    /// Only a `Fatal` driver error is returned.
    pub fn tick(
        &mut self,
        state: ExposureState,
        now: f64,
        driver: &mut dyn CameraDriver,
    ) -> DriverResult<TickPlan> {
        let mut reset_detector = false;
        let opened = self.maybe_open_window(state, now);
        if opened.is_some() {
            reset_detector = true;
        }

        let mut applied = Vec::new();
        if self.window.is_paused(now) {
            applied = self.adapter.step_all(state, now, driver)?;
            if !applied.is_empty() {
                // settle after the last change before comparing frames again
                self.pause(now);
                reset_detector = true;
                debug!(changes = applied.len(), pause_until = ?self.window.pause_until, "Controls changed, pause extended");
            }
        }

        let gate = self.gate(now);
        Ok(TickPlan {
            gate,
            reset_detector,
            opened,
            applied,
        })
    }

    fn maybe_open_window(&mut self, state: ExposureState, now: f64) -> Option<WindowTrigger> {
        if !self.config.enabled || state == ExposureState::Disabled {
            return None;
        }

        let next = *self.window.next_scheduled.get_or_insert(now);
        if now >= next {
            self.window.next_scheduled = Some(now + self.config.period_sec);
            self.pause(now);
            info!(
                ?state,
                pause_sec = self.config.pause_sec,
                next = now + self.config.period_sec,
                "Scheduled adjustment window opened"
            );
            return Some(WindowTrigger::Scheduled);
        }

        if !self.window.is_paused(now) && state.is_poor() && self.adapter.any_wants_change(state, now)
        {
            self.pause(now);
            info!(?state, pause_sec = self.config.pause_sec, "Failsafe adjustment window opened");
            return Some(WindowTrigger::Failsafe);
        }

        None
    }

    /// Open (or extend) the pause window and mark the detector for reseeding
    fn pause(&mut self, now: f64) {
        let until = now + self.config.pause_sec;
        self.window.pause_until = Some(self.window.pause_until.map_or(until, |u| u.max(until)));
        self.window.reseed_pending = true;
    }

    fn gate(&mut self, now: f64) -> DetectionGate {
        if self.window.is_paused(now) {
            DetectionGate::Paused
        } else if self.window.reseed_pending {
            self.window.reseed_pending = false;
            DetectionGate::Seed
        } else {
            DetectionGate::Run
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ControlKind, ControlsConfig, ImageData};

    #[derive(Default)]
    struct AcceptAll {
        calls: usize,
    }

    impl CameraDriver for AcceptAll {
        fn name(&self) -> &str {
            "accept_all"
        }

        fn start(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn read(&mut self) -> DriverResult<Option<ImageData>> {
            Ok(None)
        }

        fn stop(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn supports(&self, _control: ControlKind) -> bool {
            true
        }

        fn set_control(&mut self, _control: ControlKind, _value: f64) -> DriverResult<()> {
            self.calls += 1;
            Ok(())
        }

        fn set_auto_exposure(&mut self, _enabled: bool) -> DriverResult<()> {
            Ok(())
        }
    }

    fn coordinator(driver: &AcceptAll) -> AdjustmentCoordinator {
        let config = AdjustConfig {
            enabled: true,
            period_sec: 180.0,
            pause_sec: 3.0,
        };
        AdjustmentCoordinator::new(
            &config,
            CameraControlAdapter::new(&ControlsConfig::default(), driver),
        )
    }

    #[test]
    fn test_scheduled_window_pause_then_single_seed() {
        let mut driver = AcceptAll::default();
        let mut coord = coordinator(&driver);

        // first tick opens the first window
        let plan = coord.tick(ExposureState::Normal, 0.0, &mut driver).unwrap();
        assert_eq!(plan.opened, Some(WindowTrigger::Scheduled));
        assert!(plan.reset_detector);
        assert_eq!(plan.gate, DetectionGate::Paused);

        // settle until the next scheduled window
        for t in 1..180 {
            coord.tick(ExposureState::Normal, t as f64, &mut driver).unwrap();
        }

        let gates: Vec<_> = (180..187)
            .map(|t| coord.tick(ExposureState::Normal, t as f64, &mut driver).unwrap().gate)
            .collect();
        assert_eq!(
            gates,
            vec![
                DetectionGate::Paused, // 180 opens
                DetectionGate::Paused,
                DetectionGate::Paused,
                DetectionGate::Seed, // 183 first tick after close
                DetectionGate::Run,
                DetectionGate::Run,
                DetectionGate::Run,
            ]
        );
    }

    #[test]
    fn test_failsafe_opens_when_poor_and_due() {
        let mut driver = AcceptAll::default();
        let mut coord = coordinator(&driver);

        // drain the first scheduled window at normal exposure
        for t in 0..5 {
            coord.tick(ExposureState::Normal, t as f64, &mut driver).unwrap();
        }

        let plan = coord.tick(ExposureState::Under, 10.0, &mut driver).unwrap();
        assert_eq!(plan.opened, Some(WindowTrigger::Failsafe));
        assert!(!plan.applied.is_empty());
        assert_eq!(plan.gate, DetectionGate::Paused);
    }

    #[test]
    fn test_applied_change_extends_pause() {
        let mut driver = AcceptAll::default();
        let mut coord = coordinator(&driver);

        coord.tick(ExposureState::Under, 0.0, &mut driver).unwrap();
        assert_eq!(coord.window().pause_until, Some(3.0));

        // debounce 1s: change at t=2 pushes the end to 5
        coord.tick(ExposureState::Under, 2.0, &mut driver).unwrap();
        assert_eq!(coord.window().pause_until, Some(5.0));
    }

    #[test]
    fn test_no_windows_when_disabled() {
        let mut driver = AcceptAll::default();
        let mut coord = coordinator(&driver);

        for t in 0..400 {
            let plan = coord
                .tick(ExposureState::Disabled, t as f64, &mut driver)
                .unwrap();
            assert!(plan.opened.is_none());
            assert_eq!(plan.gate, DetectionGate::Run);
        }
        assert_eq!(driver.calls, 0);
    }

    #[test]
    fn test_steppers_idle_outside_windows() {
        let mut driver = AcceptAll::default();
        let config = AdjustConfig {
            enabled: false,
            ..Default::default()
        };
        let mut coord = AdjustmentCoordinator::new(
            &config,
            CameraControlAdapter::new(&ControlsConfig::default(), &driver),
        );
        for t in 0..10 {
            coord.tick(ExposureState::Under, t as f64, &mut driver).unwrap();
        }
        assert_eq!(driver.calls, 0);
    }

    #[test]
    fn test_reseed_request_is_idempotent() {
        let mut driver = AcceptAll::default();
        let config = AdjustConfig {
            enabled: false,
            ..Default::default()
        };
        let mut coord = AdjustmentCoordinator::new(
            &config,
            CameraControlAdapter::new(&ControlsConfig::default(), &driver),
        );

        coord.request_reseed();
        coord.request_reseed();
        let first = coord.tick(ExposureState::Normal, 0.0, &mut driver).unwrap();
        let second = coord.tick(ExposureState::Normal, 1.0, &mut driver).unwrap();
        assert_eq!(first.gate, DetectionGate::Seed);
        assert_eq!(second.gate, DetectionGate::Run);
    }
}
