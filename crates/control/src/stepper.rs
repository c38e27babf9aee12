//! Debounced single-control stepper.

use contracts::{
    CameraDriver, ControlKind, ControlState, DriverError, DriverResult, ExposureState,
    StepperConfig,
};
use tracing::{debug, info, warn};

/// Changes smaller than this are not sent to the driver
const EPSILON: f64 = 1e-6;

/// Nudges one camera control toward correcting the exposure state.
///
/// `Under` moves toward `max`, `Over` toward `min`, `Normal` back toward the
/// baseline by `return_step` without overshooting. The value only changes
/// after the driver accepted it, and never leaves `[min, max]`.
#[derive(Debug, Clone)]
pub struct Stepper {
    kind: ControlKind,
    config: StepperConfig,
    state: ControlState,
    /// Cleared for the rest of the session once the driver reports `Unsupported`
    active: bool,
}

impl Stepper {
    pub fn new(kind: ControlKind, config: &StepperConfig, driver: &dyn CameraDriver) -> Self {
        let supported = driver.supports(kind);
        if config.enabled && !supported {
            info!(control = %kind, driver = driver.name(), "Control not supported, stepper disabled");
        }
        let baseline = config.baseline.clamp(config.min, config.max);
        Self {
            kind,
            config: config.clone(),
            state: ControlState::new(baseline),
            active: config.enabled && supported,
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub fn value(&self) -> f64 {
        self.state.value
    }

    /// Debounce interval has elapsed (or nothing was ever applied)
    pub fn is_due(&self, now: f64) -> bool {
        self.active
            && self
                .state
                .last_update
                .is_none_or(|last| now - last >= self.config.min_update_interval_sec)
    }

    /// Value this stepper would move to for `state`, if it differs from the current one
    pub fn propose(&self, state: ExposureState) -> Option<f64> {
        let cfg = &self.config;
        let current = self.state.value;

        let next = match state {
            ExposureState::Under => (current + cfg.step).min(cfg.max),
            ExposureState::Over => (current - cfg.step).max(cfg.min),
            ExposureState::Normal => {
                let delta = cfg.baseline - current;
                current + delta.clamp(-cfg.return_step, cfg.return_step)
            }
            ExposureState::Disabled => return None,
        };
        let next = next.clamp(cfg.min, cfg.max);

        ((next - current).abs() > EPSILON).then_some(next)
    }

    /// Due and would actually move
    pub fn wants_change(&self, state: ExposureState, now: f64) -> bool {
        self.is_due(now) && self.propose(state).is_some()
    }

    /// Run one adjustment step.
    ///
    /// Returns the new value when a change was applied. `Unsupported`
    /// disables the stepper and `Transient` leaves state untouched; only
    /// `Fatal` is returned as an error.
    pub fn step(
        &mut self,
        state: ExposureState,
        now: f64,
        driver: &mut dyn CameraDriver,
    ) -> DriverResult<Option<f64>> {
        if !self.is_due(now) {
            return Ok(None);
        }

        let Some(next) = self.propose(state) else {
            if self.kind == ControlKind::Shutter && state != ExposureState::Under {
                self.maybe_restore_auto_exposure(driver)?;
            }
            return Ok(None);
        };

        if self.kind == ControlKind::Shutter
            && self.raised_above_baseline(next)
            && !self.state.manual_override
        {
            // manual shutter requires the driver's own AE loop to be off
            if let Err(e) = driver.set_auto_exposure(false) {
                self.absorb(e, "set_auto_exposure(false)")?;
            }
        }

        match driver.set_control(self.kind, next) {
            Ok(()) => {
                let from = self.state.value;
                self.state.value = next;
                self.state.last_update = Some(now);
                debug!(control = %self.kind, from, to = next, ?state, "Control applied");

                if self.kind == ControlKind::Shutter {
                    if self.raised_above_baseline(next) {
                        self.state.manual_override = true;
                    } else {
                        self.maybe_restore_auto_exposure(driver)?;
                    }
                }
                Ok(Some(next))
            }
            Err(e) => {
                self.absorb(e, "set_control")?;
                Ok(None)
            }
        }
    }

    /// Manual exposure only covers shutter values raised past baseline
    fn raised_above_baseline(&self, value: f64) -> bool {
        value > self.config.baseline + self.config.return_step + EPSILON
    }

    /// Hand exposure back to the driver once the shutter is no longer raised
    fn maybe_restore_auto_exposure(&mut self, driver: &mut dyn CameraDriver) -> DriverResult<()> {
        if !self.state.manual_override || self.raised_above_baseline(self.state.value) {
            return Ok(());
        }

        match driver.set_auto_exposure(true) {
            Ok(()) => {
                info!(shutter_us = self.state.value, "Shutter back at baseline, auto exposure restored");
                self.state.manual_override = false;
                Ok(())
            }
            Err(e) if e.is_unsupported() => {
                self.state.manual_override = false;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "Auto exposure restore failed, will retry");
                Ok(())
            }
        }
    }

    fn absorb(&mut self, error: DriverError, call: &str) -> DriverResult<()> {
        match error {
            DriverError::Unsupported { .. } => {
                if call == "set_control" {
                    info!(control = %self.kind, "Driver rejected control as unsupported, stepper disabled");
                    self.active = false;
                }
                Ok(())
            }
            DriverError::Transient { ref message } => {
                warn!(control = %self.kind, call, error = %message, "Control update failed");
                Ok(())
            }
            DriverError::Fatal { .. } => Err(error),
        }
    }
}
