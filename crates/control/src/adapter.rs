//! Camera control adapter: the bias, gain and shutter steppers as one unit.

use contracts::{CameraDriver, ControlKind, ControlState, ControlsConfig, DriverResult, ExposureState};
use tracing::instrument;

use crate::Stepper;

/// One control change accepted by the driver
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AppliedChange {
    pub control: ControlKind,
    pub value: f64,
}

/// Camera control adapter
#[derive(Debug, Clone)]
pub struct CameraControlAdapter {
    steppers: Vec<Stepper>,
}

impl CameraControlAdapter {
    /// Build one stepper per control, probing the driver's capabilities once
    pub fn new(config: &ControlsConfig, driver: &dyn CameraDriver) -> Self {
        let steppers = ControlKind::ALL
            .iter()
            .map(|&kind| Stepper::new(kind, config.get(kind), driver))
            .collect();
        Self { steppers }
    }

    pub fn stepper(&self, kind: ControlKind) -> Option<&Stepper> {
        self.steppers.iter().find(|s| s.kind() == kind)
    }

    pub fn state(&self, kind: ControlKind) -> Option<ControlState> {
        self.stepper(kind).map(Stepper::state)
    }

    /// Current value, or `None` when the control is unknown
    pub fn value(&self, kind: ControlKind) -> Option<f64> {
        self.stepper(kind).map(Stepper::value)
    }

    pub fn shutter_manual(&self) -> bool {
        self.state(ControlKind::Shutter)
            .is_some_and(|s| s.manual_override)
    }

    /// Any stepper is past its debounce interval and would move
    pub fn any_wants_change(&self, state: ExposureState, now: f64) -> bool {
        self.steppers.iter().any(|s| s.wants_change(state, now))
    }

    /// Give every stepper one chance to move; each debounces independently.
    ///
    /// Only a `Fatal` driver error is returned.
    #[instrument(name = "control_step_all", skip(self, driver), level = "debug")]
    pub fn step_all(
        &mut self,
        state: ExposureState,
        now: f64,
        driver: &mut dyn CameraDriver,
    ) -> DriverResult<Vec<AppliedChange>> {
        let mut applied = Vec::new();
        for stepper in &mut self.steppers {
            if let Some(value) = stepper.step(state, now, driver)? {
                let control = stepper.kind();
                metrics::counter!("secam_control_changes_total", "control" => control.as_str())
                    .increment(1);
                applied.push(AppliedChange { control, value });
            }
        }
        Ok(applied)
    }
}
