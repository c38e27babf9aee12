//! Camera control and adjustment-window state.

use serde::{Deserialize, Serialize};

/// Physical exposure control exposed by the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Exposure-value offset (EV)
    Bias,
    /// Analog gain
    Gain,
    /// Shutter time in microseconds
    Shutter,
}

impl ControlKind {
    pub const ALL: [ControlKind; 3] = [ControlKind::Bias, ControlKind::Gain, ControlKind::Shutter];

    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::Bias => "bias",
            ControlKind::Gain => "gain",
            ControlKind::Shutter => "shutter",
        }
    }
}

impl std::fmt::Display for ControlKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-control runtime state.
///
/// `value` stays within the configured range and only changes after the
/// driver accepted the new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    pub value: f64,

    /// Service time of the last applied change
    pub last_update: Option<f64>,

    /// Shutter only: manual exposure is in effect
    pub manual_override: bool,
}

impl ControlState {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            last_update: None,
            manual_override: false,
        }
    }
}

/// Detector pause bookkeeping owned by the adjustment coordinator
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentWindow {
    /// Next scheduled window opening; `None` until the first tick
    pub next_scheduled: Option<f64>,

    /// Detection is paused while `now < pause_until`
    pub pause_until: Option<f64>,

    /// The detector must be seeded once the window closes
    pub reseed_pending: bool,
}

impl AdjustmentWindow {
    pub fn is_paused(&self, now: f64) -> bool {
        self.pause_until.is_some_and(|until| now < until)
    }
}
