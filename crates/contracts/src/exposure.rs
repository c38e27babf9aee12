//! Exposure estimator output types.

use serde::{Deserialize, Serialize};

/// EMA-smoothed brightness statistics.
///
/// `mean` is in [0, 255]; both fractions are in [0, 1].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExposureMetrics {
    pub mean: f64,
    pub low_clip_frac: f64,
    pub high_clip_frac: f64,
}

/// Hysteretic exposure classification
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureState {
    /// Adaptive behavior switched off
    #[default]
    Disabled,
    Normal,
    Under,
    Over,
}

impl ExposureState {
    /// Under or Over
    pub fn is_poor(&self) -> bool {
        matches!(self, ExposureState::Under | ExposureState::Over)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureState::Disabled => "disabled",
            ExposureState::Normal => "normal",
            ExposureState::Under => "under",
            ExposureState::Over => "over",
        }
    }
}

impl std::fmt::Display for ExposureState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
