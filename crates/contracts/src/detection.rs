//! Motion detector output types.

use serde::{Deserialize, Serialize};

/// Kind of reported region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Connected component of changed pixels
    Motion,
    /// Fallback when enough pixels changed but no component survived filtering
    FullFrame,
}

impl DetectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionKind::Motion => "motion",
            DetectionKind::FullFrame => "full_frame",
        }
    }
}

/// Changed region in original-frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    /// Changed pixels counted at detector resolution
    pub pixels: u32,

    pub kind: DetectionKind,
}

impl Region {
    /// Right edge (exclusive)
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }
}
