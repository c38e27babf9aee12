//! Arming gate - "armed now" predicate consulted once per tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Decides whether detection runs this tick.
///
/// Exposure, enhancement and control logic run regardless of the answer.
pub trait ArmingGate: Send + Sync {
    fn is_armed(&self, now: f64) -> bool;
}

/// Gate that is always armed
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysArmed;

impl ArmingGate for AlwaysArmed {
    fn is_armed(&self, _now: f64) -> bool {
        true
    }
}

/// Externally toggled gate; clones share the same flag
#[derive(Debug, Clone)]
pub struct ManualGate {
    armed: Arc<AtomicBool>,
}

impl ManualGate {
    pub fn new(armed: bool) -> Self {
        Self {
            armed: Arc::new(AtomicBool::new(armed)),
        }
    }

    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
    }
}

impl Default for ManualGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ArmingGate for ManualGate {
    fn is_armed(&self, _now: f64) -> bool {
        self.armed.load(Ordering::SeqCst)
    }
}
