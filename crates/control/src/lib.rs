//! # Control
//!
//! Camera-side exposure feedback.
//!
//! 负责：
//! - 三个独立去抖的步进器 (bias / gain / shutter)
//! - 调整窗口调度: 定时窗口 + failsafe 窗口
//! - 调整期间暂停运动检测, 窗口结束后重新播种基线
//!
//! The coordinator never touches the motion detector directly; it returns a
//! [`TickPlan`] telling the caller whether to reset the baseline and how to
//! gate detection this tick.

mod adapter;
mod coordinator;
mod stepper;

pub use adapter::{AppliedChange, CameraControlAdapter};
pub use coordinator::{AdjustmentCoordinator, DetectionGate, TickPlan, WindowTrigger};
pub use stepper::Stepper;
