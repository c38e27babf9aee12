//! # Capture
//!
//! 采集编排模块。
//!
//! 负责：
//! - 每帧按顺序驱动 曝光估计 → 增强 → 调整协调/步进器 → 门控运动检测
//! - 检测节奏、告警冷却、保存节流
//! - 通过 watch 通道发布快照与最新帧
//! - 独立阻塞线程中的采集循环 (节拍、启动重试、协作式关闭)

mod error;
mod orchestrator;
mod publish;
mod runner;

pub use error::{CaptureError, Result};
pub use orchestrator::{CaptureOrchestrator, TickReport};
pub use publish::{Publisher, StatusReader};
pub use runner::{spawn_capture, RunStats, ServiceClock, ServiceHandle};

pub use control::{DetectionGate, WindowTrigger};
