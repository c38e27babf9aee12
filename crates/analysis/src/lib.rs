//! # Analysis
//!
//! 单帧图像分析 (纯计算, 无 I/O 线程)。
//!
//! 负责：
//! - 曝光估计: EMA 平滑亮度统计 + 迟滞分类
//! - 增强混合: 平滑变化的线性亮度/对比度校正
//! - 运动检测: 滚动基线差分, 噪声自适应阈值, reset/seed 协议
//!
//! ## 使用示例
//!
//! ```ignore
//! use analysis::{ExposureEstimator, EnhancementBlender, MotionDetector};
//!
//! let mut estimator = ExposureEstimator::new(&config.exposure);
//! let mut blender = EnhancementBlender::new(&config.enhance);
//! let mut detector = MotionDetector::new(&config.motion)?;
//!
//! let gray = image_ops::to_gray(&frame)?;
//! let state = estimator.update(&gray);
//! blender.update(state, now);
//! let enhanced = blender.apply(&frame);
//! let regions = detector.detect(&enhanced)?;
//! ```

mod enhance;
mod error;
mod exposure;
pub mod image_ops;
mod morphology;
mod motion;

pub use enhance::EnhancementBlender;
pub use error::{AnalysisError, Result};
pub use exposure::ExposureEstimator;
pub use morphology::{connected_components, dilate, open, Component};
pub use motion::MotionDetector;

// Re-export contracts types
pub use contracts::{DetectionKind, ExposureMetrics, ExposureState, ImageData, Region};
