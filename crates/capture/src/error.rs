//! Capture 错误类型

use analysis::AnalysisError;
use contracts::DriverError;
use thiserror::Error;

/// Capture 错误
#[derive(Debug, Error)]
pub enum CaptureError {
    /// 相机驱动错误 (只有 Fatal 会传到这里)
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// 帧无法处理 (缓冲损坏、旋转失败)
    #[error("frame processing failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// 采集线程未在限定时间内退出
    #[error("capture loop did not stop within {timeout_sec}s")]
    ShutdownTimeout { timeout_sec: f64 },

    /// 采集线程 panic
    #[error("capture loop panicked: {message}")]
    Join { message: String },

    /// 快照发布端已关闭
    #[error("status publisher closed")]
    PublisherClosed,
}

/// Capture Result 类型别名
pub type Result<T> = std::result::Result<T, CaptureError>;
