//! Analysis 错误类型

use std::path::PathBuf;

use contracts::ContractError;
use thiserror::Error;

/// Analysis 错误
///
/// 在 tick 边界被捕获并视为"本帧无检测", 不会终止采集循环。
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 像素缓冲与声明的尺寸/格式不符
    #[error(transparent)]
    InvalidImage(#[from] ContractError),

    /// 图像缓冲转换失败
    #[error("image conversion failed: {message}")]
    Conversion {
        /// 错误消息
        message: String,
    },

    /// 忽略掩码加载失败
    #[error("failed to load ignore mask {path:?}: {message}")]
    MaskLoad {
        /// 掩码路径
        path: PathBuf,
        /// 错误消息
        message: String,
    },
}

impl AnalysisError {
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }
}

/// Analysis Result 类型别名
pub type Result<T> = std::result::Result<T, AnalysisError>;
