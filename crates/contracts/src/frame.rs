//! Frame - 采集输出
//!
//! 每个 tick 由 Capture Orchestrator 独占的像素缓冲。

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::ContractError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 单通道亮度
    Gray8,
    Rgb8,
    Bgr8,
}

impl PixelFormat {
    /// Bytes per pixel
    pub fn channels(&self) -> usize {
        match self {
            PixelFormat::Gray8 => 1,
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => 3,
        }
    }
}

/// 图像数据
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// 图像宽度
    pub width: u32,

    /// 图像高度
    pub height: u32,

    /// 像素格式
    pub format: PixelFormat,

    /// 原始像素数据 (行优先, 无 padding)
    pub data: Bytes,
}

impl ImageData {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: impl Into<Bytes>) -> Self {
        Self {
            width,
            height,
            format,
            data: data.into(),
        }
    }

    /// Single-channel 8-bit image
    pub fn gray(width: u32, height: u32, data: impl Into<Bytes>) -> Self {
        Self::new(width, height, PixelFormat::Gray8, data)
    }

    /// Uniform gray image
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self::gray(width, height, vec![value; width as usize * height as usize])
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Byte length implied by dimensions and format
    pub fn expected_len(&self) -> usize {
        self.pixel_count() * self.format.channels()
    }

    /// Check that the buffer matches the declared geometry
    pub fn validate(&self) -> Result<(), ContractError> {
        if self.width == 0 || self.height == 0 {
            return Err(ContractError::invalid_image(format!(
                "empty image {}x{}",
                self.width, self.height
            )));
        }
        if self.data.len() != self.expected_len() {
            return Err(ContractError::invalid_image(format!(
                "buffer length {} does not match {}x{} {:?} ({} bytes)",
                self.data.len(),
                self.width,
                self.height,
                self.format,
                self.expected_len()
            )));
        }
        Ok(())
    }
}

/// 单帧
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    /// 会话内采集序号
    pub frame_id: u64,

    /// 服务时钟 (seconds, f64)
    pub timestamp: f64,

    /// 处理后的图像 (旋转/增强之后)
    pub image: ImageData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_matching_buffer() {
        let img = ImageData::new(4, 2, PixelFormat::Rgb8, vec![0u8; 24]);
        assert!(img.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_buffer() {
        let img = ImageData::gray(4, 4, vec![0u8; 10]);
        assert!(matches!(
            img.validate(),
            Err(ContractError::InvalidImage { .. })
        ));
    }

    #[test]
    fn test_filled_gray() {
        let img = ImageData::filled(3, 3, 7);
        assert_eq!(img.data.len(), 9);
        assert!(img.data.iter().all(|&p| p == 7));
    }
}
