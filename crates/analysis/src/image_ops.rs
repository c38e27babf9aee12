//! Pixel-buffer helpers bridging `ImageData` and the `image` crate.

use contracts::{ImageData, PixelFormat};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, RgbImage};

use crate::{AnalysisError, Result};

/// Convert any supported frame to an 8-bit grayscale image
pub fn to_gray(image: &ImageData) -> Result<GrayImage> {
    image.validate()?;
    match image.format {
        PixelFormat::Gray8 => gray_from_raw(image.width, image.height, image.data.to_vec()),
        PixelFormat::Rgb8 => {
            let rgb = rgb_from_raw(image.width, image.height, image.data.to_vec())?;
            Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
        }
        PixelFormat::Bgr8 => {
            let mut data = image.data.to_vec();
            for px in data.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            let rgb = rgb_from_raw(image.width, image.height, data)?;
            Ok(DynamicImage::ImageRgb8(rgb).to_luma8())
        }
    }
}

/// Wrap a grayscale buffer back into an `ImageData`
pub fn from_gray(gray: GrayImage) -> ImageData {
    let (width, height) = gray.dimensions();
    ImageData::gray(width, height, gray.into_raw())
}

/// Rotate clockwise by 0/90/180/270 degrees, keeping the pixel format
pub fn rotate(image: &ImageData, degrees: u32) -> Result<ImageData> {
    if degrees % 360 == 0 {
        return Ok(image.clone());
    }
    image.validate()?;

    match image.format {
        PixelFormat::Gray8 => {
            let gray = gray_from_raw(image.width, image.height, image.data.to_vec())?;
            let rotated = match degrees % 360 {
                90 => imageops::rotate90(&gray),
                180 => imageops::rotate180(&gray),
                270 => imageops::rotate270(&gray),
                other => return Err(unsupported_rotation(other)),
            };
            Ok(from_gray(rotated))
        }
        // rotation does not care about channel order
        PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
            let rgb = rgb_from_raw(image.width, image.height, image.data.to_vec())?;
            let rotated = match degrees % 360 {
                90 => imageops::rotate90(&rgb),
                180 => imageops::rotate180(&rgb),
                270 => imageops::rotate270(&rgb),
                other => return Err(unsupported_rotation(other)),
            };
            let (width, height) = rotated.dimensions();
            Ok(ImageData::new(width, height, image.format, rotated.into_raw()))
        }
    }
}

/// Downscale by `ratio` (no-op at 1.0) and blur with an odd `kernel`
pub fn downscale_and_blur(gray: &GrayImage, ratio: f64, kernel: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let scaled = if ratio < 1.0 {
        let w = ((width as f64 * ratio).round() as u32).max(1);
        let h = ((height as f64 * ratio).round() as u32).max(1);
        imageops::resize(gray, w, h, FilterType::Triangle)
    } else {
        gray.clone()
    };

    if kernel <= 1 {
        return scaled;
    }
    imageops::blur(&scaled, kernel_sigma(kernel))
}

/// Gaussian sigma matching a square kernel of side `kernel`
fn kernel_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn gray_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<GrayImage> {
    GrayImage::from_raw(width, height, data)
        .ok_or_else(|| AnalysisError::conversion(format!("gray buffer for {width}x{height}")))
}

fn rgb_from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<RgbImage> {
    RgbImage::from_raw(width, height, data)
        .ok_or_else(|| AnalysisError::conversion(format!("rgb buffer for {width}x{height}")))
}

fn unsupported_rotation(degrees: u32) -> AnalysisError {
    AnalysisError::conversion(format!("unsupported rotation {degrees} degrees"))
}
