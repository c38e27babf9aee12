//! FileSink - writes detection frames to disk
//!
//! Files are named `{local time}_{frame_id}.{ext}` so a directory listing is
//! in capture order. A `.json` sidecar with the regions and a `_boxes` copy
//! with the regions outlined sit next to each image.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::Local;
use contracts::{
    ContractError, FrameSink, ImageData, PixelFormat, Region, SaveImageFormat, SaveRequest,
};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;
use serde::Serialize;
use tracing::{debug, error, instrument};

/// Configuration for FileSink
#[derive(Debug, Clone)]
pub struct FileSinkConfig {
    /// Output directory, created if missing
    pub output_dir: PathBuf,
    pub image_format: SaveImageFormat,
    /// Write the regions sidecar
    pub write_regions: bool,
    /// Also write a copy with the regions drawn on it
    pub annotate: bool,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("captures"),
            image_format: SaveImageFormat::Png,
            write_regions: true,
            annotate: true,
        }
    }
}

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

#[derive(Serialize)]
struct RegionsSidecar<'a> {
    frame_id: u64,
    timestamp: f64,
    regions: &'a [Region],
}

/// Sink that writes detection frames as image files
pub struct FileSink {
    name: String,
    config: FileSinkConfig,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(name: impl Into<String>, config: FileSinkConfig) -> std::io::Result<Self> {
        fs::create_dir_all(&config.output_dir)?;

        Ok(Self {
            name: name.into(),
            config,
            written: Vec::new(),
        })
    }

    /// Image paths written so far
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn file_stem(frame_id: u64) -> String {
        format!("{}_{}", Local::now().format("%Y%m%d_%H%M%S%.3f"), frame_id)
    }

    fn write_to_disk(&mut self, request: &SaveRequest) -> std::io::Result<PathBuf> {
        let stem = Self::file_stem(request.frame.frame_id);
        let ext = self.config.image_format.extension();
        let target = match self.config.image_format {
            SaveImageFormat::Png => ImageFormat::Png,
            SaveImageFormat::Jpeg => ImageFormat::Jpeg,
        };

        let image = to_dynamic(&request.frame.image)?;
        let image_path = self.config.output_dir.join(format!("{stem}.{ext}"));
        save(&image, &image_path, target)?;

        if self.config.annotate {
            let boxes = annotate(&image, &request.regions);
            let boxes_path = self.config.output_dir.join(format!("{stem}_boxes.{ext}"));
            save(&DynamicImage::ImageRgb8(boxes), &boxes_path, target)?;
        }

        if self.config.write_regions {
            let sidecar = RegionsSidecar {
                frame_id: request.frame.frame_id,
                timestamp: request.frame.timestamp,
                regions: &request.regions,
            };
            let file = File::create(self.config.output_dir.join(format!("{stem}.json")))?;
            serde_json::to_writer(file, &sidecar)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        }

        Ok(image_path)
    }
}

fn to_dynamic(image: &ImageData) -> std::io::Result<DynamicImage> {
    let (w, h) = (image.width, image.height);
    let decoded = match image.format {
        PixelFormat::Gray8 => {
            GrayImage::from_raw(w, h, image.data.to_vec()).map(DynamicImage::ImageLuma8)
        }
        PixelFormat::Rgb8 => RgbImage::from_raw(w, h, image.data.to_vec()).map(DynamicImage::ImageRgb8),
        PixelFormat::Bgr8 => {
            let mut rgb = image.data.to_vec();
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            RgbImage::from_raw(w, h, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    decoded.ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("buffer too small for {w}x{h} {:?}", image.format),
        )
    })
}

/// RGB copy of `image` with each region outlined
fn annotate(image: &DynamicImage, regions: &[Region]) -> RgbImage {
    let mut canvas = image.to_rgb8();
    for r in regions.iter().filter(|r| r.width > 0 && r.height > 0) {
        let rect = Rect::at(r.x as i32, r.y as i32).of_size(r.width, r.height);
        draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
    }
    canvas
}

fn save(image: &DynamicImage, path: &Path, format: ImageFormat) -> std::io::Result<()> {
    image
        .save_with_format(path, format)
        .map_err(std::io::Error::other)
}

impl FrameSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "file_sink_save",
        skip(self, request),
        fields(sink = %self.name, frame_id = request.frame.frame_id)
    )]
    async fn save(&mut self, request: &SaveRequest) -> Result<(), ContractError> {
        request.frame.image.validate()?;
        match self.write_to_disk(request) {
            Ok(path) => {
                debug!(path = %path.display(), "Detection frame written");
                self.written.push(path);
                Ok(())
            }
            Err(e) => {
                error!(sink = %self.name, error = %e, "Write failed");
                Err(ContractError::sink_write(&self.name, e.to_string()))
            }
        }
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "file_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, files = self.written.len(), "FileSink closed");
        Ok(())
    }
}
