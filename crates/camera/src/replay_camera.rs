//! Replay camera - plays recorded image files as a camera stream
//!
//! Reads every png/jpg/bmp file of a directory in file-name order. Exposure
//! controls are not supported, so all steppers disable themselves.

use std::path::{Path, PathBuf};

use contracts::{CameraDriver, DriverError, DriverResult, ImageData, PixelFormat};
use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::{CameraError, Result};

const EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Replay configuration
#[derive(Debug, Clone, Default)]
pub struct ReplayConfig {
    /// Start over after the last file
    pub loop_playback: bool,
}

/// Replay camera
pub struct ReplayCamera {
    dir: PathBuf,
    files: Vec<PathBuf>,
    config: ReplayConfig,
    index: usize,
    started: bool,
    last_luma: Option<ImageData>,
}

impl ReplayCamera {
    /// Index the image files of `dir`
    pub fn load(dir: &Path, config: ReplayConfig) -> Result<Self> {
        let entries =
            std::fs::read_dir(dir).map_err(|e| CameraError::replay_dir(dir, e.to_string()))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(CameraError::NoFrames {
                path: dir.to_path_buf(),
            });
        }

        info!(dir = %dir.display(), frames = files.len(), "Replay camera loaded");
        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            config,
            index: 0,
            started: false,
            last_luma: None,
        })
    }

    pub fn frame_count(&self) -> usize {
        self.files.len()
    }

    /// All files played and looping is off
    pub fn is_exhausted(&self) -> bool {
        !self.config.loop_playback && self.index >= self.files.len()
    }

    fn decode(path: &Path) -> DriverResult<ImageData> {
        let decoded = image::open(path)
            .map_err(|e| DriverError::transient(format!("{}: {e}", path.display())))?;

        Ok(match decoded {
            DynamicImage::ImageLuma8(gray) => {
                let (w, h) = gray.dimensions();
                ImageData::gray(w, h, gray.into_raw())
            }
            other => {
                let rgb = other.to_rgb8();
                let (w, h) = rgb.dimensions();
                ImageData::new(w, h, PixelFormat::Rgb8, rgb.into_raw())
            }
        })
    }
}

impl CameraDriver for ReplayCamera {
    fn name(&self) -> &str {
        "replay"
    }

    fn start(&mut self) -> DriverResult<()> {
        self.started = true;
        debug!(dir = %self.dir.display(), "replay started");
        Ok(())
    }

    fn read(&mut self) -> DriverResult<Option<ImageData>> {
        if !self.started {
            return Err(DriverError::fatal("replay camera not started"));
        }
        if self.index >= self.files.len() {
            if !self.config.loop_playback {
                return Ok(None);
            }
            self.index = 0;
        }

        let path = &self.files[self.index];
        self.index += 1;
        match Self::decode(path) {
            Ok(image) => {
                if image.format == PixelFormat::Gray8 {
                    self.last_luma = Some(image.clone());
                } else {
                    self.last_luma = None;
                }
                Ok(Some(image))
            }
            Err(e) => {
                warn!(error = %e, "Skipping unreadable replay frame");
                Err(e)
            }
        }
    }

    fn stop(&mut self) -> DriverResult<()> {
        self.started = false;
        Ok(())
    }

    fn luma(&mut self) -> Option<ImageData> {
        self.last_luma.clone()
    }
}
