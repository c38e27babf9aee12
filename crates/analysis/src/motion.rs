//! Motion detector: rolling-baseline frame differencing.
//!
//! Every non-gated `detect()` replaces the baseline with the current
//! preprocessed frame, so motion is measured between consecutive analysed
//! frames rather than against a fixed background. The first call after
//! construction, `reset()` or `seed()` only stores a baseline.

use contracts::{DetectionKind, ImageData, MotionConfig, Region};
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contrast::{self, ThresholdType};
use imageproc::map::map_colors2;
use tracing::{debug, warn};

use crate::image_ops::{downscale_and_blur, to_gray};
use crate::morphology::{connected_components, count_on, dilate, open};
use crate::{AnalysisError, Result};

/// Motion detector
pub struct MotionDetector {
    config: MotionConfig,
    baseline: Option<GrayImage>,
    ignore_mask: Option<GrayImage>,
    /// `ignore_mask` resized to the detector resolution
    scaled_mask: Option<GrayImage>,
    last_threshold: u8,
}

impl MotionDetector {
    /// Create a detector, loading the ignore mask file if one is configured
    pub fn new(config: &MotionConfig) -> Result<Self> {
        let ignore_mask = match &config.ignore_mask {
            Some(path) => {
                let mask = image::open(path)
                    .map_err(|e| AnalysisError::MaskLoad {
                        path: path.clone(),
                        message: e.to_string(),
                    })?
                    .to_luma8();
                debug!(path = ?path, width = mask.width(), height = mask.height(), "Ignore mask loaded");
                Some(mask)
            }
            None => None,
        };

        Ok(Self {
            config: config.clone(),
            baseline: None,
            ignore_mask,
            scaled_mask: None,
            last_threshold: config.base_threshold,
        })
    }

    /// Replace the ignore mask (non-zero = watch, zero = ignore)
    pub fn with_ignore_mask(mut self, mask: GrayImage) -> Self {
        self.ignore_mask = Some(mask);
        self.scaled_mask = None;
        self
    }

    pub fn is_seeded(&self) -> bool {
        self.baseline.is_some()
    }

    /// Binarization threshold used by the last comparison
    pub fn last_threshold(&self) -> u8 {
        self.last_threshold
    }

    /// Discard the baseline; the next `detect()` only seeds
    pub fn reset(&mut self) {
        self.baseline = None;
    }

    /// Store `image` as the baseline without comparing or reporting
    pub fn seed(&mut self, image: &ImageData) -> Result<()> {
        self.baseline = Some(self.preprocess(image)?);
        Ok(())
    }

    /// Grayscale, downscale and blur
    pub fn preprocess(&self, image: &ImageData) -> Result<GrayImage> {
        let gray = to_gray(image)?;
        Ok(downscale_and_blur(
            &gray,
            self.config.downscale,
            self.config.blur_kernel,
        ))
    }

    /// Compare against the baseline and report changed regions
    pub fn detect(&mut self, image: &ImageData) -> Result<Vec<Region>> {
        let current = self.preprocess(image)?;
        let previous = self.baseline.take();

        let diff = match &previous {
            Some(prev) if prev.dimensions() == current.dimensions() => abs_diff(prev, &current),
            Some(prev) => {
                debug!(
                    previous = ?prev.dimensions(),
                    current = ?current.dimensions(),
                    "Frame size changed, reseeding motion baseline"
                );
                self.baseline = Some(current);
                return Ok(Vec::new());
            }
            None => {
                self.baseline = Some(current);
                return Ok(Vec::new());
            }
        };
        self.baseline = Some(current);

        let threshold = self.threshold_for(&diff);
        self.last_threshold = threshold;
        metrics::gauge!("secam_motion_threshold").set(threshold as f64);

        let mut mask = contrast::threshold(&diff, threshold, ThresholdType::Binary);
        mask = dilate(&mask, self.config.dilate_iterations);
        if self.config.open {
            mask = open(&mask);
        }
        let mask = self.apply_ignore_mask(mask);

        let changed = count_on(&mask);
        if changed < self.config.min_changed_pixels {
            return Ok(Vec::new());
        }

        let (pw, ph) = mask.dimensions();
        let sx = image.width as f64 / pw as f64;
        let sy = image.height as f64 / ph as f64;

        let regions: Vec<Region> = connected_components(&mask)
            .into_iter()
            .filter(|c| c.pixels >= self.config.min_region_pixels)
            .map(|c| {
                let x = ((c.min_x as f64 * sx).floor() as u32).min(image.width);
                let y = ((c.min_y as f64 * sy).floor() as u32).min(image.height);
                let right = (((c.max_x + 1) as f64 * sx).ceil() as u32).min(image.width);
                let bottom = (((c.max_y + 1) as f64 * sy).ceil() as u32).min(image.height);
                Region {
                    x,
                    y,
                    width: right.saturating_sub(x),
                    height: bottom.saturating_sub(y),
                    pixels: c.pixels,
                    kind: DetectionKind::Motion,
                }
            })
            .collect();

        if regions.is_empty() {
            debug!(changed, threshold, "No component survived filtering, reporting full frame");
            return Ok(vec![Region {
                x: 0,
                y: 0,
                width: image.width,
                height: image.height,
                pixels: changed,
                kind: DetectionKind::FullFrame,
            }]);
        }

        Ok(regions)
    }

    /// `base + k·σ` over the centered ROI, clamped to `max_threshold`
    fn threshold_for(&self, diff: &GrayImage) -> u8 {
        let base = self.config.base_threshold;
        if !self.config.adaptive || self.config.noise_k <= 0.0 {
            return base;
        }

        let sigma = roi_std_dev(diff, self.config.roi_frac);
        let raised = base as f64 + self.config.noise_k * sigma;
        raised
            .round()
            .clamp(base as f64, self.config.max_threshold.max(base) as f64) as u8
    }

    fn apply_ignore_mask(&mut self, mask: GrayImage) -> GrayImage {
        let Some(ignore) = &self.ignore_mask else {
            return mask;
        };

        let dims = mask.dimensions();
        if self.scaled_mask.as_ref().map(|m| m.dimensions()) != Some(dims) {
            if ignore.dimensions() != dims {
                warn!(
                    mask = ?ignore.dimensions(),
                    detector = ?dims,
                    "Ignore mask resolution differs, resizing"
                );
            }
            self.scaled_mask = Some(imageops::resize(ignore, dims.0, dims.1, FilterType::Nearest));
        }

        match &self.scaled_mask {
            Some(scaled) => map_colors2(&mask, scaled, |p: Luma<u8>, keep: Luma<u8>| {
                if keep.0[0] == 0 { Luma([0]) } else { p }
            }),
            None => mask,
        }
    }
}

/// Per-pixel absolute difference; both images must share dimensions
fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    map_colors2(a, b, |p: Luma<u8>, q: Luma<u8>| Luma([p.0[0].abs_diff(q.0[0])]))
}

/// Standard deviation of `img` over a centered window covering `frac` of each axis
fn roi_std_dev(img: &GrayImage, frac: f64) -> f64 {
    let (w, h) = img.dimensions();
    let rw = ((w as f64 * frac).round() as u32).clamp(1, w.max(1));
    let rh = ((h as f64 * frac).round() as u32).clamp(1, h.max(1));
    let x0 = (w - rw) / 2;
    let y0 = (h - rh) / 2;

    let mut n = 0f64;
    let mut sum = 0f64;
    let mut sum_sq = 0f64;
    for y in y0..y0 + rh {
        for x in x0..x0 + rw {
            let v = img.get_pixel(x, y).0[0] as f64;
            n += 1.0;
            sum += v;
            sum_sq += v * v;
        }
    }
    if n == 0.0 {
        return 0.0;
    }
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0).sqrt()
}
