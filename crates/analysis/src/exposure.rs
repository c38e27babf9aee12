//! Exposure estimator: EMA brightness statistics with hysteretic classification.
//!
//! Under is entered through the low `dark_enter_mean` threshold (or low-clip
//! fraction) and left only once the smoothed mean climbs past the higher
//! `dark_exit_mean`. Over has no hysteresis and wins ties.

use contracts::{ExposureConfig, ExposureMetrics, ExposureState};
use image::GrayImage;

/// Exposure estimator
#[derive(Debug, Clone)]
pub struct ExposureEstimator {
    config: ExposureConfig,
    /// `None` until the first sample, which seeds the EMA directly
    smoothed: Option<ExposureMetrics>,
    state: ExposureState,
}

impl ExposureEstimator {
    pub fn new(config: &ExposureConfig) -> Self {
        let state = if config.adaptive {
            ExposureState::Normal
        } else {
            ExposureState::Disabled
        };
        Self {
            config: config.clone(),
            smoothed: None,
            state,
        }
    }

    /// Instantaneous (unsmoothed) statistics of one frame
    pub fn measure(&self, gray: &GrayImage) -> ExposureMetrics {
        let total = gray.as_raw().len();
        if total == 0 {
            return ExposureMetrics::default();
        }

        let mut sum = 0u64;
        let mut low = 0usize;
        let mut high = 0usize;
        for &px in gray.as_raw() {
            sum += px as u64;
            if px <= self.config.low_cutoff {
                low += 1;
            }
            if px >= self.config.high_cutoff {
                high += 1;
            }
        }

        ExposureMetrics {
            mean: sum as f64 / total as f64,
            low_clip_frac: low as f64 / total as f64,
            high_clip_frac: high as f64 / total as f64,
        }
    }

    /// Measure a frame, fold it into the EMA and reclassify
    pub fn update(&mut self, gray: &GrayImage) -> ExposureState {
        let sample = self.measure(gray);
        self.observe(sample)
    }

    /// Fold an already measured sample into the EMA and reclassify
    pub fn observe(&mut self, sample: ExposureMetrics) -> ExposureState {
        let alpha = self.config.ema_alpha;
        let smoothed = match self.smoothed {
            None => sample,
            Some(prev) => ExposureMetrics {
                mean: ema(prev.mean, sample.mean, alpha),
                low_clip_frac: ema(prev.low_clip_frac, sample.low_clip_frac, alpha),
                high_clip_frac: ema(prev.high_clip_frac, sample.high_clip_frac, alpha),
            },
        };
        self.smoothed = Some(smoothed);

        if self.config.adaptive {
            self.state = self.classify(&smoothed);
        }
        self.state
    }

    pub fn state(&self) -> ExposureState {
        self.state
    }

    pub fn metrics(&self) -> ExposureMetrics {
        self.smoothed.unwrap_or_default()
    }

    fn classify(&self, m: &ExposureMetrics) -> ExposureState {
        let cfg = &self.config;

        let over = m.high_clip_frac > cfg.high_clip_frac || m.mean > cfg.bright_mean;
        let under = if self.state == ExposureState::Under {
            m.mean < cfg.dark_exit_mean
        } else {
            m.low_clip_frac > cfg.low_clip_frac || m.mean < cfg.dark_enter_mean
        };

        if over {
            ExposureState::Over
        } else if under {
            ExposureState::Under
        } else {
            ExposureState::Normal
        }
    }
}

fn ema(prev: f64, sample: f64, alpha: f64) -> f64 {
    (1.0 - alpha) * prev + alpha * sample
}
