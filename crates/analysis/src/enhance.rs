//! Enhancement blender: smoothly varying contrast/brightness correction.

use contracts::{EnhanceConfig, ExposureState, ImageData};

const IDENTITY: (f64, f64) = (1.0, 0.0);

/// Tracks the current `(alpha, beta)` and eases it toward the target chosen
/// from the exposure state.
///
/// Every Under/Over tick pushes the hold deadline out by `hold_sec`; a return
/// to Normal inside the hold window keeps the previous target.
#[derive(Debug, Clone)]
pub struct EnhancementBlender {
    config: EnhanceConfig,
    alpha: f64,
    beta: f64,
    target: (f64, f64),
    hold_until: Option<f64>,
}

impl EnhancementBlender {
    pub fn new(config: &EnhanceConfig) -> Self {
        Self {
            config: config.clone(),
            alpha: IDENTITY.0,
            beta: IDENTITY.1,
            target: IDENTITY,
            hold_until: None,
        }
    }

    /// Advance one tick and return the blended `(alpha, beta)`
    pub fn update(&mut self, state: ExposureState, now: f64) -> (f64, f64) {
        match self.preset_for(state) {
            Some(preset) => {
                self.target = preset;
                self.hold_until = Some(now + self.config.hold_sec);
            }
            None => {
                let holding = self.hold_until.is_some_and(|until| now < until);
                if !holding {
                    self.target = IDENTITY;
                    self.hold_until = None;
                }
            }
        }

        let rate = self.config.blend_rate;
        self.alpha += rate * (self.target.0 - self.alpha);
        self.beta += rate * (self.target.1 - self.beta);
        (self.alpha, self.beta)
    }

    pub fn current(&self) -> (f64, f64) {
        (self.alpha, self.beta)
    }

    pub fn target(&self) -> (f64, f64) {
        self.target
    }

    /// Close enough to identity that applying it would not change any pixel
    pub fn is_identity(&self) -> bool {
        (self.alpha - 1.0).abs() < 1e-3 && self.beta.abs() < 0.5
    }

    /// Apply the current transform to every channel, clamped to [0, 255]
    pub fn apply(&self, image: &ImageData) -> ImageData {
        if self.is_identity() {
            return image.clone();
        }

        let lut = self.lookup_table();
        let data: Vec<u8> = image.data.iter().map(|&px| lut[px as usize]).collect();
        ImageData::new(image.width, image.height, image.format, data)
    }

    fn lookup_table(&self) -> [u8; 256] {
        let mut lut = [0u8; 256];
        for (i, slot) in lut.iter_mut().enumerate() {
            let v = self.alpha * i as f64 + self.beta;
            *slot = v.round().clamp(0.0, 255.0) as u8;
        }
        lut
    }

    fn preset_for(&self, state: ExposureState) -> Option<(f64, f64)> {
        match state {
            ExposureState::Under if self.config.on_under => {
                Some((self.config.under_alpha, self.config.under_beta))
            }
            ExposureState::Over if self.config.on_over => {
                Some((self.config.over_alpha, self.config.over_beta))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blender() -> EnhancementBlender {
        EnhancementBlender::new(&EnhanceConfig::default())
    }

    #[test]
    fn test_monotonic_approach_to_under_target() {
        let mut b = blender();
        let mut prev = b.current();
        for tick in 0..30 {
            let (alpha, beta) = b.update(ExposureState::Under, tick as f64 * 0.1);
            assert!(alpha >= prev.0 && alpha <= 2.5, "alpha {alpha} after {prev:?}");
            assert!(beta >= prev.1 && beta <= 20.0, "beta {beta} after {prev:?}");
            prev = (alpha, beta);
        }
        assert!((prev.0 - 2.5).abs() < 0.01, "Expected ~2.5, got {}", prev.0);
    }

    #[test]
    fn test_hold_keeps_target_after_return_to_normal() {
        let mut b = blender();
        b.update(ExposureState::Over, 10.0);

        // within 1.5s hold
        b.update(ExposureState::Normal, 10.5);
        assert_eq!(b.target(), (0.85, -10.0));
        b.update(ExposureState::Normal, 11.4);
        assert_eq!(b.target(), (0.85, -10.0));

        // hold elapsed
        b.update(ExposureState::Normal, 11.6);
        assert_eq!(b.target(), (1.0, 0.0));
    }

    #[test]
    fn test_hold_extends_on_every_poor_tick() {
        let mut b = blender();
        b.update(ExposureState::Under, 0.0);
        b.update(ExposureState::Under, 1.0);
        b.update(ExposureState::Normal, 2.0);
        assert_eq!(b.target(), (2.5, 20.0));
    }

    #[test]
    fn test_disabled_preset_is_identity() {
        let config = EnhanceConfig {
            on_under: false,
            ..Default::default()
        };
        let mut b = EnhancementBlender::new(&config);
        for tick in 0..5 {
            b.update(ExposureState::Under, tick as f64);
        }
        assert!(b.is_identity());
    }

    #[test]
    fn test_apply_clamps_range() {
        let mut b = blender();
        for tick in 0..40 {
            b.update(ExposureState::Under, tick as f64 * 0.1);
        }
        let img = ImageData::gray(3, 1, vec![0u8, 50, 200]);
        let out = b.apply(&img);

        // 2.5*0+20 = 20, 2.5*50+20 = 145, 2.5*200+20 clamps
        assert!(out.data[0].abs_diff(20) <= 1);
        assert!(out.data[1].abs_diff(145) <= 2);
        assert_eq!(out.data[2], 255);
    }

    #[test]
    fn test_identity_apply_is_passthrough() {
        let b = blender();
        let img = ImageData::gray(2, 1, vec![7u8, 9]);
        assert_eq!(b.apply(&img).data, img.data);
    }
}
