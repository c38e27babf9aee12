//! Mock camera implementation
//!
//! Implements `CameraDriver`, rendering a synthetic gray scene whose
//! brightness responds to the applied exposure controls. Used for testing and
//! dry runs without camera hardware.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use contracts::{CameraDriver, ControlKind, DriverError, DriverResult, ImageData, PixelFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Shutter time at which the scene renders at its nominal level (µs)
const REFERENCE_SHUTTER_US: f64 = 10_000.0;

/// Mock camera configuration
#[derive(Debug, Clone)]
pub struct MockCameraConfig {
    pub width: u32,
    pub height: u32,
    /// Gray8 or Rgb8 (gray replicated per channel)
    pub format: PixelFormat,
    /// Nominal background level at neutral exposure
    pub scene_level: f64,
    /// Uniform noise amplitude (± levels)
    pub noise_amplitude: u8,
    pub seed: u64,
    /// Controls reported by `supports()`
    pub capabilities: Vec<ControlKind>,
    pub auto_exposure: bool,
    /// Expose a luma plane through `luma()`
    pub luma: bool,
    /// Number of `start()` calls that fail before one succeeds
    pub start_failures: u32,
}

impl Default for MockCameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            format: PixelFormat::Rgb8,
            scene_level: 110.0,
            noise_amplitude: 2,
            seed: 42,
            capabilities: ControlKind::ALL.to_vec(),
            auto_exposure: true,
            luma: true,
            start_failures: 0,
        }
    }
}

/// Bright or dark patch rendered on top of the background
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub level: f64,
}

#[derive(Debug)]
struct SceneState {
    level: f64,
    rects: Vec<SceneRect>,
    faults: Vec<DriverError>,
    control_faults: Vec<DriverError>,
}

/// Shared handle used by tests to change the scene while the camera runs
#[derive(Debug, Clone)]
pub struct MockSceneHandle {
    inner: Arc<Mutex<SceneState>>,
}

impl MockSceneHandle {
    fn new(level: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SceneState {
                level,
                rects: Vec::new(),
                faults: Vec::new(),
                control_faults: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SceneState> {
        // a panicked test thread must not wedge the others
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Background light level at neutral exposure
    pub fn set_level(&self, level: f64) {
        self.lock().level = level;
    }

    pub fn add_rect(&self, rect: SceneRect) {
        self.lock().rects.push(rect);
    }

    pub fn clear_rects(&self) {
        self.lock().rects.clear();
    }

    /// The next `read()` returns this error
    pub fn inject_read_fault(&self, error: DriverError) {
        self.lock().faults.push(error);
    }

    /// The next `set_control()` returns this error
    pub fn inject_control_fault(&self, error: DriverError) {
        self.lock().control_faults.push(error);
    }
}

/// Call counters shared with tests
#[derive(Debug, Default)]
pub struct MockCameraStats {
    pub starts: AtomicU64,
    pub stops: AtomicU64,
    pub reads: AtomicU64,
    pub control_sets: AtomicU64,
}

impl MockCameraStats {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

/// Mock camera
pub struct MockCamera {
    config: MockCameraConfig,
    scene: MockSceneHandle,
    stats: Arc<MockCameraStats>,
    rng: StdRng,
    started: bool,
    start_failures_left: u32,
    bias: f64,
    gain: f64,
    shutter_us: f64,
    auto_exposure: bool,
    last_luma: Option<ImageData>,
}

impl MockCamera {
    /// Create new mock camera
    pub fn new(config: MockCameraConfig) -> Self {
        Self {
            scene: MockSceneHandle::new(config.scene_level),
            stats: Arc::new(MockCameraStats::default()),
            rng: StdRng::seed_from_u64(config.seed),
            started: false,
            start_failures_left: config.start_failures,
            bias: 0.0,
            gain: 1.0,
            shutter_us: REFERENCE_SHUTTER_US,
            auto_exposure: config.auto_exposure,
            last_luma: None,
            config,
        }
    }

    /// Create mock camera with default configuration
    pub fn with_defaults() -> Self {
        Self::new(MockCameraConfig::default())
    }

    pub fn scene(&self) -> MockSceneHandle {
        self.scene.clone()
    }

    pub fn stats(&self) -> Arc<MockCameraStats> {
        self.stats.clone()
    }

    /// Current `(bias, gain, shutter_us)`
    pub fn controls(&self) -> (f64, f64, f64) {
        (self.bias, self.gain, self.shutter_us)
    }

    pub fn auto_exposure_enabled(&self) -> bool {
        self.auto_exposure
    }

    /// Multiplier applied to scene light by the current controls
    fn exposure_factor(&self) -> f64 {
        let shutter = if self.auto_exposure {
            1.0
        } else {
            self.shutter_us / REFERENCE_SHUTTER_US
        };
        2f64.powf(self.bias) * self.gain * shutter
    }

    fn render_gray(&mut self) -> Vec<u8> {
        let (w, h) = (self.config.width, self.config.height);
        let factor = self.exposure_factor();
        let amplitude = self.config.noise_amplitude as i32;

        let (level, rects) = {
            let scene = self.scene.lock();
            (scene.level, scene.rects.clone())
        };

        let mut data = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let base = rects
                    .iter()
                    .rev()
                    .find(|r| x >= r.x && x < r.x + r.width && y >= r.y && y < r.y + r.height)
                    .map_or(level, |r| r.level);
                let noise = if amplitude > 0 {
                    self.rng.random_range(-amplitude..=amplitude)
                } else {
                    0
                };
                let v = (base * factor).round() as i32 + noise;
                data.push(v.clamp(0, 255) as u8);
            }
        }
        data
    }
}

impl CameraDriver for MockCamera {
    fn name(&self) -> &str {
        "mock"
    }

    fn start(&mut self) -> DriverResult<()> {
        self.stats.starts.fetch_add(1, Ordering::Relaxed);
        if self.start_failures_left > 0 {
            self.start_failures_left -= 1;
            return Err(DriverError::transient("mock camera busy"));
        }
        self.started = true;
        debug!(
            width = self.config.width,
            height = self.config.height,
            format = ?self.config.format,
            "mock camera started"
        );
        Ok(())
    }

    fn read(&mut self) -> DriverResult<Option<ImageData>> {
        if !self.started {
            return Err(DriverError::fatal("mock camera not started"));
        }
        if let Some(fault) = self.scene.lock().faults.pop() {
            if fault.is_fatal() {
                self.started = false;
            }
            return Err(fault);
        }
        self.stats.reads.fetch_add(1, Ordering::Relaxed);

        let (w, h) = (self.config.width, self.config.height);
        let gray = self.render_gray();
        if self.config.luma {
            self.last_luma = Some(ImageData::gray(w, h, gray.clone()));
        }

        let image = match self.config.format {
            PixelFormat::Gray8 => ImageData::gray(w, h, gray),
            PixelFormat::Rgb8 | PixelFormat::Bgr8 => {
                let data: Vec<u8> = gray.iter().flat_map(|&v| [v, v, v]).collect();
                ImageData::new(w, h, self.config.format, Bytes::from(data))
            }
        };
        trace!(factor = self.exposure_factor(), "mock frame rendered");
        Ok(Some(image))
    }

    fn stop(&mut self) -> DriverResult<()> {
        self.stats.stops.fetch_add(1, Ordering::Relaxed);
        self.started = false;
        debug!("mock camera stopped");
        Ok(())
    }

    fn luma(&mut self) -> Option<ImageData> {
        self.last_luma.clone()
    }

    fn supports(&self, control: ControlKind) -> bool {
        self.config.capabilities.contains(&control)
    }

    fn set_control(&mut self, control: ControlKind, value: f64) -> DriverResult<()> {
        if !self.supports(control) {
            return Err(DriverError::unsupported(control));
        }
        if let Some(fault) = self.scene.lock().control_faults.pop() {
            return Err(fault);
        }
        self.stats.control_sets.fetch_add(1, Ordering::Relaxed);
        match control {
            ControlKind::Bias => self.bias = value,
            ControlKind::Gain => self.gain = value,
            ControlKind::Shutter => self.shutter_us = value,
        }
        debug!(control = %control, value, "mock control set");
        Ok(())
    }

    fn set_auto_exposure(&mut self, enabled: bool) -> DriverResult<()> {
        self.auto_exposure = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_camera() -> MockCamera {
        MockCamera::new(MockCameraConfig {
            width: 16,
            height: 8,
            format: PixelFormat::Gray8,
            noise_amplitude: 0,
            ..Default::default()
        })
    }

    fn mean(image: &ImageData) -> f64 {
        image.data.iter().map(|&v| v as f64).sum::<f64>() / image.data.len() as f64
    }

    #[test]
    fn test_read_requires_start() {
        let mut cam = gray_camera();
        assert!(cam.read().unwrap_err().is_fatal());
        cam.start().unwrap();
        let frame = cam.read().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (16, 8));
        assert!(frame.validate().is_ok());
    }

    #[test]
    fn test_gain_brightens_scene() {
        let mut cam = gray_camera();
        cam.start().unwrap();
        let before = mean(&cam.read().unwrap().unwrap());
        cam.set_control(ControlKind::Gain, 2.0).unwrap();
        let after = mean(&cam.read().unwrap().unwrap());
        assert!(
            (after - 2.0 * before).abs() < 1.0,
            "Expected ~{}, got {}",
            2.0 * before,
            after
        );
    }

    #[test]
    fn test_shutter_only_matters_without_auto_exposure() {
        let mut cam = gray_camera();
        cam.start().unwrap();
        cam.set_control(ControlKind::Shutter, 20_000.0).unwrap();
        assert!((mean(&cam.read().unwrap().unwrap()) - 110.0).abs() < 1.0);

        cam.set_auto_exposure(false).unwrap();
        assert!((mean(&cam.read().unwrap().unwrap()) - 220.0).abs() < 1.0);
    }

    #[test]
    fn test_scene_rect_and_level() {
        let mut cam = gray_camera();
        let scene = cam.scene();
        cam.start().unwrap();

        scene.set_level(40.0);
        scene.add_rect(SceneRect {
            x: 0,
            y: 0,
            width: 4,
            height: 4,
            level: 200.0,
        });
        let frame = cam.read().unwrap().unwrap();
        assert_eq!(frame.data[0], 200);
        assert_eq!(frame.data[15], 40);

        scene.clear_rects();
        let frame = cam.read().unwrap().unwrap();
        assert_eq!(frame.data[0], 40);
    }

    #[test]
    fn test_capabilities_and_start_failures() {
        let mut cam = MockCamera::new(MockCameraConfig {
            capabilities: vec![ControlKind::Gain],
            start_failures: 2,
            ..Default::default()
        });
        assert!(cam.start().is_err());
        assert!(cam.start().is_err());
        assert!(cam.start().is_ok());
        assert_eq!(MockCameraStats::get(&cam.stats().starts), 3);

        assert!(!cam.supports(ControlKind::Bias));
        assert!(cam
            .set_control(ControlKind::Bias, 1.0)
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn test_injected_fatal_fault_stops_camera() {
        let mut cam = gray_camera();
        cam.start().unwrap();
        cam.scene().inject_read_fault(DriverError::fatal("cable"));
        assert!(cam.read().unwrap_err().is_fatal());
        assert!(cam.read().is_err());
        cam.start().unwrap();
        assert!(cam.read().unwrap().is_some());
    }

    #[test]
    fn test_rgb_output_and_luma() {
        let mut cam = MockCamera::with_defaults();
        cam.start().unwrap();
        let frame = cam.read().unwrap().unwrap();
        assert_eq!(frame.format, PixelFormat::Rgb8);
        assert_eq!(frame.data.len(), 320 * 240 * 3);

        let luma = cam.luma().unwrap();
        assert_eq!(luma.format, PixelFormat::Gray8);
        assert_eq!(luma.data[0], frame.data[0]);
    }
}
