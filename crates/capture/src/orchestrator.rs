//! Capture orchestrator: one call to [`CaptureOrchestrator::tick`] takes one
//! frame through every stage, in a fixed order:
//!
//! rotate/mono → exposure estimate → enhancement → adjustment coordinator and
//! steppers → gated motion detection → alert/save → publish.
//!
//! The orchestrator never reads the clock or the camera itself; the runner
//! passes both in, so tests can drive it with an explicit timeline.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use analysis::{image_ops, AnalysisError, EnhancementBlender, ExposureEstimator, MotionDetector};
use contracts::{
    ArmingGate, CameraConfig, CameraDriver, CameraProfile, ControlKind, DetectConfig,
    DetectionKind, ExposureState, Frame, ImageData, PixelFormat, Region, SaveConfig, SaveRequest,
    ServiceConfig, ServiceSnapshot,
};
use control::{AdjustmentCoordinator, CameraControlAdapter, DetectionGate, WindowTrigger};
use dispatcher::SinkHandle;
use image::GrayImage;
use tracing::{debug, info, instrument, warn};

use crate::publish::{Publisher, StatusReader};
use crate::Result;

/// What happened during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub frame_id: u64,
    pub exposure_state: ExposureState,
    pub gate: DetectionGate,

    /// `detect()` was called (armed, unpaused, on cadence)
    pub detected: bool,

    pub regions: Vec<Region>,

    /// A save request was accepted by the sink queue
    pub saved: bool,

    pub window_opened: Option<WindowTrigger>,
}

/// Capture orchestrator
pub struct CaptureOrchestrator {
    camera: CameraConfig,
    detect: DetectConfig,
    save: SaveConfig,

    estimator: ExposureEstimator,
    blender: EnhancementBlender,
    detector: MotionDetector,
    coordinator: AdjustmentCoordinator,
    gate: Arc<dyn ArmingGate>,
    sink: Option<SinkHandle>,
    publisher: Publisher,

    total_frames: u64,
    last_tick_ts: Option<f64>,
    armed: bool,
    detecting: bool,
    last_detection_ts: Option<f64>,
    last_save_ts: Option<f64>,
    saved_images: u64,
    detection_counts: BTreeMap<DetectionKind, u64>,
}

impl CaptureOrchestrator {
    /// Build every stage from one configuration.
    ///
    /// `driver` is only probed for control capabilities here.
    pub fn new(
        config: &ServiceConfig,
        driver: &dyn CameraDriver,
        gate: Arc<dyn ArmingGate>,
    ) -> Result<Self> {
        let adapter = CameraControlAdapter::new(&config.controls, driver);
        for kind in ControlKind::ALL {
            let active = adapter.stepper(kind).is_some_and(|s| s.is_active());
            debug!(control = %kind, active, driver = driver.name(), "Control stepper");
        }

        Ok(Self {
            camera: config.camera.clone(),
            detect: config.detect.clone(),
            save: config.save.clone(),
            estimator: ExposureEstimator::new(&config.exposure),
            blender: EnhancementBlender::new(&config.enhance),
            detector: MotionDetector::new(&config.motion)?,
            coordinator: AdjustmentCoordinator::new(&config.adjust, adapter),
            gate,
            sink: None,
            publisher: Publisher::new(),
            total_frames: 0,
            last_tick_ts: None,
            armed: false,
            detecting: false,
            last_detection_ts: None,
            last_save_ts: None,
            saved_images: 0,
            detection_counts: BTreeMap::new(),
        })
    }

    /// Attach the save worker
    pub fn with_sink(mut self, sink: SinkHandle) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn subscribe(&self) -> StatusReader {
        self.publisher.subscribe()
    }

    pub fn coordinator(&self) -> &AdjustmentCoordinator {
        &self.coordinator
    }

    pub fn detector(&self) -> &MotionDetector {
        &self.detector
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Give back the save worker so it can be drained on shutdown
    pub fn into_sink(self) -> Option<SinkHandle> {
        self.sink
    }

    /// Process one frame captured at `now` (service clock, seconds).
    ///
    /// Detection faults are logged and count as "no detections". Returns an
    /// error only for an unusable frame or a `Fatal` driver error from a
    /// control write.
    #[instrument(
        name = "capture_tick",
        skip(self, raw, driver),
        fields(frame_id = self.total_frames),
        level = "debug"
    )]
    pub fn tick(
        &mut self,
        raw: ImageData,
        now: f64,
        driver: &mut dyn CameraDriver,
    ) -> Result<TickReport> {
        let frame_id = self.total_frames;
        self.check_idle_gap(now);

        let armed = self.gate.is_armed(now);
        if armed && !self.armed {
            // baseline from before disarming is stale
            self.detector.reset();
            self.coordinator.request_reseed();
            info!(frame_id, "Armed, detector will reseed");
        } else if !armed && self.armed {
            info!(frame_id, "Disarmed, detection suspended");
        }
        self.armed = armed;

        let frame = self.prepare(&raw)?;
        let gray = self.exposure_source(&frame, driver)?;
        let state = self.estimator.update(&gray);

        self.blender.update(state, now);
        let enhanced = self.blender.apply(&frame);

        let plan = self.coordinator.tick(state, now, driver)?;
        if plan.reset_detector {
            self.detector.reset();
        }

        let stride = self.stride_for(state);
        let mut detected = false;
        let mut regions = Vec::new();
        match plan.gate {
            DetectionGate::Paused => {}
            DetectionGate::Seed => match self.detector.seed(&enhanced) {
                Ok(()) => debug!(frame_id, "Detector baseline seeded"),
                Err(e) => warn!(frame_id, error = %e, "Detector seed failed"),
            },
            DetectionGate::Run if armed && frame_id % u64::from(stride) == 0 => {
                detected = true;
                regions = self.detector.detect(&enhanced).unwrap_or_else(|e| {
                    warn!(frame_id, error = %e, "Motion detection failed, no detections this tick");
                    Vec::new()
                });
            }
            DetectionGate::Run => {}
        }

        let frame = Frame {
            frame_id,
            timestamp: now,
            image: enhanced,
        };

        let saved = if regions.is_empty() {
            false
        } else {
            self.on_detection(&frame, &regions, now)
        };

        if self.detecting
            && self
                .last_detection_ts
                .is_some_and(|t| now - t >= self.detect.alert_cooldown_sec)
        {
            self.detecting = false;
            debug!(frame_id, "Alert cooldown elapsed");
        }

        self.total_frames += 1;
        self.last_tick_ts = Some(now);
        self.publish(frame, state, stride, now);

        Ok(TickReport {
            frame_id,
            exposure_state: state,
            gate: plan.gate,
            detected,
            regions,
            saved,
            window_opened: plan.opened,
        })
    }

    /// A long gap between frames (camera restart, stall) makes the baseline stale
    fn check_idle_gap(&mut self, now: f64) {
        let limit = self.detect.reseed_after_idle_sec;
        if limit <= 0.0 {
            return;
        }
        if let Some(last) = self.last_tick_ts {
            let gap = now - last;
            if gap > limit {
                info!(gap_sec = gap, "Frame gap exceeded idle limit, reseeding detector");
                self.detector.reset();
                self.coordinator.request_reseed();
            }
        }
    }

    /// Rotate and, for the NoIR profile, render mono
    fn prepare(&self, raw: &ImageData) -> Result<ImageData> {
        raw.validate().map_err(AnalysisError::from)?;
        let rotated = image_ops::rotate(raw, self.camera.rotate_degrees)?;
        if self.camera.profile == CameraProfile::Noir && rotated.format != PixelFormat::Gray8 {
            return Ok(image_ops::from_gray(image_ops::to_gray(&rotated)?));
        }
        Ok(rotated)
    }

    /// Prefer the driver's luma plane; fall back to the frame itself
    fn exposure_source(
        &self,
        frame: &ImageData,
        driver: &mut dyn CameraDriver,
    ) -> Result<GrayImage> {
        if self.camera.use_luma {
            if let Some(luma) = driver.luma() {
                match image_ops::to_gray(&luma) {
                    Ok(gray) => return Ok(gray),
                    Err(e) => debug!(error = %e, "Luma plane unusable, using frame"),
                }
            }
        }
        Ok(image_ops::to_gray(frame)?)
    }

    /// Detection cadence divisor; stretched while exposure is poor
    fn stride_for(&self, state: ExposureState) -> u32 {
        let base = self.detect.every_n_frames.max(1);
        if state.is_poor() {
            (f64::from(base) * self.detect.poor_exposure_stride_scale)
                .round()
                .max(1.0) as u32
        } else {
            base
        }
    }

    fn on_detection(&mut self, frame: &Frame, regions: &[Region], now: f64) -> bool {
        let kinds: BTreeSet<DetectionKind> = regions.iter().map(|r| r.kind).collect();
        for kind in &kinds {
            *self.detection_counts.entry(*kind).or_insert(0) += 1;
        }

        if !self.detecting {
            info!(
                frame_id = frame.frame_id,
                regions = regions.len(),
                largest_px = regions.iter().map(|r| r.pixels).max().unwrap_or(0),
                "Motion detected"
            );
        }
        self.detecting = true;
        self.last_detection_ts = Some(now);

        self.maybe_save(frame, regions, now)
    }

    fn maybe_save(&mut self, frame: &Frame, regions: &[Region], now: f64) -> bool {
        if !self.save.enabled {
            return false;
        }
        let Some(sink) = &self.sink else {
            return false;
        };
        if self
            .last_save_ts
            .is_some_and(|t| now - t < self.save.min_interval_sec)
        {
            debug!(frame_id = frame.frame_id, "Save skipped, min interval not elapsed");
            return false;
        }

        let accepted = sink.try_send(SaveRequest {
            frame: frame.clone(),
            regions: regions.to_vec(),
        });
        if accepted {
            self.saved_images += 1;
            self.last_save_ts = Some(now);
        }
        accepted
    }

    fn publish(&self, frame: Frame, state: ExposureState, stride: u32, now: f64) {
        let adapter = self.coordinator.adapter();
        let window = self.coordinator.window();

        let snapshot = ServiceSnapshot {
            detecting: self.detecting,
            last_detection_ts: self.last_detection_ts,
            last_frame_ts: Some(now),
            total_frames: self.total_frames,
            saved_images: self.saved_images,
            armed: self.armed,
            exposure_state: state,
            exposure: self.estimator.metrics(),
            detect_stride: stride,
            detection_counts: self.detection_counts.clone(),
            bias: adapter.value(ControlKind::Bias).unwrap_or_default(),
            gain: adapter.value(ControlKind::Gain).unwrap_or_default(),
            shutter_us: adapter.value(ControlKind::Shutter).unwrap_or_default(),
            shutter_manual: adapter.shutter_manual(),
            paused: window.is_paused(now),
            reseed_pending: window.reseed_pending,
        };

        observability::record_snapshot(&snapshot);
        self.publisher.publish(snapshot, frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{DriverResult, ManualGate};

    /// Driver with no controls; frames are passed to `tick` directly
    struct FixedDriver;

    impl CameraDriver for FixedDriver {
        fn name(&self) -> &str {
            "fixed"
        }

        fn start(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn read(&mut self) -> DriverResult<Option<ImageData>> {
            Ok(None)
        }

        fn stop(&mut self) -> DriverResult<()> {
            Ok(())
        }
    }

    fn config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.camera.rotate_degrees = 0;
        config.adjust.enabled = false;
        config.detect.every_n_frames = 1;
        config
    }

    fn scene(level: u8, rect: bool) -> ImageData {
        let (w, h) = (320u32, 240u32);
        let mut data = vec![level; (w * h) as usize];
        if rect {
            for y in 40..120 {
                for x in 60..140 {
                    data[(y * w + x) as usize] = 220;
                }
            }
        }
        ImageData::gray(w, h, data)
    }

    fn orchestrator(config: &ServiceConfig) -> CaptureOrchestrator {
        CaptureOrchestrator::new(config, &FixedDriver, Arc::new(contracts::AlwaysArmed)).unwrap()
    }

    #[test]
    fn test_first_tick_seeds_then_detects_rect() {
        let mut orch = orchestrator(&config());
        let mut driver = FixedDriver;

        let first = orch.tick(scene(110, false), 0.0, &mut driver).unwrap();
        assert_eq!(first.gate, DetectionGate::Seed);
        assert!(!first.detected);

        let still = orch.tick(scene(110, false), 1.0, &mut driver).unwrap();
        assert!(still.detected);
        assert!(still.regions.is_empty());

        let moved = orch.tick(scene(110, true), 2.0, &mut driver).unwrap();
        assert_eq!(moved.regions.len(), 1, "regions: {:?}", moved.regions);
        let region = moved.regions[0];
        assert_eq!(region.kind, DetectionKind::Motion);
        assert!(
            region.x.abs_diff(60) <= 14 && region.y.abs_diff(40) <= 14,
            "Expected ~(60, 40), got ({}, {})",
            region.x,
            region.y
        );

        let snapshot = orch.subscribe().snapshot();
        assert!(snapshot.detecting);
        assert_eq!(snapshot.total_frames, 3);
        assert_eq!(snapshot.detections_of(DetectionKind::Motion), 1);
        assert_eq!(snapshot.last_detection_ts, Some(2.0));
    }

    #[test]
    fn test_poor_exposure_stretches_cadence() {
        let mut config = config();
        config.detect.every_n_frames = 2;
        let mut orch = orchestrator(&config);
        let mut driver = FixedDriver;

        let report = orch.tick(scene(15, false), 0.0, &mut driver).unwrap();
        assert_eq!(report.exposure_state, ExposureState::Under);
        assert_eq!(orch.subscribe().snapshot().detect_stride, 4);

        let detected: Vec<bool> = (1..9)
            .map(|t| {
                orch.tick(scene(15, false), t as f64, &mut driver)
                    .unwrap()
                    .detected
            })
            .collect();
        // frames 1..=8: only 4 and 8 are on the stretched cadence
        assert_eq!(
            detected,
            vec![false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_disarmed_skips_detection_and_rearm_reseeds() {
        let gate = ManualGate::new(true);
        let mut orch =
            CaptureOrchestrator::new(&config(), &FixedDriver, Arc::new(gate.clone())).unwrap();
        let mut driver = FixedDriver;

        orch.tick(scene(110, false), 0.0, &mut driver).unwrap();
        gate.disarm();
        let report = orch.tick(scene(110, true), 1.0, &mut driver).unwrap();
        assert!(!report.detected);
        assert!(!orch.subscribe().snapshot().armed);

        gate.arm();
        let rearmed = orch.tick(scene(110, true), 2.0, &mut driver).unwrap();
        assert_eq!(rearmed.gate, DetectionGate::Seed);
        assert!(rearmed.regions.is_empty());

        let after = orch.tick(scene(110, true), 3.0, &mut driver).unwrap();
        assert!(after.detected);
        assert!(after.regions.is_empty());
    }

    #[test]
    fn test_alert_cooldown_clears_detecting() {
        let mut orch = orchestrator(&config());
        let mut driver = FixedDriver;

        orch.tick(scene(110, false), 0.0, &mut driver).unwrap();
        orch.tick(scene(110, true), 1.0, &mut driver).unwrap();
        assert!(orch.subscribe().snapshot().detecting);

        for t in 2..11 {
            orch.tick(scene(110, true), t as f64, &mut driver).unwrap();
            assert!(orch.subscribe().snapshot().detecting, "cleared early at t={t}");
        }
        orch.tick(scene(110, true), 11.0, &mut driver).unwrap();
        assert!(!orch.subscribe().snapshot().detecting);
    }

    #[test]
    fn test_idle_gap_forces_seed() {
        let mut orch = orchestrator(&config());
        let mut driver = FixedDriver;

        orch.tick(scene(110, false), 0.0, &mut driver).unwrap();
        orch.tick(scene(110, false), 1.0, &mut driver).unwrap();

        // 9 s without frames, default limit is 5 s
        let report = orch.tick(scene(110, true), 10.0, &mut driver).unwrap();
        assert_eq!(report.gate, DetectionGate::Seed);
        assert!(report.regions.is_empty());
    }

    #[test]
    fn test_noir_profile_publishes_mono() {
        let mut config = config();
        config.camera.profile = CameraProfile::Noir;
        let mut orch = orchestrator(&config);
        let mut driver = FixedDriver;

        let rgb = ImageData::new(4, 4, PixelFormat::Rgb8, vec![90u8; 48]);
        orch.tick(rgb, 0.0, &mut driver).unwrap();
        let frame = orch.subscribe().latest_frame().unwrap();
        assert_eq!(frame.image.format, PixelFormat::Gray8);
    }

    #[test]
    fn test_corrupt_frame_is_error_and_not_counted() {
        let mut orch = orchestrator(&config());
        let mut driver = FixedDriver;

        let broken = ImageData::gray(320, 240, vec![0u8; 10]);
        assert!(orch.tick(broken, 0.0, &mut driver).is_err());
        assert_eq!(orch.total_frames(), 0);
    }

    #[tokio::test]
    async fn test_saves_respect_min_interval() {
        let mut config = config();
        config.save.min_interval_sec = 3.0;
        let sink = dispatcher::create_sink(&config.save).unwrap().unwrap();
        let mut orch = orchestrator(&config).with_sink(sink);
        let mut driver = FixedDriver;

        orch.tick(scene(110, false), 0.0, &mut driver).unwrap();
        let mut saved = Vec::new();
        for t in 1..6 {
            // alternate scenes so every detect() sees a change
            let report = orch.tick(scene(110, t % 2 == 1), t as f64, &mut driver).unwrap();
            assert!(!report.regions.is_empty(), "no detection at t={t}");
            saved.push(report.saved);
        }
        assert_eq!(saved, vec![true, false, false, true, false]);
        assert_eq!(orch.subscribe().snapshot().saved_images, 2);

        let sink = orch.into_sink().unwrap();
        let metrics = Arc::clone(sink.metrics());
        sink.shutdown().await;
        assert_eq!(metrics.saved_count(), 2);
    }
}
