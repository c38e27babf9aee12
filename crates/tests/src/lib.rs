//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置加载到编排器构建的冒烟测试
//! - 用 MockCamera 与显式时钟驱动编排器的场景测试
//! - 带 FileSink 的完整采集服务 e2e 测试

#[cfg(test)]
mod contract_tests {
    use std::sync::Arc;

    use camera::MockCamera;
    use capture::CaptureOrchestrator;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::AlwaysArmed;

    #[test]
    fn test_partial_toml_builds_orchestrator() {
        let config = ConfigLoader::load_from_str(
            r#"
[camera]
width = 160
height = 120
rotate_degrees = 90

[detect]
every_n_frames = 1
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(config.camera.rotate_degrees, 90);
        // untouched sections keep their defaults
        assert_eq!(config.adjust.period_sec, 180.0);

        let driver = MockCamera::with_defaults();
        let orch = CaptureOrchestrator::new(&config, &driver, Arc::new(AlwaysArmed)).unwrap();
        assert_eq!(orch.total_frames(), 0);
    }
}

#[cfg(test)]
mod scenario_tests {
    use std::sync::Arc;

    use camera::{MockCamera, MockCameraConfig, MockCameraStats, SceneRect};
    use capture::{CaptureOrchestrator, DetectionGate, TickReport, WindowTrigger};
    use contracts::{
        AlwaysArmed, ArmingGate, CameraDriver, DriverError, ImageData, ManualGate, ServiceConfig,
    };

    const W: u32 = 160;
    const H: u32 = 120;

    fn config() -> ServiceConfig {
        let mut config = ServiceConfig::default();
        config.camera.width = W;
        config.camera.height = H;
        config.camera.rotate_degrees = 0;
        config.detect.every_n_frames = 1;
        config.save.enabled = false;
        config
    }

    fn camera(level: f64) -> MockCamera {
        let mut cam = MockCamera::new(MockCameraConfig {
            width: W,
            height: H,
            scene_level: level,
            ..Default::default()
        });
        cam.start().unwrap();
        cam
    }

    fn intruder() -> SceneRect {
        SceneRect {
            x: 50,
            y: 30,
            width: 40,
            height: 40,
            level: 220.0,
        }
    }

    fn mean(image: &ImageData) -> f64 {
        image.data.iter().map(|&v| v as f64).sum::<f64>() / image.data.len() as f64
    }

    /// Read one frame from `cam` and tick it at `t`
    fn step(orch: &mut CaptureOrchestrator, cam: &mut MockCamera, t: f64) -> TickReport {
        let frame = cam.read().unwrap().unwrap();
        orch.tick(frame, t, cam).unwrap()
    }

    fn orchestrator(
        config: &ServiceConfig,
        cam: &MockCamera,
        gate: Arc<dyn ArmingGate>,
    ) -> CaptureOrchestrator {
        CaptureOrchestrator::new(config, cam, gate).unwrap()
    }

    #[test]
    fn test_adjustment_window_hides_transient_motion() {
        let config = config();
        let mut cam = camera(110.0);
        let scene = cam.scene();
        let mut orch = orchestrator(&config, &cam, Arc::new(AlwaysArmed));

        let mut reports = Vec::new();
        for t in 0..=190u32 {
            match t {
                181 | 185 => scene.add_rect(intruder()),
                182 => scene.clear_rects(),
                _ => {}
            }
            reports.push(step(&mut orch, &mut cam, t as f64));
        }

        // first window opens on the first tick and seeds once it closes
        assert_eq!(reports[0].window_opened, Some(WindowTrigger::Scheduled));
        assert_eq!(reports[3].gate, DetectionGate::Seed);

        assert_eq!(reports[180].window_opened, Some(WindowTrigger::Scheduled));
        assert_eq!(reports[181].gate, DetectionGate::Paused);
        assert!(!reports[181].detected);
        assert!(reports[..185].iter().all(|r| r.regions.is_empty()));

        let seeds: Vec<usize> = (180..=190)
            .filter(|&t| reports[t].gate == DetectionGate::Seed)
            .collect();
        assert_eq!(seeds, vec![183]);

        assert!(reports[185].detected);
        assert!(!reports[185].regions.is_empty());

        let snapshot = orch.subscribe().snapshot();
        assert_eq!(snapshot.total_frames, 191);
        assert!(snapshot.total_detections() >= 1);
    }

    #[test]
    fn test_dark_scene_raises_gain() {
        let config = config();
        let mut cam = camera(20.0);
        let mut orch = orchestrator(&config, &cam, Arc::new(AlwaysArmed));

        let mut frame_means = Vec::new();
        for t in 0..3 {
            let frame = cam.read().unwrap().unwrap();
            frame_means.push(mean(&frame));
            let report = orch.tick(frame, t as f64, &mut cam).unwrap();
            assert_eq!(report.exposure_state, contracts::ExposureState::Under);
            assert_eq!(report.gate, DetectionGate::Paused);
        }

        let (bias, gain, _) = cam.controls();
        assert!(bias > 0.0, "bias = {bias}");
        assert!(gain > 2.0, "gain = {gain}");
        assert!(frame_means[2] > frame_means[0] * 1.5, "means = {frame_means:?}");

        let snapshot = orch.subscribe().snapshot();
        assert_eq!(snapshot.gain, gain);
        assert!(snapshot.paused);
    }

    #[test]
    fn test_unsupported_controls_degrade_silently() {
        let config = config();
        let mut cam = MockCamera::new(MockCameraConfig {
            width: W,
            height: H,
            scene_level: 20.0,
            capabilities: Vec::new(),
            ..Default::default()
        });
        cam.start().unwrap();
        let stats = cam.stats();
        let mut orch = orchestrator(&config, &cam, Arc::new(AlwaysArmed));

        let reports: Vec<TickReport> = (0..20).map(|t| step(&mut orch, &mut cam, t as f64)).collect();

        assert_eq!(MockCameraStats::get(&stats.control_sets), 0);
        assert_eq!(reports[0].window_opened, Some(WindowTrigger::Scheduled));
        // nothing can move, so poor exposure never opens a failsafe window
        assert!(reports[1..].iter().all(|r| r.window_opened.is_none()));
        assert!(reports[4..].iter().all(|r| r.gate == DetectionGate::Run));
    }

    #[test]
    fn test_transient_control_fault_is_absorbed() {
        let config = config();
        let mut cam = camera(20.0);
        let stats = cam.stats();
        cam.scene()
            .inject_control_fault(DriverError::transient("i2c timeout"));
        let mut orch = orchestrator(&config, &cam, Arc::new(AlwaysArmed));

        let report = step(&mut orch, &mut cam, 0.0);
        assert_eq!(report.gate, DetectionGate::Paused);
        // one of bias/gain failed, the other went through
        assert_eq!(MockCameraStats::get(&stats.control_sets), 1);
    }

    #[test]
    fn test_rearm_reseeds_before_detecting() {
        let mut config = config();
        config.adjust.enabled = false;
        let mut cam = camera(110.0);
        let scene = cam.scene();
        let gate = ManualGate::new(false);
        let mut orch = orchestrator(&config, &cam, Arc::new(gate.clone()));

        for t in 0..5 {
            if t == 2 {
                scene.add_rect(intruder());
            }
            let report = step(&mut orch, &mut cam, t as f64);
            assert!(!report.detected);
            assert!(report.regions.is_empty());
        }
        scene.clear_rects();

        gate.arm();
        let armed = step(&mut orch, &mut cam, 5.0);
        assert_eq!(armed.gate, DetectionGate::Seed);
        assert!(!armed.detected);

        let quiet = step(&mut orch, &mut cam, 6.0);
        assert!(quiet.detected);
        assert!(quiet.regions.is_empty());

        scene.add_rect(intruder());
        let motion = step(&mut orch, &mut cam, 7.0);
        assert!(!motion.regions.is_empty());
        assert!(orch.subscribe().snapshot().detecting);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use camera::{MockCamera, MockCameraConfig, SceneRect};
    use capture::{spawn_capture, CaptureOrchestrator, ServiceClock, StatusReader};
    use contracts::{AlwaysArmed, SaveSinkType, ServiceConfig, ServiceSnapshot};

    async fn wait_for(
        status: &mut StatusReader,
        what: impl Fn(&ServiceSnapshot) -> bool,
    ) -> Arc<ServiceSnapshot> {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = status.changed().await.unwrap();
                if what(&snapshot) {
                    return snapshot;
                }
            }
        })
        .await
        .expect("condition not reached in time")
    }

    fn files_with_extension(dir: &Path, ext: &str) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|x| x == ext))
            .count()
    }

    /// End-to-end test: MockCamera -> capture loop -> FileSink
    ///
    /// 验证完整的数据流：
    /// 1. 采集线程按节拍读取 MockCamera
    /// 2. 场景中出现物体后触发运动检测
    /// 3. 检测帧写入输出目录 (图像 + 标注副本 + 区域 JSON)
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_e2e_motion_is_saved_to_disk() {
        let output = tempfile::tempdir().unwrap();

        let mut config = ServiceConfig::default();
        config.camera.width = 160;
        config.camera.height = 120;
        config.camera.capture_fps = 20.0;
        config.adjust.enabled = false;
        config.detect.every_n_frames = 1;
        config.save.sink = SaveSinkType::File;
        config.save.output_dir = output.path().to_path_buf();
        config_loader::validate(&config).unwrap();

        let cam = MockCamera::new(MockCameraConfig {
            width: 160,
            height: 120,
            ..Default::default()
        });
        let scene = cam.scene();

        let sink = dispatcher::create_sink(&config.save).unwrap().unwrap();
        let orch = CaptureOrchestrator::new(&config, &cam, Arc::new(AlwaysArmed))
            .unwrap()
            .with_sink(sink);
        let handle = spawn_capture(&config.camera, Box::new(cam), orch, ServiceClock::start());
        let mut status = handle.status();

        wait_for(&mut status, |s| s.total_frames >= 3).await;
        scene.add_rect(SceneRect {
            x: 60,
            y: 40,
            width: 40,
            height: 40,
            level: 230.0,
        });
        let snapshot = wait_for(&mut status, |s| s.saved_images >= 1).await;
        assert!(snapshot.detecting);
        assert!(snapshot.total_detections() >= 1);

        let stats = handle.shutdown().await.unwrap();
        assert!(stats.ticks >= 4);

        assert!(files_with_extension(output.path(), "png") >= 1);
        assert!(files_with_extension(output.path(), "json") >= 1);
        let annotated = std::fs::read_dir(output.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with("_boxes.png"))
            .count();
        assert!(annotated >= 1);
    }
}
