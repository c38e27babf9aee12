//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use camera::{MockCamera, MockCameraConfig, ReplayCamera, ReplayConfig};
use capture::{spawn_capture, CaptureOrchestrator, ServiceClock, StatusReader};
use contracts::{AlwaysArmed, CameraDriver, ServiceConfig};
use observability::RunSummaryAggregator;
use tracing::{info, warn};

use super::load_config;
use crate::cli::{RunArgs, SourceKind};

/// Why the watch loop returned
#[derive(Debug)]
enum StopReason {
    MaxFrames,
    Duration,
    Signal,
    LoopEnded,
}

/// Execute the `run` command
pub async fn run_service(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(fps) = args.fps {
        info!(fps, "Overriding capture fps from CLI");
        config.camera.capture_fps = fps;
        config_loader::validate(&config).context("Invalid --fps override")?;
    }

    info!(
        width = config.camera.width,
        height = config.camera.height,
        fps = config.camera.capture_fps,
        adaptive = config.exposure.adaptive,
        adjust = config.adjust.enabled,
        sink = ?config.save.sink,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    if args.metrics_port != 0 {
        observability::init_metrics_only(args.metrics_port)?;
    }

    let driver = build_driver(args, &config)?;
    let sink = dispatcher::create_sink(&config.save).context("Failed to create save sink")?;

    let mut orchestrator = CaptureOrchestrator::new(&config, driver.as_ref(), Arc::new(AlwaysArmed))
        .context("Failed to build capture pipeline")?;
    if let Some(sink) = sink {
        orchestrator = orchestrator.with_sink(sink);
    }

    info!(source = driver.name(), "Starting capture...");
    let handle = spawn_capture(&config.camera, driver, orchestrator, ServiceClock::start());

    let mut aggregator = RunSummaryAggregator::new();
    let max_frames = (args.max_frames > 0).then_some(args.max_frames);
    let duration = async {
        if args.duration_sec > 0 {
            tokio::time::sleep(Duration::from_secs(args.duration_sec)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let reason = tokio::select! {
        reason = watch_status(handle.status(), &mut aggregator, max_frames) => reason,
        _ = duration => StopReason::Duration,
        _ = shutdown_signal() => {
            warn!("Received shutdown signal, stopping capture...");
            StopReason::Signal
        }
    };
    info!(?reason, "Stopping capture");

    let final_status = handle.status();
    let result = handle.shutdown().await;

    // ticks published after the watch loop was cancelled
    let last = final_status.snapshot();
    let seen = aggregator.last.as_ref().map(|s| s.total_frames);
    if seen.is_none_or(|frames| last.total_frames > frames) {
        aggregator.update(&last);
    }
    println!("\n{}", aggregator.summary());

    let stats = result.context("Capture shutdown failed")?;
    info!(
        ticks = stats.ticks,
        read_errors = stats.read_errors,
        restarts = stats.camera_restarts,
        "secam finished"
    );
    Ok(())
}

fn build_driver(args: &RunArgs, config: &ServiceConfig) -> Result<Box<dyn CameraDriver>> {
    match args.source {
        SourceKind::Mock => {
            let camera = MockCamera::new(MockCameraConfig {
                width: config.camera.width,
                height: config.camera.height,
                scene_level: args.mock_level,
                ..Default::default()
            });
            Ok(Box::new(camera))
        }
        SourceKind::Replay => {
            let dir = args
                .replay_dir
                .as_deref()
                .context("--replay-dir is required for replay source")?;
            let camera = ReplayCamera::load(
                dir,
                ReplayConfig {
                    loop_playback: args.replay_loop,
                },
            )
            .with_context(|| format!("Failed to open replay directory {}", dir.display()))?;
            Ok(Box::new(camera))
        }
    }
}

/// Fold published snapshots into the run summary until a stop condition
async fn watch_status(
    mut status: StatusReader,
    aggregator: &mut RunSummaryAggregator,
    max_frames: Option<u64>,
) -> StopReason {
    loop {
        let snapshot = match status.changed().await {
            Ok(snapshot) => snapshot,
            Err(_) => return StopReason::LoopEnded,
        };
        aggregator.update(&snapshot);

        if max_frames.is_some_and(|max| snapshot.total_frames >= max) {
            info!(frames = snapshot.total_frames, "Reached max frames");
            return StopReason::MaxFrames;
        }
    }
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &ServiceConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Camera:");
    println!(
        "  {}x{} @ {} fps, rotate {}°, profile {:?}",
        config.camera.width,
        config.camera.height,
        config.camera.capture_fps,
        config.camera.rotate_degrees,
        config.camera.profile
    );
    println!("\nExposure:");
    println!(
        "  adaptive: {}, dark enter/exit: {}/{}, bright: {}",
        config.exposure.adaptive,
        config.exposure.dark_enter_mean,
        config.exposure.dark_exit_mean,
        config.exposure.bright_mean
    );
    println!("\nAdjustment:");
    println!(
        "  enabled: {}, every {}s, pause {}s",
        config.adjust.enabled, config.adjust.period_sec, config.adjust.pause_sec
    );
    for (name, stepper) in [
        ("bias", &config.controls.bias),
        ("gain", &config.controls.gain),
        ("shutter", &config.controls.shutter),
    ] {
        println!(
            "  - {name}: enabled={}, range=[{}, {}], step={}",
            stepper.enabled, stepper.min, stepper.max, stepper.step
        );
    }
    println!("\nDetection:");
    println!(
        "  every {} frames, cooldown {}s, threshold {}",
        config.detect.every_n_frames, config.detect.alert_cooldown_sec, config.motion.base_threshold
    );
    println!("\nSaving:");
    if config.save.enabled {
        println!(
            "  sink: {:?}, min interval {}s, queue {}",
            config.save.sink, config.save.min_interval_sec, config.save.queue_capacity
        );
    } else {
        println!("  disabled");
    }
    println!();
}
