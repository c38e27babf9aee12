//! Capture runner: the dedicated blocking thread that owns the camera and
//! the orchestrator.
//!
//! Pacing follows the capture interval without bursting: when early, sleep
//! at most 100 ms at a time; when behind, the next tick is scheduled one
//! interval from now. A failed start is retried every `start_retry_sec`, and
//! a fatal driver error stops the camera and goes back to starting it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use contracts::{CameraConfig, CameraDriver};
use dispatcher::SinkHandle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{CaptureError, CaptureOrchestrator, Result, StatusReader};

const MAX_SLEEP_SEC: f64 = 0.1;

type SharedDriver = Arc<Mutex<Box<dyn CameraDriver>>>;

/// Monotonic service clock: seconds since the service started
#[derive(Debug, Clone, Copy)]
pub struct ServiceClock {
    origin: Instant,
}

impl ServiceClock {
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Counters for one capture session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
    pub tick_errors: u64,
    pub camera_starts: u64,
    pub failed_starts: u64,
    pub camera_restarts: u64,
}

/// Handle to the running capture thread
pub struct ServiceHandle {
    cancel: Arc<AtomicBool>,
    join: JoinHandle<(RunStats, Option<SinkHandle>)>,
    driver: SharedDriver,
    status: StatusReader,
    stop_timeout: Duration,
}

impl ServiceHandle {
    pub fn status(&self) -> StatusReader {
        self.status.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Ask the loop to stop after the current tick
    pub fn request_stop(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Stop the loop, wait at most `stop_timeout_sec`, then drain the save queue.
    ///
    /// If the loop does not exit in time `ShutdownTimeout` is returned and the
    /// camera is released from here on a best-effort basis (see `release_camera`).
    #[instrument(name = "capture_shutdown", skip(self))]
    pub async fn shutdown(self) -> Result<RunStats> {
        self.request_stop();

        match tokio::time::timeout(self.stop_timeout, self.join).await {
            Ok(Ok((stats, sink))) => {
                if let Some(sink) = sink {
                    sink.shutdown().await;
                }
                info!(
                    ticks = stats.ticks,
                    restarts = stats.camera_restarts,
                    "Capture loop stopped"
                );
                Ok(stats)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Capture loop panicked");
                release_camera(&self.driver);
                Err(CaptureError::Join {
                    message: e.to_string(),
                })
            }
            Err(_) => {
                let timeout_sec = self.stop_timeout.as_secs_f64();
                warn!(timeout_sec, "Capture loop did not stop in time, releasing camera");
                release_camera(&self.driver);
                Err(CaptureError::ShutdownTimeout { timeout_sec })
            }
        }
    }
}

/// Start the capture loop on tokio's blocking pool.
///
/// Must be called from inside a tokio runtime.
pub fn spawn_capture(
    camera: &CameraConfig,
    driver: Box<dyn CameraDriver>,
    orchestrator: CaptureOrchestrator,
    clock: ServiceClock,
) -> ServiceHandle {
    let cancel = Arc::new(AtomicBool::new(false));
    let driver: SharedDriver = Arc::new(Mutex::new(driver));
    let status = orchestrator.subscribe();

    let capture_loop = CaptureLoop {
        config: camera.clone(),
        driver: Arc::clone(&driver),
        orchestrator,
        cancel: Arc::clone(&cancel),
        clock,
        stats: RunStats::default(),
        started: false,
    };
    let join = tokio::task::spawn_blocking(move || capture_loop.run());

    ServiceHandle {
        cancel,
        join,
        driver,
        status,
        stop_timeout: Duration::from_secs_f64(camera.stop_timeout_sec.max(0.0)),
    }
}

enum Step {
    Ticked,
    Idle,
    Restart,
}

struct CaptureLoop {
    config: CameraConfig,
    driver: SharedDriver,
    orchestrator: CaptureOrchestrator,
    cancel: Arc<AtomicBool>,
    clock: ServiceClock,
    stats: RunStats,
    started: bool,
}

impl CaptureLoop {
    fn run(mut self) -> (RunStats, Option<SinkHandle>) {
        let interval = self.config.capture_interval();
        let mut next_tick = self.clock.now();
        info!(
            fps = self.config.capture_fps,
            driver = lock(&self.driver).name(),
            "Capture loop started"
        );

        while !self.cancelled() {
            if !self.started {
                if !self.start_camera() {
                    self.sleep_cancellable(self.config.start_retry_sec);
                }
                continue;
            }

            let now = self.clock.now();
            if now < next_tick {
                sleep_sec((next_tick - now).min(MAX_SLEEP_SEC));
                continue;
            }

            match self.step(now) {
                Step::Ticked => {
                    next_tick += interval;
                    let after = self.clock.now();
                    if next_tick < after {
                        trace!(behind_sec = after - next_tick, "Tick overran, not catching up");
                        next_tick = after + interval;
                    }
                }
                Step::Idle => sleep_sec(self.config.read_idle_sleep_sec),
                Step::Restart => {
                    self.stop_camera();
                    self.stats.camera_restarts += 1;
                    observability::record_camera_restart("fatal");
                }
            }
        }

        if self.started {
            self.stop_camera();
        }
        info!(ticks = self.stats.ticks, "Capture loop finished");
        (self.stats, self.orchestrator.into_sink())
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn step(&mut self, now: f64) -> Step {
        let mut driver = lock(&self.driver);

        let image = match driver.read() {
            Ok(Some(image)) => image,
            Ok(None) => {
                self.stats.empty_reads += 1;
                return Step::Idle;
            }
            Err(e) if e.is_fatal() => {
                self.stats.read_errors += 1;
                error!(error = %e, "Camera read failed, restarting camera");
                return Step::Restart;
            }
            Err(e) => {
                self.stats.read_errors += 1;
                warn!(error = %e, "Camera read failed");
                return Step::Idle;
            }
        };

        let started = Instant::now();
        let result = self.orchestrator.tick(image, now, &mut **driver);
        observability::record_tick_duration(started.elapsed());

        match result {
            Ok(report) => {
                self.stats.ticks += 1;
                trace!(
                    frame_id = report.frame_id,
                    gate = ?report.gate,
                    regions = report.regions.len(),
                    "Tick complete"
                );
                Step::Ticked
            }
            Err(CaptureError::Driver(e)) => {
                self.stats.tick_errors += 1;
                error!(error = %e, "Camera control failed fatally, restarting camera");
                Step::Restart
            }
            Err(e) => {
                self.stats.tick_errors += 1;
                warn!(error = %e, "Frame dropped");
                Step::Ticked
            }
        }
    }

    fn start_camera(&mut self) -> bool {
        let mut driver = lock(&self.driver);
        match driver.start() {
            Ok(()) => {
                self.started = true;
                self.stats.camera_starts += 1;
                info!(driver = driver.name(), "Camera started");
                true
            }
            Err(e) => {
                self.stats.failed_starts += 1;
                warn!(
                    error = %e,
                    retry_sec = self.config.start_retry_sec,
                    "Camera start failed, retrying"
                );
                observability::record_camera_restart("start_failed");
                false
            }
        }
    }

    fn stop_camera(&mut self) {
        self.started = false;
        let mut driver = lock(&self.driver);
        match driver.stop() {
            Ok(()) => debug!("Camera stopped"),
            Err(e) => warn!(error = %e, "Camera stop failed, ignoring"),
        }
    }

    fn sleep_cancellable(&self, total_sec: f64) {
        let deadline = Instant::now() + Duration::from_secs_f64(total_sec.max(0.0));
        while !self.cancelled() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            std::thread::sleep(remaining.min(Duration::from_secs_f64(MAX_SLEEP_SEC)));
        }
    }
}

fn lock(driver: &SharedDriver) -> MutexGuard<'_, Box<dyn CameraDriver>> {
    driver.lock().unwrap_or_else(PoisonError::into_inner)
}

fn sleep_sec(sec: f64) {
    if sec > 0.0 {
        std::thread::sleep(Duration::from_secs_f64(sec));
    }
}

/// Stop the camera from outside the capture thread.
///
/// Best-effort: the driver sits behind a `Mutex`, and a capture thread stuck
/// inside a driver call still holds it. Blocking on that lock would hang
/// shutdown, so a busy driver is logged and left to the capture thread, which
/// stops the camera itself once the call returns and it sees the stop flag.
fn release_camera(driver: &SharedDriver) {
    let mut guard = match driver.try_lock() {
        Ok(guard) => guard,
        Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        Err(TryLockError::WouldBlock) => {
            warn!("Camera busy in capture thread, not released");
            return;
        }
    };
    if let Err(e) = guard.stop() {
        warn!(error = %e, "Camera stop failed, ignoring");
    }
}
