//! Capture service 指标收集模块
//!
//! 基于 ServiceSnapshot 导出 Prometheus 指标，并为 CLI 汇总运行统计。

use std::collections::HashMap;
use std::time::Duration;

use contracts::{ControlKind, ExposureState, ServiceSnapshot};
use metrics::{counter, gauge, histogram};

/// 从 ServiceSnapshot 记录指标
///
/// 每个 tick 发布快照后调用一次。计数器使用 `absolute`，快照本身就是累计值。
pub fn record_snapshot(snapshot: &ServiceSnapshot) {
    counter!("secam_frames_total").absolute(snapshot.total_frames);
    counter!("secam_saved_images_total").absolute(snapshot.saved_images);
    for (kind, count) in &snapshot.detection_counts {
        counter!("secam_detections_total", "kind" => kind.as_str()).absolute(*count);
    }

    gauge!("secam_exposure_mean").set(snapshot.exposure.mean);
    gauge!("secam_exposure_low_clip_frac").set(snapshot.exposure.low_clip_frac);
    gauge!("secam_exposure_high_clip_frac").set(snapshot.exposure.high_clip_frac);
    gauge!("secam_exposure_state").set(exposure_state_code(snapshot.exposure_state));

    for kind in ControlKind::ALL {
        gauge!("secam_control_value", "control" => kind.as_str()).set(control_value(snapshot, kind));
    }
    gauge!("secam_shutter_manual").set(bool_gauge(snapshot.shutter_manual));

    gauge!("secam_armed").set(bool_gauge(snapshot.armed));
    gauge!("secam_detecting").set(bool_gauge(snapshot.detecting));
    gauge!("secam_paused").set(bool_gauge(snapshot.paused));
    gauge!("secam_detect_stride").set(snapshot.detect_stride as f64);
}

/// 记录单个 tick 的处理耗时
pub fn record_tick_duration(elapsed: Duration) {
    histogram!("secam_tick_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}

/// 记录相机重启 (致命错误或启动失败)
pub fn record_camera_restart(reason: &'static str) {
    counter!("secam_camera_restarts_total", "reason" => reason).increment(1);
}

fn exposure_state_code(state: ExposureState) -> f64 {
    match state {
        ExposureState::Disabled => -1.0,
        ExposureState::Normal => 0.0,
        ExposureState::Under => 1.0,
        ExposureState::Over => 2.0,
    }
}

fn control_value(snapshot: &ServiceSnapshot, kind: ControlKind) -> f64 {
    match kind {
        ControlKind::Bias => snapshot.bias,
        ControlKind::Gain => snapshot.gain,
        ControlKind::Shutter => snapshot.shutter_us,
    }
}

fn bool_gauge(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// 运行统计聚合器
///
/// CLI 在运行期间观察快照，结束时打印摘要。
#[derive(Debug, Clone, Default)]
pub struct RunSummaryAggregator {
    /// 观察到的快照数
    pub observed: u64,

    /// 曝光均值统计
    pub exposure_stats: RunningStats,

    /// 各曝光状态的观察次数
    pub state_counts: HashMap<ExposureState, u64>,

    /// 调整窗口中的观察次数
    pub paused_observations: u64,

    /// 最近一次快照
    pub last: Option<ServiceSnapshot>,
}

impl RunSummaryAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, snapshot: &ServiceSnapshot) {
        self.observed += 1;
        self.exposure_stats.push(snapshot.exposure.mean);
        *self.state_counts.entry(snapshot.exposure_state).or_insert(0) += 1;
        if snapshot.paused {
            self.paused_observations += 1;
        }
        self.last = Some(snapshot.clone());
    }

    /// 生成摘要报告
    pub fn summary(&self) -> RunSummary {
        let last = self.last.clone().unwrap_or_default();
        let poor = self.state_count(ExposureState::Under) + self.state_count(ExposureState::Over);

        RunSummary {
            total_frames: last.total_frames,
            saved_images: last.saved_images,
            total_detections: last.total_detections(),
            detection_counts: last
                .detection_counts
                .iter()
                .map(|(kind, count)| (kind.as_str().to_string(), *count))
                .collect(),
            exposure_mean: StatsSummary::from(&self.exposure_stats),
            poor_exposure_rate: percentage(poor, self.observed),
            paused_rate: percentage(self.paused_observations, self.observed),
            final_state: last.exposure_state,
            bias: last.bias,
            gain: last.gain,
            shutter_us: last.shutter_us,
        }
    }

    fn state_count(&self, state: ExposureState) -> u64 {
        self.state_counts.get(&state).copied().unwrap_or(0)
    }
}

fn percentage(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// 运行摘要
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub total_frames: u64,
    pub saved_images: u64,
    pub total_detections: u64,
    pub detection_counts: Vec<(String, u64)>,
    pub exposure_mean: StatsSummary,
    pub poor_exposure_rate: f64,
    pub paused_rate: f64,
    pub final_state: ExposureState,
    pub bias: f64,
    pub gain: f64,
    pub shutter_us: f64,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Capture Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Detections: {}", self.total_detections)?;
        for (kind, count) in &self.detection_counts {
            writeln!(f, "  {}: {}", kind, count)?;
        }
        writeln!(f, "Saved images: {}", self.saved_images)?;
        writeln!(f, "Exposure mean: {}", self.exposure_mean)?;
        writeln!(
            f,
            "Poor exposure: {:.2}%, paused: {:.2}%",
            self.poor_exposure_rate, self.paused_rate
        )?;
        writeln!(f, "Final exposure state: {}", self.final_state)?;
        writeln!(
            f,
            "Controls: bias={:.2}, gain={:.2}, shutter={:.0}us",
            self.bias, self.gain, self.shutter_us
        )
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            self.m2 += delta * (value - self.mean);
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
