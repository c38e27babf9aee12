//! ServiceConfig - Config Loader 输出
//!
//! 单一不可变配置, 启动时构造一次并按引用传入各组件。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::ControlKind;

/// 服务配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// 相机采集参数
    pub camera: CameraConfig,

    /// 曝光估计与分类
    pub exposure: ExposureConfig,

    /// 亮度/对比度增强
    pub enhance: EnhanceConfig,

    /// 运动检测
    pub motion: MotionConfig,

    /// 三个曝光控制步进器
    pub controls: ControlsConfig,

    /// 调整窗口 (暂停检测 + 重新播种)
    pub adjust: AdjustConfig,

    /// 检测节奏与告警
    pub detect: DetectConfig,

    /// 检测帧保存
    pub save: SaveConfig,
}

/// 相机配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u32,
    pub height: u32,

    /// 目标采集帧率 (Hz)，必须 > 0
    pub capture_fps: f64,

    /// 顺时针旋转角度 (0/90/180/270)
    pub rotate_degrees: u32,

    pub profile: CameraProfile,

    /// 优先使用驱动提供的亮度平面计算曝光
    pub use_luma: bool,

    /// 启动失败后的重试间隔 (秒)
    pub start_retry_sec: f64,

    /// read() 无帧时的休眠 (秒)
    pub read_idle_sleep_sec: f64,

    /// 关闭时等待处理线程的上限 (秒)
    pub stop_timeout_sec: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 240,
            capture_fps: 1.0,
            rotate_degrees: 180,
            profile: CameraProfile::Standard,
            use_luma: true,
            start_retry_sec: 3.0,
            read_idle_sleep_sec: 0.01,
            stop_timeout_sec: 2.0,
        }
    }
}

impl CameraConfig {
    /// Target interval between ticks
    pub fn capture_interval(&self) -> f64 {
        1.0 / self.capture_fps
    }
}

/// 相机型号
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraProfile {
    /// 彩色输出
    #[default]
    Standard,
    /// 无红外滤光片, 输出单色
    Noir,
}

/// 曝光估计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExposureConfig {
    /// 关闭后状态恒为 Disabled
    pub adaptive: bool,

    /// EMA 平滑系数 α ∈ (0, 1]
    pub ema_alpha: f64,

    /// mean_ema 高于此值判为过曝
    pub bright_mean: f64,

    /// 进入欠曝的 mean 阈值 (低)
    pub dark_enter_mean: f64,

    /// 退出欠曝的 mean 阈值 (高)
    pub dark_exit_mean: f64,

    /// 高光裁剪比例阈值
    pub high_clip_frac: f64,

    /// 暗部裁剪比例阈值
    pub low_clip_frac: f64,

    /// 灰度 <= low_cutoff 视为近黑
    pub low_cutoff: u8,

    /// 灰度 >= high_cutoff 视为近白
    pub high_cutoff: u8,
}

impl Default for ExposureConfig {
    fn default() -> Self {
        Self {
            adaptive: true,
            ema_alpha: 0.35,
            bright_mean: 200.0,
            dark_enter_mean: 40.0,
            dark_exit_mean: 50.0,
            high_clip_frac: 0.05,
            low_clip_frac: 0.05,
            low_cutoff: 5,
            high_cutoff: 250,
        }
    }
}

/// 增强配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    pub on_under: bool,
    pub under_alpha: f64,
    pub under_beta: f64,

    pub on_over: bool,
    pub over_alpha: f64,
    pub over_beta: f64,

    /// 每 tick 向目标靠近的比例
    pub blend_rate: f64,

    /// 回到 Normal 后保持上一目标的时长 (秒)
    pub hold_sec: f64,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            on_under: true,
            under_alpha: 2.5,
            under_beta: 20.0,
            on_over: true,
            over_alpha: 0.85,
            over_beta: -10.0,
            blend_rate: 0.3,
            hold_sec: 1.5,
        }
    }
}

/// 运动检测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// 预处理缩放比例 (0, 1]
    pub downscale: f64,

    /// 模糊核大小 (奇数)
    pub blur_kernel: u32,

    /// 二值化基础阈值
    pub base_threshold: u8,

    /// 噪声自适应阈值
    pub adaptive: bool,

    /// 阈值 = base + k·σ
    pub noise_k: f64,

    /// 中心 ROI 占宽高的比例, 用于估计 σ
    pub roi_frac: f64,

    /// 自适应阈值上限
    pub max_threshold: u8,

    pub dilate_iterations: u32,

    /// 膨胀前先做一次开运算去除噪点
    pub open: bool,

    /// 变化像素总数下限 (检测分辨率)
    pub min_changed_pixels: u32,

    /// 单个区域像素下限 (检测分辨率)
    pub min_region_pixels: u32,

    /// 静态忽略掩码 (灰度图, 0 = 忽略)
    pub ignore_mask: Option<PathBuf>,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            downscale: 0.5,
            blur_kernel: 5,
            base_threshold: 25,
            adaptive: true,
            noise_k: 2.0,
            roi_frac: 0.25,
            max_threshold: 60,
            dilate_iterations: 2,
            open: true,
            min_changed_pixels: 150,
            min_region_pixels: 40,
            ignore_mask: None,
        }
    }
}

/// 单个步进器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperConfig {
    pub enabled: bool,
    pub min: f64,
    pub max: f64,

    /// Under/Over 时的步长
    pub step: f64,

    /// 回到 baseline 时的步长
    pub return_step: f64,

    /// 两次生效调整之间的最小间隔 (秒)
    pub min_update_interval_sec: f64,

    /// Normal 状态下的回归目标
    pub baseline: f64,
}

impl StepperConfig {
    /// Default tuning for one control
    pub fn default_for(kind: ControlKind) -> Self {
        match kind {
            ControlKind::Bias => Self {
                enabled: true,
                min: -2.0,
                max: 2.0,
                step: 0.2,
                return_step: 0.1,
                min_update_interval_sec: 1.0,
                baseline: 0.0,
            },
            ControlKind::Gain => Self {
                enabled: true,
                min: 1.0,
                max: 12.0,
                step: 0.5,
                return_step: 0.25,
                min_update_interval_sec: 1.0,
                baseline: 1.0,
            },
            ControlKind::Shutter => Self {
                enabled: false,
                min: 5_000.0,
                max: 930_000.0,
                step: 20_000.0,
                return_step: 10_000.0,
                min_update_interval_sec: 1.0,
                baseline: 10_000.0,
            },
        }
    }
}

/// 曝光控制配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlsConfig {
    pub bias: StepperConfig,
    pub gain: StepperConfig,
    pub shutter: StepperConfig,
}

impl ControlsConfig {
    pub fn get(&self, kind: ControlKind) -> &StepperConfig {
        match kind {
            ControlKind::Bias => &self.bias,
            ControlKind::Gain => &self.gain,
            ControlKind::Shutter => &self.shutter,
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            bias: StepperConfig::default_for(ControlKind::Bias),
            gain: StepperConfig::default_for(ControlKind::Gain),
            shutter: StepperConfig::default_for(ControlKind::Shutter),
        }
    }
}

/// 调整窗口配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdjustConfig {
    pub enabled: bool,

    /// 定时窗口周期 (秒)
    pub period_sec: f64,

    /// 每个窗口暂停检测的时长 (秒)
    pub pause_sec: f64,
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period_sec: 180.0,
            pause_sec: 3.0,
        }
    }
}

/// 检测节奏配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// 每 N 帧检测一次
    pub every_n_frames: u32,

    /// 曝光不佳时检测间隔的放大倍数
    pub poor_exposure_stride_scale: f64,

    /// 告警保持时长 (秒)
    pub alert_cooldown_sec: f64,

    /// 两帧间隔超过该值后重新播种基线 (秒)
    pub reseed_after_idle_sec: f64,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            every_n_frames: 2,
            poor_exposure_stride_scale: 2.0,
            alert_cooldown_sec: 10.0,
            reseed_after_idle_sec: 5.0,
        }
    }
}

/// 保存配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub enabled: bool,

    /// 两次保存之间的最小间隔 (秒)
    pub min_interval_sec: f64,

    /// 保存队列容量
    pub queue_capacity: usize,

    pub sink: SaveSinkType,

    /// FileSink 输出目录
    pub output_dir: PathBuf,

    pub image_format: SaveImageFormat,
}

impl Default for SaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_sec: 1.0,
            queue_capacity: 16,
            sink: SaveSinkType::Log,
            output_dir: PathBuf::from("captures"),
            image_format: SaveImageFormat::Png,
        }
    }
}

/// Sink 类型
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveSinkType {
    #[default]
    Log,
    File,
}

/// 保存图像格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl SaveImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SaveImageFormat::Png => "png",
            SaveImageFormat::Jpeg => "jpg",
        }
    }
}
