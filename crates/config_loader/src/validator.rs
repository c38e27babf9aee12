//! 配置校验模块
//!
//! 校验规则：
//! - 图像尺寸 / 帧率 > 0, 旋转角为 90 的倍数
//! - 曝光阈值满足 dark_enter < dark_exit <= bright
//! - 运动检测参数合法 (奇数模糊核, 阈值上下限)
//! - 每个启用的步进器 min <= max 且 baseline 在范围内
//! - 调整窗口短于调整周期

use contracts::{
    ContractError, ControlKind, DetectConfig, EnhanceConfig, ExposureConfig, MotionConfig,
    ServiceConfig, StepperConfig,
};

/// 校验 ServiceConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ServiceConfig) -> Result<(), ContractError> {
    validate_camera(config)?;
    validate_exposure(&config.exposure)?;
    validate_enhance(&config.enhance)?;
    validate_motion(&config.motion)?;
    for kind in ControlKind::ALL {
        validate_stepper(kind, config.controls.get(kind))?;
    }
    validate_adjust(config)?;
    validate_detect(&config.detect)?;
    validate_save(config)?;
    Ok(())
}

/// 校验相机参数
fn validate_camera(config: &ServiceConfig) -> Result<(), ContractError> {
    let camera = &config.camera;

    if camera.width == 0 || camera.height == 0 {
        return Err(ContractError::config_validation(
            "camera.width / camera.height",
            format!(
                "frame size must be non-zero, got {}x{}",
                camera.width, camera.height
            ),
        ));
    }

    if camera.capture_fps <= 0.0 {
        return Err(ContractError::config_validation(
            "camera.capture_fps",
            format!("capture_fps must be > 0, got {}", camera.capture_fps),
        ));
    }

    if !matches!(camera.rotate_degrees, 0 | 90 | 180 | 270) {
        return Err(ContractError::config_validation(
            "camera.rotate_degrees",
            format!(
                "rotate_degrees must be one of 0/90/180/270, got {}",
                camera.rotate_degrees
            ),
        ));
    }

    for (field, value) in [
        ("camera.start_retry_sec", camera.start_retry_sec),
        ("camera.read_idle_sleep_sec", camera.read_idle_sleep_sec),
        ("camera.stop_timeout_sec", camera.stop_timeout_sec),
    ] {
        if value < 0.0 {
            return Err(ContractError::config_validation(
                field,
                format!("must be >= 0, got {value}"),
            ));
        }
    }

    Ok(())
}

/// 校验曝光阈值
fn validate_exposure(exposure: &ExposureConfig) -> Result<(), ContractError> {
    if exposure.ema_alpha <= 0.0 || exposure.ema_alpha > 1.0 {
        return Err(ContractError::config_validation(
            "exposure.ema_alpha",
            format!("ema_alpha must be in (0, 1], got {}", exposure.ema_alpha),
        ));
    }

    // 迟滞要求退出阈值高于进入阈值
    if exposure.dark_enter_mean >= exposure.dark_exit_mean {
        return Err(ContractError::config_validation(
            "exposure.dark_enter_mean / exposure.dark_exit_mean",
            format!(
                "dark_enter_mean ({}) must be < dark_exit_mean ({})",
                exposure.dark_enter_mean, exposure.dark_exit_mean
            ),
        ));
    }

    if exposure.dark_exit_mean > exposure.bright_mean {
        return Err(ContractError::config_validation(
            "exposure.dark_exit_mean / exposure.bright_mean",
            format!(
                "dark_exit_mean ({}) must be <= bright_mean ({})",
                exposure.dark_exit_mean, exposure.bright_mean
            ),
        ));
    }

    for (field, value) in [
        ("exposure.high_clip_frac", exposure.high_clip_frac),
        ("exposure.low_clip_frac", exposure.low_clip_frac),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ContractError::config_validation(
                field,
                format!("fraction must be in [0, 1], got {value}"),
            ));
        }
    }

    if exposure.low_cutoff >= exposure.high_cutoff {
        return Err(ContractError::config_validation(
            "exposure.low_cutoff / exposure.high_cutoff",
            format!(
                "low_cutoff ({}) must be < high_cutoff ({})",
                exposure.low_cutoff, exposure.high_cutoff
            ),
        ));
    }

    Ok(())
}

/// 校验增强参数
fn validate_enhance(enhance: &EnhanceConfig) -> Result<(), ContractError> {
    if enhance.blend_rate <= 0.0 || enhance.blend_rate > 1.0 {
        return Err(ContractError::config_validation(
            "enhance.blend_rate",
            format!("blend_rate must be in (0, 1], got {}", enhance.blend_rate),
        ));
    }

    if enhance.hold_sec < 0.0 {
        return Err(ContractError::config_validation(
            "enhance.hold_sec",
            format!("hold_sec must be >= 0, got {}", enhance.hold_sec),
        ));
    }

    if enhance.under_alpha <= 0.0 || enhance.over_alpha <= 0.0 {
        return Err(ContractError::config_validation(
            "enhance.under_alpha / enhance.over_alpha",
            "contrast multipliers must be > 0",
        ));
    }

    Ok(())
}

/// 校验运动检测参数
fn validate_motion(motion: &MotionConfig) -> Result<(), ContractError> {
    if motion.downscale <= 0.0 || motion.downscale > 1.0 {
        return Err(ContractError::config_validation(
            "motion.downscale",
            format!("downscale must be in (0, 1], got {}", motion.downscale),
        ));
    }

    if motion.blur_kernel == 0 || motion.blur_kernel % 2 == 0 {
        return Err(ContractError::config_validation(
            "motion.blur_kernel",
            format!(
                "blur_kernel must be a positive odd number, got {}",
                motion.blur_kernel
            ),
        ));
    }

    if motion.base_threshold > motion.max_threshold {
        return Err(ContractError::config_validation(
            "motion.base_threshold / motion.max_threshold",
            format!(
                "base_threshold ({}) must be <= max_threshold ({})",
                motion.base_threshold, motion.max_threshold
            ),
        ));
    }

    if motion.noise_k < 0.0 {
        return Err(ContractError::config_validation(
            "motion.noise_k",
            format!("noise_k must be >= 0, got {}", motion.noise_k),
        ));
    }

    if motion.roi_frac <= 0.0 || motion.roi_frac > 1.0 {
        return Err(ContractError::config_validation(
            "motion.roi_frac",
            format!("roi_frac must be in (0, 1], got {}", motion.roi_frac),
        ));
    }

    Ok(())
}

/// 校验单个步进器
fn validate_stepper(kind: ControlKind, stepper: &StepperConfig) -> Result<(), ContractError> {
    // 关闭的步进器不参与运行, 允许任意值
    if !stepper.enabled {
        return Ok(());
    }

    let field = |name: &str| format!("controls.{}.{}", kind, name);

    if stepper.min > stepper.max {
        return Err(ContractError::config_validation(
            field("min"),
            format!("min ({}) must be <= max ({})", stepper.min, stepper.max),
        ));
    }

    if stepper.baseline < stepper.min || stepper.baseline > stepper.max {
        return Err(ContractError::config_validation(
            field("baseline"),
            format!(
                "baseline ({}) must be within [{}, {}]",
                stepper.baseline, stepper.min, stepper.max
            ),
        ));
    }

    if stepper.step <= 0.0 {
        return Err(ContractError::config_validation(
            field("step"),
            format!("step must be > 0, got {}", stepper.step),
        ));
    }

    if stepper.return_step <= 0.0 || stepper.return_step > stepper.step {
        return Err(ContractError::config_validation(
            field("return_step"),
            format!(
                "return_step ({}) must be in (0, step={}]",
                stepper.return_step, stepper.step
            ),
        ));
    }

    if stepper.min_update_interval_sec < 0.0 {
        return Err(ContractError::config_validation(
            field("min_update_interval_sec"),
            format!(
                "min_update_interval_sec must be >= 0, got {}",
                stepper.min_update_interval_sec
            ),
        ));
    }

    Ok(())
}

/// 校验调整窗口
fn validate_adjust(config: &ServiceConfig) -> Result<(), ContractError> {
    let adjust = &config.adjust;
    if !adjust.enabled {
        return Ok(());
    }

    if adjust.pause_sec <= 0.0 {
        return Err(ContractError::config_validation(
            "adjust.pause_sec",
            format!("pause_sec must be > 0, got {}", adjust.pause_sec),
        ));
    }

    if adjust.pause_sec >= adjust.period_sec {
        return Err(ContractError::config_validation(
            "adjust.pause_sec / adjust.period_sec",
            format!(
                "pause_sec ({}) must be < period_sec ({})",
                adjust.pause_sec, adjust.period_sec
            ),
        ));
    }

    Ok(())
}

/// 校验检测节奏
fn validate_detect(detect: &DetectConfig) -> Result<(), ContractError> {
    if detect.every_n_frames == 0 {
        return Err(ContractError::config_validation(
            "detect.every_n_frames",
            "every_n_frames must be >= 1",
        ));
    }

    if detect.poor_exposure_stride_scale < 1.0 {
        return Err(ContractError::config_validation(
            "detect.poor_exposure_stride_scale",
            format!(
                "poor_exposure_stride_scale must be >= 1, got {}",
                detect.poor_exposure_stride_scale
            ),
        ));
    }

    if detect.alert_cooldown_sec < 0.0 || detect.reseed_after_idle_sec < 0.0 {
        return Err(ContractError::config_validation(
            "detect.alert_cooldown_sec / detect.reseed_after_idle_sec",
            "durations must be >= 0",
        ));
    }

    Ok(())
}

/// 校验保存配置
fn validate_save(config: &ServiceConfig) -> Result<(), ContractError> {
    let save = &config.save;

    if save.queue_capacity == 0 {
        return Err(ContractError::config_validation(
            "save.queue_capacity",
            "queue_capacity must be >= 1",
        ));
    }

    if save.min_interval_sec < 0.0 {
        return Err(ContractError::config_validation(
            "save.min_interval_sec",
            format!(
                "min_interval_sec must be >= 0, got {}",
                save.min_interval_sec
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServiceConfig::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_fps() {
        let mut config = ServiceConfig::default();
        config.camera.capture_fps = 0.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("capture_fps must be > 0"), "got: {err}");
    }

    #[test]
    fn test_invalid_rotation() {
        let mut config = ServiceConfig::default();
        config.camera.rotate_degrees = 45;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("rotate_degrees"), "got: {err}");
    }

    #[test]
    fn test_inverted_hysteresis_thresholds() {
        let mut config = ServiceConfig::default();
        config.exposure.dark_enter_mean = 60.0;
        config.exposure.dark_exit_mean = 50.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("dark_enter_mean"), "got: {err}");
    }

    #[test]
    fn test_fraction_out_of_range() {
        let mut config = ServiceConfig::default();
        config.exposure.high_clip_frac = 1.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("high_clip_frac"), "got: {err}");
    }

    #[test]
    fn test_even_blur_kernel() {
        let mut config = ServiceConfig::default();
        config.motion.blur_kernel = 4;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("odd"), "got: {err}");
    }

    #[test]
    fn test_stepper_baseline_out_of_range() {
        let mut config = ServiceConfig::default();
        config.controls.gain.baseline = 20.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("controls.gain.baseline"), "got: {err}");
    }

    #[test]
    fn test_disabled_stepper_is_not_checked() {
        let mut config = ServiceConfig::default();
        config.controls.shutter.enabled = false;
        config.controls.shutter.min = 10.0;
        config.controls.shutter.max = 1.0;
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_return_step_larger_than_step() {
        let mut config = ServiceConfig::default();
        config.controls.bias.return_step = 0.5;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("return_step"), "got: {err}");
    }

    #[test]
    fn test_pause_longer_than_period() {
        let mut config = ServiceConfig::default();
        config.adjust.period_sec = 2.0;
        config.adjust.pause_sec = 3.0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("pause_sec"), "got: {err}");
    }

    #[test]
    fn test_zero_stride() {
        let mut config = ServiceConfig::default();
        config.detect.every_n_frames = 0;
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("every_n_frames"), "got: {err}");
    }
}
