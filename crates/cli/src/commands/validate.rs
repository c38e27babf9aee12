//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{SaveSinkType, ServiceConfig};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Capture rates above this keep a small board busy with analysis alone
const HIGH_FPS_WARNING: f64 = 15.0;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    resolution: String,
    capture_fps: f64,
    adaptive_exposure: bool,
    adjust_enabled: bool,
    active_controls: Vec<&'static str>,
    detect_every_n_frames: u32,
    save_enabled: bool,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(summarize(&config)),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn summarize(config: &ServiceConfig) -> ConfigSummary {
    let controls = &config.controls;
    let active_controls = [
        ("bias", controls.bias.enabled),
        ("gain", controls.gain.enabled),
        ("shutter", controls.shutter.enabled),
    ]
    .into_iter()
    .filter_map(|(name, enabled)| enabled.then_some(name))
    .collect();

    ConfigSummary {
        resolution: format!("{}x{}", config.camera.width, config.camera.height),
        capture_fps: config.camera.capture_fps,
        adaptive_exposure: config.exposure.adaptive,
        adjust_enabled: config.adjust.enabled,
        active_controls,
        detect_every_n_frames: config.detect.every_n_frames,
        save_enabled: config.save.enabled,
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &ServiceConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.exposure.adaptive && !config.adjust.enabled {
        warnings.push(
            "adjust.enabled is false - exposure is classified but camera controls never move"
                .to_string(),
        );
    }

    if config.save.enabled && config.save.sink == SaveSinkType::Log {
        warnings.push("save.sink is 'log' - detections are logged but no images are written".to_string());
    }

    if let Some(ref mask) = config.motion.ignore_mask {
        if !mask.exists() {
            warnings.push(format!(
                "motion.ignore_mask '{}' not found - detection will fail at startup",
                mask.display()
            ));
        }
    }

    if config.camera.capture_fps > HIGH_FPS_WARNING {
        warnings.push(format!(
            "camera.capture_fps is {} - analysis may not keep up",
            config.camera.capture_fps
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Resolution: {}", summary.resolution);
            println!("  Capture fps: {}", summary.capture_fps);
            println!("  Adaptive exposure: {}", summary.adaptive_exposure);
            println!("  Adjustment windows: {}", summary.adjust_enabled);
            println!("  Controls: {}", summary.active_controls.join(", "));
            println!("  Detect every: {} frames", summary.detect_every_n_frames);
            println!("  Saving: {}", summary.save_enabled);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args(config: PathBuf) -> ValidateArgs {
        ValidateArgs {
            config,
            json: false,
        }
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&args(PathBuf::from("/nonexistent/secam.toml")));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }

    #[test]
    fn test_valid_file_with_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secam.toml");
        std::fs::write(
            &path,
            r#"
[camera]
capture_fps = 30.0

[adjust]
enabled = false
"#,
        )
        .unwrap();

        let result = validate_config(&args(path));
        assert!(result.valid, "error: {:?}", result.error);
        let warnings = result.warnings.unwrap();
        assert!(warnings.iter().any(|w| w.contains("adjust.enabled")));
        assert!(warnings.iter().any(|w| w.contains("capture_fps")));
        assert!(warnings.iter().any(|w| w.contains("save.sink")));
    }

    #[test]
    fn test_invalid_value_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secam.toml");
        std::fs::write(&path, "[camera]\ncapture_fps = 0.0\n").unwrap();

        let result = validate_config(&args(path));
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("capture_fps"));
    }

    #[test]
    fn test_summary_lists_enabled_controls() {
        let mut config = ServiceConfig::default();
        config.controls.shutter.enabled = false;
        let summary = summarize(&config);
        assert!(!summary.active_controls.contains(&"shutter"));
    }
}
