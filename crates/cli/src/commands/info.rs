//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ServiceConfig, StepperConfig};
use tracing::info;

use super::load_config;
use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    match args.config {
        Some(ref path) => info!(config = %path.display(), "Loading configuration info"),
        None => info!("Showing built-in defaults"),
    }

    let config = load_config(args.config.as_deref())?;

    if args.json {
        let json = config_loader::ConfigLoader::to_json(&config)
            .context("Failed to serialize config as JSON")?;
        println!("{}", json);
    } else if args.toml {
        let toml = config_loader::ConfigLoader::to_toml(&config)
            .context("Failed to serialize config as TOML")?;
        println!("{}", toml);
    } else {
        print_config_info(&config);
    }

    Ok(())
}

fn print_config_info(config: &ServiceConfig) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                  secam Configuration                         ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let camera = &config.camera;
    println!("📷 Camera");
    println!("   ├─ Resolution: {}x{}", camera.width, camera.height);
    println!("   ├─ Capture: {} fps", camera.capture_fps);
    println!("   ├─ Rotate: {}°", camera.rotate_degrees);
    println!("   ├─ Profile: {:?}", camera.profile);
    println!("   └─ Luma plane: {}", camera.use_luma);

    let exposure = &config.exposure;
    println!("\n☀️  Exposure");
    println!("   ├─ Adaptive: {}", exposure.adaptive);
    println!("   ├─ EMA alpha: {}", exposure.ema_alpha);
    println!(
        "   ├─ Dark enter/exit: {} / {}",
        exposure.dark_enter_mean, exposure.dark_exit_mean
    );
    println!("   ├─ Bright mean: {}", exposure.bright_mean);
    println!(
        "   └─ Clip fractions: low {} (<= {}), high {} (>= {})",
        exposure.low_clip_frac, exposure.low_cutoff, exposure.high_clip_frac, exposure.high_cutoff
    );

    let adjust = &config.adjust;
    println!("\n⚙️  Adjustment");
    println!("   ├─ Enabled: {}", adjust.enabled);
    println!("   ├─ Period: {}s, pause: {}s", adjust.period_sec, adjust.pause_sec);
    print_stepper("├─", "Bias", &config.controls.bias);
    print_stepper("├─", "Gain", &config.controls.gain);
    print_stepper("└─", "Shutter", &config.controls.shutter);

    let motion = &config.motion;
    let detect = &config.detect;
    println!("\n🔍 Detection");
    println!(
        "   ├─ Every {} frames (x{} when exposure is poor)",
        detect.every_n_frames, detect.poor_exposure_stride_scale
    );
    println!(
        "   ├─ Threshold: {} (adaptive: {}, max {})",
        motion.base_threshold, motion.adaptive, motion.max_threshold
    );
    println!(
        "   ├─ Min changed/region pixels: {} / {}",
        motion.min_changed_pixels, motion.min_region_pixels
    );
    match motion.ignore_mask {
        Some(ref mask) => println!("   ├─ Ignore mask: {}", mask.display()),
        None => println!("   ├─ Ignore mask: (none)"),
    }
    println!("   └─ Alert cooldown: {}s", detect.alert_cooldown_sec);

    let save = &config.save;
    println!("\n📤 Saving");
    if save.enabled {
        println!("   ├─ Sink: {:?}", save.sink);
        println!("   ├─ Output: {} ({:?})", save.output_dir.display(), save.image_format);
        println!("   └─ Min interval: {}s, queue {}", save.min_interval_sec, save.queue_capacity);
    } else {
        println!("   └─ Disabled");
    }

    println!();
}

fn print_stepper(prefix: &str, name: &str, stepper: &StepperConfig) {
    if stepper.enabled {
        println!(
            "   {} {}: [{}, {}] step {} back {} every {}s, baseline {}",
            prefix,
            name,
            stepper.min,
            stepper.max,
            stepper.step,
            stepper.return_step,
            stepper.min_update_interval_sec,
            stepper.baseline
        );
    } else {
        println!("   {} {}: disabled", prefix, name);
    }
}
