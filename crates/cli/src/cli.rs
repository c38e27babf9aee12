//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// secam - security camera capture service
#[derive(Parser, Debug)]
#[command(
    name = "secam",
    author,
    version,
    about = "Security camera capture service",
    long_about = "Captures frames from a camera, keeps exposure in range by nudging bias, \n\
                  gain and shutter, and reports motion between frames.\n\n\
                  Detection pauses while the camera settles after an adjustment."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SECAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "SECAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture service
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "SECAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Frame source
    #[arg(long, value_enum, default_value = "mock", env = "SECAM_SOURCE")]
    pub source: SourceKind,

    /// Directory of recorded frames (required for `--source replay`)
    #[arg(long, required_if_eq("source", "replay"))]
    pub replay_dir: Option<PathBuf>,

    /// Start the replay over after the last frame
    #[arg(long)]
    pub replay_loop: bool,

    /// Scene brightness of the mock camera (0-255)
    #[arg(long, default_value = "110")]
    pub mock_level: f64,

    /// Override camera.capture_fps from configuration
    #[arg(long)]
    pub fps: Option<f64>,

    /// Stop after this many processed frames (0 = unlimited)
    #[arg(long, default_value = "0", env = "SECAM_MAX_FRAMES")]
    pub max_frames: u64,

    /// Stop after this many seconds (0 = no limit)
    #[arg(long, default_value = "0", env = "SECAM_DURATION_SEC")]
    pub duration_sec: u64,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "SECAM_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without capturing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "secam.toml", env = "SECAM_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long, env = "SECAM_CONFIG")]
    pub config: Option<PathBuf>,

    /// Print the effective configuration as JSON
    #[arg(long, conflicts_with = "toml")]
    pub json: bool,

    /// Print the effective configuration as TOML
    #[arg(long)]
    pub toml: bool,
}

/// Frame source for `run`
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SourceKind {
    /// Synthetic scene that reacts to exposure controls
    #[default]
    Mock,
    /// Recorded image files
    Replay,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => observability::LogFormat::Json,
            LogFormat::Pretty => observability::LogFormat::Pretty,
            LogFormat::Compact => observability::LogFormat::Compact,
        }
    }
}
