//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::ServiceConfig;

pub use info::run_info;
pub use run::run_service;
pub use validate::run_validate;

/// Load and validate a config file, or fall back to validated defaults
fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Configuration file not found: {}", path.display());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            let config = ServiceConfig::default();
            config_loader::validate(&config).context("Built-in defaults are invalid")?;
            Ok(config)
        }
    }
}
