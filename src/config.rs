// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions for loading the config file and the source registry
//! it points at.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, SourceRegistry};

/// Load configuration from a TOML file.
///
/// A missing or unreadable file falls back to defaults; an invalid one is an
/// error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = Config::load_or_default(path);
    config
        .validate()
        .map_err(|e| AppError::config(format!("Invalid config {}: {e}", path.display())))?;
    Ok(config)
}

/// Load the source registry and check it against the configured boards.
pub fn load_sources(config: &Config) -> Result<SourceRegistry> {
    let path = Path::new(&config.paths.sources_file);
    let registry = SourceRegistry::load(path).map_err(|e| {
        AppError::config(format!("Failed to load sources from {}: {e}", path.display()))
    })?;
    registry
        .validate(config)
        .map_err(|e| AppError::config(format!("Invalid sources file: {e}")))?;
    Ok(registry)
}

/// Load and validate both config and sources.
pub fn load_all(config_path: &Path) -> Result<(Config, SourceRegistry)> {
    let config = load_config(config_path)?;
    let registry = load_sources(&config)?;
    log::debug!(
        "Loaded {} source(s), {} enabled",
        registry.sources.len(),
        registry.enabled().len()
    );
    Ok((config, registry))
}
