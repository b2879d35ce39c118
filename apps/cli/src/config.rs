//! CLI configuration loading and merging.

use crate::commands::types::ConfigOverrides;
use anyhow::{Context, Result};
use peft_training::{ConfigLayer, RunConfig};

/// Load and merge CLI configuration.
///
/// Configuration precedence:
/// 1. CLI arguments (handled by clap)
/// 2. Environment variables
/// 3. Local config file (./.peftrc)
/// 4. Global config file (~/.peft/config.toml)
/// 5. Defaults
pub fn load_layer(overrides: &ConfigOverrides) -> Result<ConfigLayer> {
    let mut layer = ConfigLayer::discover_and_load().context("Failed to load configuration files")?;
    layer.merge(&ConfigLayer {
        project_id: overrides.project.clone(),
        region: overrides.region.clone(),
        bucket_uri: overrides.bucket.clone(),
        service_account: overrides.service_account.clone(),
        ..ConfigLayer::default()
    });
    Ok(layer)
}

/// Load, merge, and check configuration; fails on missing required settings.
pub fn load_config(overrides: &ConfigOverrides) -> Result<RunConfig> {
    let layer = load_layer(overrides)?;
    RunConfig::from_layer(&layer).context("Invalid configuration (set PEFT_PROJECT_ID and PEFT_BUCKET_URI, or use ~/.peft/config.toml)")
}
