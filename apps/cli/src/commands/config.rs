//! Config command implementation.

use crate::commands::types::{ConfigCommand, ConfigOverrides};
use crate::config;
use anyhow::Result;
use colored::Colorize;
use peft_training::{ConfigLayer, RunConfig};
use serde_json::json;

pub fn execute(overrides: &ConfigOverrides, command: ConfigCommand) -> Result<()> {
    match command {
        ConfigCommand::Show { json } => show(overrides, json),
    }
}

fn redact(value: Option<&String>) -> &'static str {
    if value.is_some_and(|v| !v.trim().is_empty()) { "set" } else { "not set" }
}

/// Print the merged layers and whether they form a usable configuration.
/// Secrets are only ever reported as set or not set.
fn show(overrides: &ConfigOverrides, as_json: bool) -> Result<()> {
    let layer = config::load_layer(overrides)?;
    let checked = RunConfig::from_layer(&layer);

    if as_json {
        let out = json!({
            "global_path": ConfigLayer::default_global_path(),
            "local_path": ConfigLayer::default_local_path(),
            "config": checked.as_ref().ok(),
            "error": checked.as_ref().err().map(ToString::to_string),
            "access_token": redact(layer.access_token.as_ref()),
            "hf_token": redact(layer.hf_token.as_ref()),
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!();
    println!("{}", "PEFT configuration".bold().cyan());
    println!("  Global file: {}", ConfigLayer::default_global_path().display().to_string().dimmed());
    println!("  Local file:  {}", ConfigLayer::default_local_path().display().to_string().dimmed());
    println!();
    match &checked {
        Ok(cfg) => {
            println!("  project_id:      {}", cfg.project_id);
            println!("  region:          {}", cfg.region);
            println!("  bucket_uri:      {}", cfg.bucket_uri);
            println!("  service_account: {}", cfg.service_account.as_deref().unwrap_or("-"));
            println!("  api_base_url:    {}", cfg.api_base_url);
            println!("  training_image:  {}", cfg.training_image);
            println!("  serving_image:   {}", cfg.serving_image);
        }
        Err(e) => println!("  {} {}", "Incomplete:".yellow().bold(), e),
    }
    println!("  access_token:    {}", redact(layer.access_token.as_ref()));
    println!("  hf_token:        {}", redact(layer.hf_token.as_ref()));
    println!();
    Ok(())
}
