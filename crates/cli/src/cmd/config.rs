//! Configuration management command
//!
//! View and edit the dispatcher and scheduler settings.

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use std::path::Path;
use ui_core::config::MAX_DELAY_MS;
use ui_core::UiConfig;

const OVERRIDE_PREFIX: &str = "scheduler.overrides.";

/// List all configuration values
pub fn run_list(config_path: Option<&Path>) -> Result<()> {
    let (config, path) = util::load_config(config_path)?;

    println!("{}", "Campaign UI Configuration".bold());
    println!("{}: {}\n", "Location".dimmed(), path.display().dimmed());

    println!("{}", "[dispatch]".yellow());
    println!("  {} = {:?}", "thread_name".cyan(), config.dispatch.thread_name);

    println!("\n{}", "[scheduler]".yellow());
    println!(
        "  {} = {} {}",
        "default_delay_ms".cyan(),
        config.scheduler.default_delay_ms,
        format!("({}ms)", config.scheduler.default_delay_ms).dimmed()
    );

    if !config.scheduler.overrides.is_empty() {
        println!("\n{}", "[scheduler.overrides]".yellow());
        for (panel, delay_ms) in &config.scheduler.overrides {
            println!("  {} = {}", panel.cyan(), delay_ms);
        }
    }

    println!("\n{}", "Valid Ranges:".bold());
    println!("  default_delay_ms: 0-{}", MAX_DELAY_MS);
    println!("  overrides.<panel>: 0-{}", MAX_DELAY_MS);

    Ok(())
}

/// Get a single configuration value
pub fn run_get(config_path: Option<&Path>, key: &str) -> Result<()> {
    let (config, _) = util::load_config(config_path)?;
    println!("{}", get_value(&config, key)?);
    Ok(())
}

fn get_value(config: &UiConfig, key: &str) -> Result<String> {
    let value = match key {
        "dispatch.thread_name" => config.dispatch.thread_name.clone(),
        "scheduler.default_delay_ms" => config.scheduler.default_delay_ms.to_string(),
        _ => match key.strip_prefix(OVERRIDE_PREFIX) {
            Some(panel) => config
                .scheduler
                .overrides
                .get(panel)
                .map(|ms| ms.to_string())
                .with_context(|| format!("No override set for panel '{}'", panel))?,
            None => anyhow::bail!(
                "Unknown config key: {}. Use 'campaign-ui config list' to see available keys.",
                key
            ),
        },
    };
    Ok(value)
}

/// Set a configuration value
pub fn run_set(config_path: Option<&Path>, key: &str, value: &str) -> Result<()> {
    let (mut config, path) = util::load_config(config_path)?;

    set_value(&mut config, key, value)?;
    config.validate().context("Invalid configuration value")?;
    config
        .save(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {} = {}", "✓".green(), key.cyan(), value);
    Ok(())
}

fn set_value(config: &mut UiConfig, key: &str, value: &str) -> Result<()> {
    match key {
        "dispatch.thread_name" => {
            config.dispatch.thread_name = value.to_string();
        }
        "scheduler.default_delay_ms" => {
            config.scheduler.default_delay_ms = value
                .parse()
                .context("Invalid value: must be a non-negative integer")?;
        }
        _ => match key.strip_prefix(OVERRIDE_PREFIX) {
            Some(panel) if !panel.is_empty() => {
                let ms: u64 = value
                    .parse()
                    .context("Invalid value: must be a non-negative integer")?;
                config.scheduler.overrides.insert(panel.to_string(), ms);
            }
            _ => anyhow::bail!(
                "Unknown config key: {}. Use 'campaign-ui config list' to see available keys.",
                key
            ),
        },
    }
    Ok(())
}

/// Show the config file path and optionally create it
pub fn run_path(config_path: Option<&Path>, create: bool) -> Result<()> {
    let path = util::config_file_path(config_path)?;

    if create && !path.exists() {
        UiConfig::default()
            .save(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        println!("{} Created config file at: {}", "✓".green(), path.display());
    } else {
        println!("{}", path.display());
        if !path.exists() {
            println!("{}", "File does not exist. Use --create to create it.".yellow());
        }
    }

    Ok(())
}

/// Show example configuration
pub fn run_example() -> Result<()> {
    println!("{}", UiConfig::example());
    Ok(())
}
