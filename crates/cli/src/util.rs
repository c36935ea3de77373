//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use ui_core::UiConfig;

/// Default location of the config file: `<config dir>/campaign-ui/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let dir = dirs::config_dir().context("Could not determine user config directory")?;
    Ok(dir.join("campaign-ui").join("config.toml"))
}

/// Config file to use, honouring a `--config` override
pub fn config_file_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_config_path(),
    }
}

/// Load the config file, falling back to defaults if it does not exist
pub fn load_config(explicit: Option<&Path>) -> Result<(UiConfig, PathBuf)> {
    let path = config_file_path(explicit)?;
    let config = UiConfig::load_or_default(&path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;
    Ok((config, path))
}

/// Format a C-bill amount with thousands separators ("-1,500 C-bills")
pub fn format_cbills(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} C-bills", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_format_cbills() {
        assert_eq!(format_cbills(0), "0 C-bills");
        assert_eq!(format_cbills(999), "999 C-bills");
        assert_eq!(format_cbills(1_500), "1,500 C-bills");
        assert_eq!(format_cbills(-5_000_000), "-5,000,000 C-bills");
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");

        assert_eq!(config_file_path(Some(&path)).unwrap(), path);
    }

    #[test]
    fn test_load_missing_config_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing.toml");

        let (config, loaded_from) = load_config(Some(&path)).unwrap();
        assert_eq!(config.scheduler.default_delay_ms, 100);
        assert_eq!(loaded_from, path);
    }
}
