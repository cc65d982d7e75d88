// ⚙️ Configuration
//
// fuelcell-ledger.toml:
//
//   [store]
//   path = "fuelcell-ledger.db"
//
//   [logging]
//   level = "info"
//   format = "plain"   # or "json"
//
// A missing file means defaults. FUELCELL_LEDGER_DB and FUELCELL_LEDGER_LOG
// override the store path and log level.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "fuelcell-ledger.toml";
pub const ENV_DB_PATH: &str = "FUELCELL_LEDGER_DB";
pub const ENV_LOG_LEVEL: &str = "FUELCELL_LEDGER_LOG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            path: PathBuf::from("fuelcell-ledger.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// EnvFilter directive, e.g. "info" or "fuelcell_ledger=debug"
    pub level: String,

    /// "plain" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "plain".to_string(),
        }
    }
}

impl LedgerConfig {
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse ledger configuration")
    }

    /// Read a config file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(LedgerConfig::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load the file then apply environment overrides
    pub fn resolve(path: &Path) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.store.path = PathBuf::from(path);
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
            self.logging.level = level;
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render ledger configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = LedgerConfig::from_toml(
            r#"
            [logging]
            format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.store.path, PathBuf::from("fuelcell-ledger.db"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = LedgerConfig::default();
        config.apply_overrides(|name| match name {
            ENV_DB_PATH => Some("/tmp/ledger.db".to_string()),
            ENV_LOG_LEVEL => Some(String::new()),
            _ => None,
        });

        assert_eq!(config.store.path, PathBuf::from("/tmp/ledger.db"));
        // Empty values are ignored
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_and_bad_file() {
        let missing = LedgerConfig::load(Path::new("/nonexistent/fuelcell-ledger.toml")).unwrap();
        assert_eq!(missing, LedgerConfig::default());

        assert!(LedgerConfig::from_toml("[store]\npath = 42").is_err());
    }

    #[test]
    fn test_rendered_config_parses_back() {
        let config = LedgerConfig::default();
        let rendered = config.to_toml().unwrap();
        assert!(rendered.contains("[store]"));
        assert_eq!(LedgerConfig::from_toml(&rendered).unwrap(), config);
    }
}
