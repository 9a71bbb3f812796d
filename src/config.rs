//! Configuration management for creel.
//!
//! Settings are an explicit object passed into the subsystems that need them,
//! loaded from an optional TOML file in the data directory with environment
//! variable overrides for credentials. Nothing here is global or mutable.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::llm::LlmConfig;
use crate::pipeline::PipelineConfig;
use crate::scrapers::ScraperConfig;

/// Name of the optional configuration file inside the data directory.
pub const CONFIG_FILE: &str = "creel.toml";

/// Name of the SQLite database inside the data directory.
pub const DATABASE_FILE: &str = "fishing_reports.db";

/// File-level configuration, one section per subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
}

/// Resolved settings: data directory plus configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub data_dir: PathBuf,
    pub config: Config,
}

impl Settings {
    /// Load settings for the given data directory (or the platform default),
    /// reading `creel.toml` if present and applying environment overrides.
    pub fn load(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        let config_path = data_dir.join(CONFIG_FILE);
        let mut config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)?;
            toml::from_str(&raw)?
        } else {
            Config::default()
        };

        apply_env_overrides(&mut config);

        Ok(Self { data_dir, config })
    }

    /// Path to the SQLite database.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.data_dir)?;
        Ok(())
    }

    /// Write the current configuration back to `creel.toml`.
    pub fn write_config(&self) -> anyhow::Result<PathBuf> {
        let path = self.data_dir.join(CONFIG_FILE);
        fs::write(&path, toml::to_string_pretty(&self.config)?)?;
        Ok(path)
    }
}

/// Default data directory: `$XDG_DATA_HOME/creel` (or platform equivalent),
/// falling back to `.creel` in the working directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("creel"))
        .unwrap_or_else(|| PathBuf::from(".creel"))
}

/// Credentials come from the environment (or `.env`), never the config file.
fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        if !key.is_empty() {
            config.llm.api_key = Some(key);
        }
    }
    if let Ok(email) = std::env::var("LAKELINK_EMAIL") {
        if !email.is_empty() {
            config.scraper.email = Some(email);
        }
    }
    if let Ok(password) = std::env::var("LAKELINK_PASSWORD") {
        if !password.is_empty() {
            config.scraper.password = Some(password);
        }
    }
}

/// Expand a user-supplied path, resolving a leading `~`.
pub fn expand_path(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_round_trips() {
        let config = Config::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();
        assert_eq!(parsed.pipeline.workers, config.pipeline.workers);
        assert_eq!(parsed.llm.model, config.llm.model);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [pipeline]
            workers = 4
            "#,
        )
        .unwrap();
        assert_eq!(parsed.pipeline.workers, 4);
        assert_eq!(parsed.scraper.records_per_page, ScraperConfig::default().records_per_page);
    }
}
