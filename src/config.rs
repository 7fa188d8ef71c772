use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProviderConfig {
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.privatbank.ua".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind: "127.0.0.1:8765".to_string(),
        }
    }
}

fn default_journal_path() -> String {
    "log.txt".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default = "default_journal_path")]
    pub journal: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            provider: ProviderConfig::default(),
            server: ServerConfig::default(),
            journal: default_journal_path(),
        }
    }
}

impl AppConfig {
    /// Loads the default config file when it exists; the whole surface has
    /// working defaults, so a missing file is not an error.
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config file at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "xrates")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/p24"
server:
  bind: "0.0.0.0:9000"
journal: "/var/log/xrates.txt"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/p24");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.journal, "/var/log/xrates.txt");
    }

    #[test]
    fn test_partial_config_falls_back_to_defaults() {
        let yaml_str = r#"
provider:
  base_url: "http://example.com/p24"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.provider.base_url, "http://example.com/p24");
        assert_eq!(config.server.bind, "127.0.0.1:8765");
        assert_eq!(config.journal, "log.txt");
    }

    #[test]
    fn test_default_base_url_points_at_privatbank() {
        let config = AppConfig::default();
        assert_eq!(config.provider.base_url, "https://api.privatbank.ua");
    }

    #[test]
    fn test_load_from_missing_path_is_an_error() {
        let result = AppConfig::load_from_path("/nonexistent/config.yaml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
