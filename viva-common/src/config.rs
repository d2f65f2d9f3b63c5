//! Configuration file loading and data directory resolution

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration for the viva-rp service
///
/// Every field is optional; the service layers database settings and
/// environment variables on top of this file (resolution order is
/// Database -> ENV -> TOML, highest first).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// SQLite database file path
    pub database_path: Option<String>,
    /// HTTP listen port
    pub port: Option<u16>,
    /// Shared secret for webhook signature verification
    pub webhook_secret: Option<String>,
    /// Voice gateway API key
    pub voice_api_key: Option<String>,
    /// Voice gateway base URL override
    pub voice_base_url: Option<String>,
    /// Scoring provider API key
    pub scoring_api_key: Option<String>,
    /// Scoring provider base URL override
    pub scoring_base_url: Option<String>,
    /// Scoring model identifier
    pub scoring_model: Option<String>,
}

/// Default configuration file path for the platform
///
/// Linux/macOS/Windows: `<config dir>/viva/viva-rp.toml`
pub fn config_file_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("viva").join("viva-rp.toml"))
}

/// Load the TOML configuration
///
/// A missing file is not an error; the service runs on env vars and
/// defaults alone. A present but unparseable file is surfaced so a typo
/// does not silently drop configured credentials.
pub fn load_toml_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match config_file_path() {
            Some(p) => p,
            None => return Ok(TomlConfig::default()),
        },
    };

    if !path.exists() {
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .map_err(|e| Error::Config(format!("Read TOML failed ({}): {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Write the TOML configuration atomically (write temp, rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    Ok(())
}

/// OS-dependent default data directory for the service database
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("viva"))
        .unwrap_or_else(|| PathBuf::from("./viva_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent.toml");

        let config = load_toml_config(Some(&path)).unwrap();
        assert!(config.webhook_secret.is_none());
        assert!(config.port.is_none());
    }

    #[test]
    fn test_roundtrip_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viva-rp.toml");

        let config = TomlConfig {
            port: Some(5740),
            webhook_secret: Some("s3cret".to_string()),
            scoring_model: Some("gpt-4o".to_string()),
            ..Default::default()
        };
        write_toml_config(&config, &path).unwrap();

        let loaded = load_toml_config(Some(&path)).unwrap();
        assert_eq!(loaded.port, Some(5740));
        assert_eq!(loaded.webhook_secret.as_deref(), Some("s3cret"));
        assert_eq!(loaded.scoring_model.as_deref(), Some("gpt-4o"));
        assert!(loaded.voice_api_key.is_none());
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("viva-rp.toml");
        std::fs::write(&path, "port = \"not a number").unwrap();

        assert!(load_toml_config(Some(&path)).is_err());
    }
}
