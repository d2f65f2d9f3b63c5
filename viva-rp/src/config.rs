//! Configuration resolution for viva-rp
//!
//! Multi-tier resolution with Database -> ENV -> TOML priority. The
//! database settings table is authoritative so operators can rotate
//! credentials through the running service; env vars cover deployment
//! automation; the TOML file is the at-rest fallback.

use rand::Rng;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tracing::{info, warn};
use viva_common::config::TomlConfig;
use viva_common::{Error, Result};

use crate::db::settings;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5740;

/// Default voice gateway base URL
pub const DEFAULT_VOICE_BASE_URL: &str = "https://api.voicegateway.example.com";

/// Default scoring provider base URL
pub const DEFAULT_SCORING_BASE_URL: &str = "https://api.openai.com";

/// Default scoring model
pub const DEFAULT_SCORING_MODEL: &str = "gpt-4o";

/// Resolved runtime configuration for the service
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub voice_api_key: String,
    pub voice_base_url: String,
    pub scoring_api_key: String,
    pub scoring_base_url: String,
    pub scoring_model: String,
}

/// Resolve the SQLite database path (ENV -> TOML -> platform default)
pub fn resolve_database_path(toml_config: &TomlConfig) -> PathBuf {
    if let Ok(path) = std::env::var("VIVA_DATABASE") {
        return PathBuf::from(path);
    }
    if let Some(path) = &toml_config.database_path {
        return PathBuf::from(path);
    }
    viva_common::config::default_data_dir().join("viva.db")
}

/// Resolve the HTTP listen port (ENV -> TOML -> default)
pub fn resolve_port(toml_config: &TomlConfig) -> u16 {
    if let Ok(port) = std::env::var("VIVA_PORT") {
        if let Ok(port) = port.parse() {
            return port;
        }
        warn!("VIVA_PORT is not a valid port number, ignoring");
    }
    toml_config.port.unwrap_or(DEFAULT_PORT)
}

/// Resolve the webhook shared secret
///
/// Priority: Database -> ENV -> TOML. When no tier has a secret yet, one is
/// generated and stored in the database so webhook verification works out
/// of the box; the operator then configures the same secret provider-side.
pub async fn resolve_webhook_secret(db: &SqlitePool, toml_config: &TomlConfig) -> Result<String> {
    if let Some(secret) = settings::get_webhook_secret(db).await? {
        if is_valid_key(&secret) {
            info!("Webhook secret loaded from database");
            return Ok(secret);
        }
    }

    if let Ok(secret) = std::env::var("VIVA_WEBHOOK_SECRET") {
        if is_valid_key(&secret) {
            info!("Webhook secret loaded from environment variable");
            settings::set_webhook_secret(db, &secret).await?;
            return Ok(secret);
        }
    }

    if let Some(secret) = &toml_config.webhook_secret {
        if is_valid_key(secret) {
            info!("Webhook secret loaded from TOML config");
            settings::set_webhook_secret(db, secret).await?;
            return Ok(secret.clone());
        }
    }

    let secret = generate_secret();
    settings::set_webhook_secret(db, &secret).await?;
    warn!("No webhook secret configured; generated one and stored it in the database");
    Ok(secret)
}

/// Resolve both provider credentials and endpoints
pub async fn resolve_provider_config(
    db: &SqlitePool,
    toml_config: &TomlConfig,
) -> Result<ProviderConfig> {
    let voice_api_key = resolve_api_key(
        db,
        settings::KEY_VOICE_API_KEY,
        "VIVA_VOICE_API_KEY",
        toml_config.voice_api_key.as_deref(),
        "voice gateway",
    )
    .await?;

    let scoring_api_key = resolve_api_key(
        db,
        settings::KEY_SCORING_API_KEY,
        "VIVA_SCORING_API_KEY",
        toml_config.scoring_api_key.as_deref(),
        "scoring provider",
    )
    .await?;

    let voice_base_url = std::env::var("VIVA_VOICE_BASE_URL")
        .ok()
        .or_else(|| toml_config.voice_base_url.clone())
        .unwrap_or_else(|| DEFAULT_VOICE_BASE_URL.to_string());

    let scoring_base_url = std::env::var("VIVA_SCORING_BASE_URL")
        .ok()
        .or_else(|| toml_config.scoring_base_url.clone())
        .unwrap_or_else(|| DEFAULT_SCORING_BASE_URL.to_string());

    let scoring_model = std::env::var("VIVA_SCORING_MODEL")
        .ok()
        .or_else(|| toml_config.scoring_model.clone())
        .unwrap_or_else(|| DEFAULT_SCORING_MODEL.to_string());

    Ok(ProviderConfig {
        voice_api_key,
        voice_base_url,
        scoring_api_key,
        scoring_base_url,
        scoring_model,
    })
}

/// Resolve one API key from 3-tier configuration
///
/// Priority: Database -> ENV -> TOML, with a warning when multiple sources
/// are populated (potential misconfiguration).
async fn resolve_api_key(
    db: &SqlitePool,
    settings_key: &str,
    env_var: &str,
    toml_key: Option<&str>,
    label: &str,
) -> Result<String> {
    let db_key = settings::get_setting(db, settings_key).await?;
    let env_key = std::env::var(env_var).ok();

    let mut sources = Vec::new();
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }
    if toml_key.is_some_and(is_valid_key) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} API key found in multiple sources: {}. Using {} (highest priority).",
            label,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("{} API key loaded from database", label);
            return Ok(key);
        }
    }

    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("{} API key loaded from environment variable", label);
            return Ok(key);
        }
    }

    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("{} API key loaded from TOML config", label);
            return Ok(key.to_string());
        }
    }

    Err(Error::Config(format!(
        "{} API key not configured. Please configure using one of:\n\
         1. Database: settings key '{}'\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: ~/.config/viva/viva-rp.toml",
        label, settings_key, env_var
    )))
}

/// Validate API key / secret (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Generate a random hex secret
fn generate_secret() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
