//! Service configuration
//!
//! Provider endpoints, keys, and operational bounds. Resolution priority
//! is environment variable over TOML file over compiled default; the TOML
//! file is `forge-gen.toml` under the root data folder.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 5860;
const DEFAULT_MODEL_API_URL: &str = "https://api.meshy.ai/openapi/v2/image-to-3d";

/// Optional overrides from `<root>/forge-gen.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    pub public_base_url: Option<String>,
    pub image_api_url: Option<String>,
    pub image_api_key: Option<String>,
    pub model_api_url: Option<String>,
    pub model_api_key: Option<String>,
    pub model_webhook_url: Option<String>,
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct GenConfig {
    /// Port the HTTP server binds
    pub port: u16,
    /// Base URL clients (and the model provider) reach this service at
    pub public_base_url: String,

    /// Hosted text-to-image endpoint; absent means procedural-only 2D
    pub image_api_url: Option<String>,
    pub image_api_key: Option<String>,

    /// Image-to-3D job provider
    pub model_api_url: String,
    pub model_api_key: Option<String>,
    /// Webhook URL handed to the provider at job creation; absent means
    /// the service polls the provider itself in the background
    pub model_webhook_url: Option<String>,

    /// Bound on each synchronous generator call (tiers 1 and 2)
    pub generate_timeout: Duration,
    /// Background watcher poll pacing and budget
    pub poll_initial_delay: Duration,
    pub poll_max_delay: Duration,
    pub poll_max_attempts: u32,
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(name: &str) -> Option<u64> {
    match env_string(name) {
        Some(v) => match v.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                warn!("Ignoring non-numeric {name}={v}");
                None
            }
        },
        None => None,
    }
}

impl GenConfig {
    /// Load configuration: environment first, TOML fallback, then
    /// compiled defaults.
    pub fn load(root_folder: &Path, cli_port: Option<u16>) -> Self {
        let toml_path = root_folder.join("forge-gen.toml");
        let toml: TomlConfig = if toml_path.exists() {
            match std::fs::read_to_string(&toml_path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => {
                        info!("Loaded config overrides from {}", toml_path.display());
                        config
                    }
                    Err(e) => {
                        warn!("Ignoring malformed {}: {}", toml_path.display(), e);
                        TomlConfig::default()
                    }
                },
                Err(e) => {
                    warn!("Ignoring unreadable {}: {}", toml_path.display(), e);
                    TomlConfig::default()
                }
            }
        } else {
            TomlConfig::default()
        };

        let port = cli_port
            .or_else(|| env_u64("FORGE_PORT").map(|p| p as u16))
            .unwrap_or(DEFAULT_PORT);

        let public_base_url = env_string("FORGE_PUBLIC_BASE_URL")
            .or(toml.public_base_url)
            .unwrap_or_else(|| format!("http://localhost:{port}"));

        Self {
            port,
            public_base_url,
            image_api_url: env_string("FORGE_IMAGE_API_URL").or(toml.image_api_url),
            image_api_key: env_string("FORGE_IMAGE_API_KEY").or(toml.image_api_key),
            model_api_url: env_string("FORGE_MODEL_API_URL")
                .or(toml.model_api_url)
                .unwrap_or_else(|| DEFAULT_MODEL_API_URL.to_string()),
            model_api_key: env_string("FORGE_MODEL_API_KEY").or(toml.model_api_key),
            model_webhook_url: env_string("FORGE_MODEL_WEBHOOK_URL").or(toml.model_webhook_url),
            generate_timeout: Duration::from_secs(env_u64("FORGE_GENERATE_TIMEOUT_SECS").unwrap_or(120)),
            poll_initial_delay: Duration::from_millis(env_u64("FORGE_POLL_INITIAL_DELAY_MS").unwrap_or(2000)),
            poll_max_delay: Duration::from_millis(env_u64("FORGE_POLL_MAX_DELAY_MS").unwrap_or(30_000)),
            poll_max_attempts: env_u64("FORGE_POLL_MAX_ATTEMPTS").unwrap_or(120) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_without_env_or_toml() {
        let tmp = TempDir::new().unwrap();
        let config = GenConfig::load(tmp.path(), None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.public_base_url, format!("http://localhost:{DEFAULT_PORT}"));
        assert_eq!(config.model_api_url, DEFAULT_MODEL_API_URL);
        assert_eq!(config.poll_max_attempts, 120);
    }

    #[test]
    fn toml_overrides_apply() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("forge-gen.toml"),
            "model_api_key = \"toml-key\"\npublic_base_url = \"https://forge.example\"\n",
        )
        .unwrap();

        let config = GenConfig::load(tmp.path(), Some(9000));
        assert_eq!(config.port, 9000);
        assert_eq!(config.model_api_key.as_deref(), Some("toml-key"));
        assert_eq!(config.public_base_url, "https://forge.example");
    }

    #[test]
    fn malformed_toml_degrades_to_defaults() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("forge-gen.toml"), "not [valid").unwrap();
        let config = GenConfig::load(tmp.path(), None);
        assert!(config.model_api_key.is_none());
    }
}
