use crate::core::store::StoreEndpoint;
use eyre::{Context, eyre};
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

pub const DEFAULT_PLACEHOLDER_AVATAR: &str = "https://placehold.co/200x200";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub store_url: Option<String>,
    pub anon_key: Option<String>,
    pub placeholder_avatar_url: String,
    pub max_message_chars: usize,
    pub privileged_bypass_gate: bool,
    pub font_size: f32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            anon_key: None,
            placeholder_avatar_url: DEFAULT_PLACEHOLDER_AVATAR.to_string(),
            max_message_chars: 300,
            privileged_bypass_gate: true,
            font_size: 14.0,
        }
    }
}

impl Config {
    pub fn store_endpoint(&self) -> Result<StoreEndpoint, eyre::Report> {
        let url = self
            .store_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| eyre!("store_url is not configured"))?;
        let key = self
            .anon_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| eyre!("anon_key is not configured"))?;
        StoreEndpoint::new(url, key).map_err(|e| eyre!("Invalid store endpoint: {}", e))
    }
}

fn get_config_path() -> Result<PathBuf, eyre::Report> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| eyre!("Could not find a config directory"))?
        .join(env!("CARGO_PKG_NAME"));

    Ok(config_dir.join("app_config.toml"))
}

fn figment(user_config_path: &Path) -> Figment {
    Figment::new()
        .merge(Toml::file("config/app_config.toml"))
        .merge(Toml::file(user_config_path))
        .merge(Env::prefixed("HROOMS_"))
}

pub async fn load() -> Result<Config, eyre::Report> {
    load_from(&get_config_path()?).await
}

/// Loads with `user_config_path` as the user layer, seeding that file with
/// the merged result when it does not exist yet.
async fn load_from(user_config_path: &Path) -> Result<Config, eyre::Report> {
    tracing::info!("Loading user config from {:?}", user_config_path);

    let config: Config = figment(user_config_path)
        .extract()
        .context("Could not load config")?;

    if !user_config_path.exists() {
        if let Err(e) = save(user_config_path, &config).await {
            tracing::warn!("Failed to save initial config: {}", e);
        }
    }

    Ok(config)
}

async fn save(path: &Path, config: &Config) -> Result<(), eyre::Report> {
    tracing::info!("Saving config to {:?}", path);

    let bytes = toml::to_string_pretty(config).context("Failed to serialize config")?;

    if let Some(parent) = path.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }
    }

    let mut file = tokio::fs::File::create(path)
        .await
        .context("Failed to create config file")?;

    file.write_all(bytes.as_bytes())
        .await
        .context("Failed to write config to file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_chat_client() {
        let config = Config::default();
        assert_eq!(config.max_message_chars, 300);
        assert_eq!(config.placeholder_avatar_url, DEFAULT_PLACEHOLDER_AVATAR);
        assert!(config.privileged_bypass_gate);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: Config = Figment::new()
            .merge(Toml::string(
                "store_url = \"https://demo.example.co\"\nanon_key = \"k\"\nmax_message_chars = 120",
            ))
            .extract()
            .unwrap();
        assert_eq!(config.max_message_chars, 120);
        assert_eq!(config.font_size, 14.0);
        let endpoint = config.store_endpoint().unwrap();
        assert_eq!(endpoint.api_key, "k");
    }

    #[tokio::test]
    async fn first_load_seeds_the_user_file() {
        let path = crate::test_support::scratch_file("app_config.toml");
        assert!(!path.exists());

        let config = load_from(&path).await.unwrap();
        assert!(path.exists());

        let written = tokio::fs::read_to_string(&path).await.unwrap();
        let reread: Config = toml::from_str(&written).unwrap();
        assert_eq!(reread, config);
    }

    #[tokio::test]
    async fn user_file_overrides_defaults() {
        let path = crate::test_support::scratch_file("app_config.toml");
        let custom = Config {
            max_message_chars: 42,
            font_size: 18.0,
            ..Config::default()
        };
        save(&path, &custom).await.unwrap();

        let config = load_from(&path).await.unwrap();
        assert_eq!(config.max_message_chars, 42);
        assert_eq!(config.font_size, 18.0);
    }

    #[test]
    fn missing_endpoint_is_reported() {
        let config = Config {
            store_url: Some("https://demo.example.co".to_string()),
            ..Config::default()
        };
        assert!(config.store_endpoint().is_err());
    }
}
