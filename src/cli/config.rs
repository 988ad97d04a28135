use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::client::{ClientConfig, NvlpClient};
use crate::token::{FileTokenStorage, TokenManager};

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_AUTH_URL: &str = "http://localhost:54321";

/// Persistent CLI settings, stored as `cli.json` in the config directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    pub api_url: Option<String>,
    pub auth_url: Option<String>,
    pub anon_key: Option<String>,
    pub device_id: Option<String>,
}

pub fn get_config_dir() -> anyhow::Result<PathBuf> {
    let config_dir = FileTokenStorage::default_dir()?;
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir)
}

pub fn load_cli_config(dir: &Path) -> anyhow::Result<CliConfig> {
    let file = dir.join("cli.json");
    if !file.exists() {
        return Ok(CliConfig::default());
    }
    let content = fs::read_to_string(file)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn save_cli_config(dir: &Path, config: &CliConfig) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(dir.join("cli.json"), content)?;
    Ok(())
}

/// Environment variables win over `cli.json`. A device id is generated and saved on
/// first use so the server sees one stable device per install.
pub fn resolve_client_config(dir: &Path) -> anyhow::Result<ClientConfig> {
    let mut stored = load_cli_config(dir)?;

    let device_id = match stored.device_id.clone() {
        Some(id) => id,
        None => {
            let id = uuid::Uuid::new_v4().to_string();
            stored.device_id = Some(id.clone());
            save_cli_config(dir, &stored)?;
            id
        }
    };

    let api_url = std::env::var("NVLP_API_URL")
        .ok()
        .or(stored.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let auth_url = std::env::var("NVLP_AUTH_URL")
        .ok()
        .or(stored.auth_url)
        .unwrap_or_else(|| DEFAULT_AUTH_URL.to_string());
    let anon_key = std::env::var("NVLP_ANON_KEY").ok().or(stored.anon_key).unwrap_or_default();

    Ok(ClientConfig::new(&api_url, &auth_url, &anon_key, &device_id))
}

pub fn build_client(profile: &str) -> anyhow::Result<NvlpClient<FileTokenStorage>> {
    let dir = get_config_dir()?;
    let config = resolve_client_config(&dir)?;
    let tokens = TokenManager::new(FileTokenStorage::new(&dir, profile));
    Ok(NvlpClient::new(config, tokens)?)
}
