use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf};

use crate::model::Domain;

pub const ENV_API_BASE_URL: &str = "WXAPP_API_BASE_URL";
pub const ENV_COGNITO_REGION: &str = "WXAPP_COGNITO_REGION";
pub const ENV_COGNITO_USER_POOL_ID: &str = "WXAPP_COGNITO_USER_POOL_ID";
pub const ENV_COGNITO_CLIENT_ID: &str = "WXAPP_COGNITO_CLIENT_ID";
pub const ENV_DEFAULT_DOMAIN: &str = "WXAPP_DEFAULT_DOMAIN";

const DEFAULT_API_BASE_URL: &str =
    "https://fmeq0xvw60.execute-api.ap-southeast-2.amazonaws.com/prod";

/// Cognito user pool the authenticated provider logs in against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CognitoConfig {
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
}

impl Default for CognitoConfig {
    fn default() -> Self {
        Self {
            region: "ap-southeast-2".to_string(),
            user_pool_id: "ap-southeast-2_T7xOIMSJh".to_string(),
            client_id: "1quihqsjtc5iq0f745phcd19".to_string(),
        }
    }
}

/// Top-level configuration stored on disk.
///
/// Only endpoints and defaults live here. Credentials and tokens are never
/// written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the metadata/extract API.
    pub api_base_url: String,

    /// Domain used when a login doesn't name one.
    pub default_domain: Domain,

    /// Example TOML:
    /// [cognito]
    /// region = "ap-southeast-2"
    /// client_id = "..."
    pub cognito: CognitoConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            default_domain: Domain::default(),
            cognito: CognitoConfig::default(),
        }
    }
}

impl Config {
    /// Load config from disk (or defaults on first run), then apply
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut cfg = Self::load_file()?;
        cfg.apply_overrides(|name| env::var(name).ok())?;
        Ok(cfg)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_file_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Override fields from `lookup` (normally the process environment).
    /// Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_API_BASE_URL) {
            self.api_base_url = url;
        }
        if let Some(region) = get(ENV_COGNITO_REGION) {
            self.cognito.region = region;
        }
        if let Some(pool) = get(ENV_COGNITO_USER_POOL_ID) {
            self.cognito.user_pool_id = pool;
        }
        if let Some(client) = get(ENV_COGNITO_CLIENT_ID) {
            self.cognito.client_id = client;
        }
        if let Some(domain) = get(ENV_DEFAULT_DOMAIN) {
            self.default_domain = domain
                .parse()
                .with_context(|| format!("Invalid value for {ENV_DEFAULT_DOMAIN}"))?;
        }

        Ok(())
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_file_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(&path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "wxapp", "wxapp")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}
