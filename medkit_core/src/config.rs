//! Configuration file support for MedKit.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medkit/config.toml`, or
//! from the path in `MEDKIT_CONFIG` when that variable is set.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that overrides the config file location
pub const CONFIG_ENV_VAR: &str = "MEDKIT_CONFIG";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub auth: AuthConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Single-admin credentials and session lifetimes
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,

    #[serde(default = "default_password")]
    pub password: String,

    #[serde(default = "default_session_hours")]
    pub session_hours: i64,

    #[serde(default = "default_remember_me_days")]
    pub remember_me_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            session_hours: default_session_hours(),
            remember_me_days: default_remember_me_days(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medkit")
}

fn default_username() -> String {
    "admin".into()
}

fn default_password() -> String {
    "medkit123".into()
}

fn default_session_hours() -> i64 {
    24
}

fn default_remember_me_days() -> i64 {
    30
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the config file path, honouring `MEDKIT_CONFIG`
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return PathBuf::from(path);
        }
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medkit").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.auth.username.is_empty() || self.auth.password.is_empty() {
            return Err(Error::Config("auth credentials must not be empty".into()));
        }
        if self.auth.session_hours < 1 || self.auth.remember_me_days < 1 {
            return Err(Error::Config("session lifetimes must be positive".into()));
        }
        Ok(())
    }
}
