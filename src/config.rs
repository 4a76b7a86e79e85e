//! Application configuration management.
//!
//! Configuration is stored at `~/.config/matchvault/config.json`, with
//! environment overrides for deployment (`MATCHVAULT_DATA_DIR`,
//! `DRIVE_FOLDER_ID`). The Drive bearer token is a secret and is only
//! ever read from the environment (`DRIVE_TOKEN`), never persisted.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/data directory paths
const APP_NAME: &str = "matchvault";

/// Config file name
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub data_dir: Option<PathBuf>,
    pub drive_folder_id: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if not found)
        let _ = dotenvy::dotenv();

        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };

        if let Ok(dir) = std::env::var("MATCHVAULT_DATA_DIR") {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(folder) = std::env::var("DRIVE_FOLDER_ID") {
            config.drive_folder_id = Some(folder);
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory all local records live under.
    pub fn data_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.data_dir {
            return Ok(dir.clone());
        }
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }

    /// Drive bearer token from the environment, if configured.
    pub fn drive_token() -> Option<String> {
        std::env::var("DRIVE_TOKEN").ok()
    }
}
