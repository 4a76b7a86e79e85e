//! Site settings manager.
//!
//! Settings are remote-authoritative: reads prefer the remote copy and
//! refresh a local cache from it; when the remote is unreachable the
//! local cache answers, and when neither exists the seed defaults are
//! used and pushed back out best-effort.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use crate::models::SiteSettings;
use crate::remote::RemoteStore;
use crate::store::atomic_publish;

/// File name used in both the remote folder and the local cache.
const SETTINGS_FILE: &str = "site_settings.json";

pub struct SettingsManager {
    remote: Arc<dyn RemoteStore>,
    folder: String,
    cache_path: PathBuf,
}

impl SettingsManager {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        folder: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            remote,
            folder: folder.into(),
            cache_path: data_dir.into().join(SETTINGS_FILE),
        }
    }

    /// Current settings: remote copy, else local cache, else seeds.
    /// Never fails; every fallback step only warns.
    pub async fn load(&self) -> SiteSettings {
        match self.load_remote().await {
            Ok(Some(settings)) => {
                self.write_cache(&settings);
                return settings;
            }
            Ok(None) => debug!("No remote settings file"),
            Err(e) => warn!(error = %format!("{e:#}"), "Failed to load remote settings"),
        }

        if let Some(cached) = self.load_cache() {
            return cached;
        }

        let seed = SiteSettings::seed();
        self.write_cache(&seed);
        if let Err(e) = self.upload(&seed).await {
            warn!(error = %format!("{e:#}"), "Failed to seed remote settings");
        }
        seed
    }

    /// Persist settings remotely (authoritative) and locally, stamping
    /// the update time.
    pub async fn save(&self, mut settings: SiteSettings) -> Result<SiteSettings> {
        settings.last_updated = Utc::now();
        self.upload(&settings).await?;
        self.write_cache(&settings);
        Ok(settings)
    }

    async fn load_remote(&self) -> Result<Option<SiteSettings>> {
        let Some(meta) = self.remote.find_by_name(SETTINGS_FILE, &self.folder).await? else {
            return Ok(None);
        };
        let content = self
            .remote
            .download(&meta.id)
            .await
            .context("Failed to download settings")?;
        match serde_json::from_str(&content) {
            Ok(settings) => Ok(Some(settings)),
            Err(e) => {
                // Corrupt remote copy: fall through to cache/seeds.
                warn!(error = %e, "Remote settings file is corrupt");
                Ok(None)
            }
        }
    }

    async fn upload(&self, settings: &SiteSettings) -> Result<()> {
        let content = serde_json::to_string_pretty(settings)?;
        self.remote
            .upload(&content, SETTINGS_FILE, &self.folder)
            .await
            .context("Failed to upload settings")?;
        Ok(())
    }

    fn load_cache(&self) -> Option<SiteSettings> {
        let contents = std::fs::read_to_string(&self.cache_path).ok()?;
        match serde_json::from_str(&contents) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!(error = %e, "Local settings cache is corrupt");
                None
            }
        }
    }

    fn write_cache(&self, settings: &SiteSettings) {
        match serde_json::to_string_pretty(settings) {
            Ok(content) => {
                if let Err(e) = atomic_publish(&self.cache_path, &content) {
                    warn!(error = %e, "Failed to write settings cache");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize settings"),
        }
    }
}
