//! Site-wide settings singleton.
//!
//! Settings are remote-authoritative with a local cache; the defaults
//! below seed both stores when neither has a usable copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteSettings {
    #[serde(default)]
    pub active_events: Vec<String>,
    #[serde(default)]
    pub default_event: Option<String>,
    #[serde(default)]
    pub system_notice: String,
    pub last_updated: DateTime<Utc>,
}

impl SiteSettings {
    /// Seed settings used when no stored copy exists anywhere.
    pub fn seed() -> Self {
        Self {
            active_events: vec!["2025wabon".to_string(), "2025wasno".to_string()],
            default_event: Some("2025wabon".to_string()),
            system_notice: String::new(),
            last_updated: Utc::now(),
        }
    }
}
