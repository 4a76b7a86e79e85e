//! Append-capped activity log.
//!
//! A best-effort audit trail of admin-visible actions. Recording must
//! never fail the calling operation: any problem is logged and dropped.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::atomic_publish;

/// Entries kept in the log. Older entries fall off the end.
const MAX_ENTRIES: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    pub details: String,
}

pub struct ActivityLog {
    path: PathBuf,
    // Serializes the read-prepend-write cycle.
    lock: Mutex<()>,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        Ok(Self {
            path,
            lock: Mutex::new(()),
        })
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn load(&self) -> Vec<ActivityEntry> {
        if !self.path.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(error = %e, "Activity log is corrupt, starting fresh");
                Vec::new()
            }),
            Err(e) => {
                warn!(error = %e, "Failed to read activity log");
                Vec::new()
            }
        }
    }

    /// Record an action. Never fails; a write problem is only warned about.
    pub fn record(&self, action: &str, details: &str) {
        let _guard = self.guard();
        let mut entries = self.load();
        entries.insert(
            0,
            ActivityEntry {
                timestamp: Utc::now(),
                action: action.to_string(),
                details: details.to_string(),
            },
        );
        entries.truncate(MAX_ENTRIES);

        let content = match serde_json::to_string_pretty(&entries) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to serialize activity log");
                return;
            }
        };
        if let Err(e) = atomic_publish(&self.path, &content) {
            warn!(error = %e, "Failed to write activity log");
        }
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let _guard = self.guard();
        let mut entries = self.load();
        entries.truncate(limit);
        entries
    }
}
