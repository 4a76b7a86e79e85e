//! Durable per-bucket cache counters.
//!
//! Three fixed buckets (general, stats, external-api) each track when
//! they were last cleared, how many accesses they have absorbed since,
//! and whether they are active. The bucket set is a closed enum: an
//! unknown bucket is unrepresentable, not a runtime condition.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::atomic_publish;

/// The fixed set of instrumented caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    General,
    Stats,
    ExternalApi,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::General, CacheKind::Stats, CacheKind::ExternalApi];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::General => "general",
            CacheKind::Stats => "stats",
            CacheKind::ExternalApi => "external-api",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health counters for one cache bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BucketInfo {
    pub last_cleared: Option<DateTime<Utc>>,
    pub item_count: u64,
    pub active: bool,
}

/// The persisted tracking document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackingInfo {
    #[serde(default)]
    pub general: BucketInfo,
    #[serde(default)]
    pub stats: BucketInfo,
    #[serde(default, rename = "external-api")]
    pub external_api: BucketInfo,
}

impl TrackingInfo {
    pub fn bucket(&self, kind: CacheKind) -> &BucketInfo {
        match kind {
            CacheKind::General => &self.general,
            CacheKind::Stats => &self.stats,
            CacheKind::ExternalApi => &self.external_api,
        }
    }

    fn bucket_mut(&mut self, kind: CacheKind) -> &mut BucketInfo {
        match kind {
            CacheKind::General => &mut self.general,
            CacheKind::Stats => &mut self.stats,
            CacheKind::ExternalApi => &mut self.external_api,
        }
    }
}

pub struct CacheTracker {
    path: PathBuf,
    state: Mutex<TrackingInfo>,
}

impl CacheTracker {
    /// Load existing tracking state, or start zeroed. The initial state
    /// is persisted immediately so diagnostics always find the file.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(error = %e, "Cache tracking file is corrupt, resetting");
                TrackingInfo::default()
            })
        } else {
            TrackingInfo::default()
        };

        let tracker = Self {
            path,
            state: Mutex::new(state),
        };
        tracker.persist(&tracker.guard());
        Ok(tracker)
    }

    fn guard(&self) -> MutexGuard<'_, TrackingInfo> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Instrumentation is best-effort: a persist failure is warned about,
    /// never surfaced to the operation being instrumented.
    fn persist(&self, state: &TrackingInfo) {
        match serde_json::to_string_pretty(state) {
            Ok(content) => {
                if let Err(e) = atomic_publish(&self.path, &content) {
                    warn!(error = %e, "Failed to persist cache tracking");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize cache tracking"),
        }
    }

    /// Mark a bucket active (on first access since its last clear) and
    /// count the access.
    pub fn record_access(&self, kind: CacheKind) {
        let mut state = self.guard();
        let bucket = state.bucket_mut(kind);
        bucket.active = true;
        bucket.item_count += 1;
        self.persist(&state);
    }

    /// Reset a bucket: zero the counter, deactivate, stamp the clear time.
    pub fn clear(&self, kind: CacheKind) {
        let mut state = self.guard();
        let bucket = state.bucket_mut(kind);
        bucket.item_count = 0;
        bucket.active = false;
        bucket.last_cleared = Some(Utc::now());
        self.persist(&state);
    }

    /// Snapshot of all buckets for diagnostics.
    pub fn snapshot(&self) -> TrackingInfo {
        self.guard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_record_access_activates_and_counts() {
        let temp = tempdir().unwrap();
        let tracker = CacheTracker::new(temp.path().join("cache_tracking.json")).unwrap();
        tracker.record_access(CacheKind::Stats);
        tracker.record_access(CacheKind::Stats);

        let info = tracker.snapshot();
        assert!(info.stats.active);
        assert_eq!(info.stats.item_count, 2);
        assert!(!info.general.active);
    }

    #[test]
    fn test_clear_resets_and_stamps() {
        let temp = tempdir().unwrap();
        let tracker = CacheTracker::new(temp.path().join("cache_tracking.json")).unwrap();
        tracker.record_access(CacheKind::General);
        tracker.clear(CacheKind::General);

        let bucket = tracker.snapshot().general;
        assert_eq!(bucket.item_count, 0);
        assert!(!bucket.active);
        assert!(bucket.last_cleared.is_some());
    }

    #[test]
    fn test_state_survives_restart() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cache_tracking.json");
        {
            let tracker = CacheTracker::new(&path).unwrap();
            tracker.record_access(CacheKind::ExternalApi);
        }
        let reloaded = CacheTracker::new(&path).unwrap();
        assert_eq!(reloaded.snapshot().external_api.item_count, 1);
    }

    #[test]
    fn test_persisted_keys_use_dashed_bucket_name() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cache_tracking.json");
        let tracker = CacheTracker::new(&path).unwrap();
        tracker.record_access(CacheKind::ExternalApi);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"external-api\""));
    }

    #[test]
    fn test_corrupt_tracking_file_resets() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("cache_tracking.json");
        std::fs::write(&path, "nope").unwrap();
        let tracker = CacheTracker::new(&path).unwrap();
        assert_eq!(tracker.snapshot(), TrackingInfo::default());
    }
}
