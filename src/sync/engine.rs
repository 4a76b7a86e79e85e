//! The sync engine.
//!
//! One run walks the remote folder in token-chained pages, downloads
//! records absent from a start-of-run snapshot of local names in small
//! sequential batches, and pauses between batches and pages to protect
//! the remote quota. Individual failures are counted, never raised; only
//! a failure of the listing machinery itself aborts the run, and even
//! then the partial counts gathered so far are returned.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::models::{Report, UserFile};
use crate::remote::{RemoteFileMeta, RemoteStore};
use crate::store::{atomic_publish, ReportStore, UserStore, REPORT_SUFFIX};

/// File name of the persisted last-sync marker.
const MARKER_FILE: &str = "last_sync.json";

/// File name of the users document in the remote folder.
const REMOTE_USERS_FILE: &str = "users.json";

/// Tuning knobs for one sync run. The pauses are deliberate
/// backpressure, not a correctness requirement; tests run unthrottled.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote descriptors fetched per listing page.
    pub page_size: usize,
    /// Downloads performed between pauses. Independent of page size.
    pub batch_size: usize,
    /// Pause between download batches within a page.
    pub batch_pause: Duration,
    /// Longer pause between listing pages.
    pub page_pause: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 5,
            batch_pause: Duration::from_millis(500),
            page_pause: Duration::from_millis(1500),
        }
    }
}

impl SyncConfig {
    /// Zero-pause configuration for tests.
    pub fn unthrottled() -> Self {
        Self {
            batch_pause: Duration::ZERO,
            page_pause: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Counts gathered over one report-sync run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncSummary {
    pub synced_count: usize,
    pub failed_count: usize,
    pub total_remote_seen: usize,
    pub total_local_after: usize,
    pub page_count: usize,
    /// Set when the run aborted on an engine fault; the counts above are
    /// then partial, never silently wrong.
    pub error: Option<String>,
}

/// Outcome of one user-sync run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSyncSummary {
    pub status: String,
    pub new_users: usize,
}

/// Persisted end-of-run marker: completion time on success, the fault
/// text on an aborted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMarker {
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    reports: ReportStore,
    users: Arc<UserStore>,
    folder: String,
    marker_path: PathBuf,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        reports: ReportStore,
        users: Arc<UserStore>,
        folder: impl Into<String>,
        data_dir: impl Into<PathBuf>,
        config: SyncConfig,
    ) -> Self {
        Self {
            remote,
            reports,
            users,
            folder: folder.into(),
            marker_path: data_dir.into().join(MARKER_FILE),
            config,
        }
    }

    /// Reconcile remote reports into the local store.
    pub async fn sync_reports(&self) -> SyncSummary {
        let mut summary = SyncSummary::default();

        // Snapshot once: records created locally mid-run are neither
        // re-fetched nor treated as conflicts.
        let local_names = match self.reports.file_names() {
            Ok(names) => names,
            Err(e) => {
                return self.abort(summary, format!("Failed to snapshot local reports: {e}"));
            }
        };

        let mut page_token: Option<String> = None;
        loop {
            let page = match self
                .remote
                .list_page(&self.folder, self.config.page_size, page_token.as_deref())
                .await
            {
                Ok(page) => page,
                Err(e) => {
                    return self.abort(summary, format!("Remote listing failed: {e}"));
                }
            };
            summary.page_count += 1;
            summary.total_remote_seen += page.files.len();

            let wanted: Vec<RemoteFileMeta> = page
                .files
                .into_iter()
                .filter(|f| f.name.ends_with(REPORT_SUFFIX) && !local_names.contains(&f.name))
                .collect();

            let batch_size = self.config.batch_size.max(1);
            for (index, batch) in wanted.chunks(batch_size).enumerate() {
                if index > 0 {
                    tokio::time::sleep(self.config.batch_pause).await;
                }
                for file in batch {
                    match self.fetch_and_store(file).await {
                        Ok(true) => summary.synced_count += 1,
                        // Appeared locally after the snapshot; leave it be.
                        Ok(false) => debug!(record = %file.name, "Local copy appeared mid-run"),
                        Err(e) => {
                            summary.failed_count += 1;
                            warn!(record = %file.name, error = %format!("{e:#}"), "Failed to sync record");
                        }
                    }
                }
            }

            match page.next_page_token {
                Some(token) => {
                    page_token = Some(token);
                    tokio::time::sleep(self.config.page_pause).await;
                }
                None => break,
            }
        }

        summary.total_local_after = self
            .reports
            .count()
            .unwrap_or(local_names.len() + summary.synced_count);

        self.write_marker(SyncMarker {
            completed_at: Some(Utc::now()),
            error: None,
        });
        info!(
            synced = summary.synced_count,
            failed = summary.failed_count,
            pages = summary.page_count,
            "Report sync finished"
        );
        summary
    }

    async fn fetch_and_store(&self, file: &RemoteFileMeta) -> Result<bool> {
        let content = self
            .remote
            .download(&file.id)
            .await
            .with_context(|| format!("Failed to download {}", file.name))?;

        // Validate before persisting; the bytes themselves are kept
        // verbatim so local and remote copies stay identical.
        serde_json::from_str::<Report>(&content)
            .with_context(|| format!("Remote record {} is not a valid report", file.name))?;

        match self.reports.put_named(&file.name, &content) {
            Ok(()) => Ok(true),
            Err(e) if e.is_already_exists() => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to persist {}", file.name)),
        }
    }

    /// Engine fault: persist the error marker and hand back whatever
    /// counts were gathered before the fault.
    fn abort(&self, mut summary: SyncSummary, message: String) -> SyncSummary {
        warn!(error = %message, "Sync run aborted");
        self.write_marker(SyncMarker {
            completed_at: None,
            error: Some(message.clone()),
        });
        summary.total_local_after = self.reports.count().unwrap_or(0);
        summary.error = Some(message);
        summary
    }

    fn write_marker(&self, marker: SyncMarker) {
        match serde_json::to_string_pretty(&marker) {
            Ok(content) => {
                if let Err(e) = atomic_publish(&self.marker_path, &content) {
                    warn!(error = %e, "Failed to write sync marker");
                }
            }
            Err(e) => warn!(error = %e, "Failed to serialize sync marker"),
        }
    }

    /// Last persisted sync marker, if any run has finished.
    pub fn last_marker(&self) -> Option<SyncMarker> {
        let contents = std::fs::read_to_string(&self.marker_path).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Import remote users absent locally. Overlapping usernames keep
    /// the local record untouched.
    pub async fn sync_users(&self) -> UserSyncSummary {
        let meta = match self.remote.find_by_name(REMOTE_USERS_FILE, &self.folder).await {
            Ok(Some(meta)) => meta,
            Ok(None) => {
                return UserSyncSummary {
                    status: "no remote users file".to_string(),
                    new_users: 0,
                }
            }
            Err(e) => {
                return UserSyncSummary {
                    status: format!("error: failed to locate remote users file: {e}"),
                    new_users: 0,
                }
            }
        };

        let content = match self.remote.download(&meta.id).await {
            Ok(content) => content,
            Err(e) => {
                return UserSyncSummary {
                    status: format!("error: failed to download remote users file: {e}"),
                    new_users: 0,
                }
            }
        };

        let remote_users: UserFile = match serde_json::from_str(&content) {
            Ok(users) => users,
            Err(e) => {
                return UserSyncSummary {
                    status: format!("error: remote users file is corrupt: {e}"),
                    new_users: 0,
                }
            }
        };

        match self.users.merge_remote(&remote_users) {
            Ok(new_users) => {
                info!(new_users, "User sync finished");
                UserSyncSummary {
                    status: "success".to_string(),
                    new_users,
                }
            }
            Err(e) => UserSyncSummary {
                status: format!("error: failed to merge users: {e}"),
                new_users: 0,
            },
        }
    }
}
