//! Composition root for the scouting core.
//!
//! `ScoutingCore` wires the stores, remote client, sync engine, task
//! orchestrator, stats cache, and instrumentation together with
//! explicit construction; callers (route handlers, CLIs, tests) build
//! one instance and go. No global state is involved.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tracing::{debug, warn};

use crate::activity::{ActivityEntry, ActivityLog};
use crate::cache::{CacheKind, CacheTracker, TrackingInfo};
use crate::config::Config;
use crate::models::{Report, ReportKey, SiteSettings, TeamStats, User, UserSettings};
use crate::remote::{DriveClient, RemoteStore};
use crate::scoring;
use crate::settings::SettingsManager;
use crate::stats::StatsCache;
use crate::store::{ReportStore, StoreError, UserStore};
use crate::sync::{SyncConfig, SyncEngine, SyncMarker};
use crate::tasks::{StartOutcome, TaskManager, TaskSnapshot};

/// Task name for the report sync run.
const SYNC_TASK: &str = "sync";

/// Task name for the user sync run.
const USER_SYNC_TASK: &str = "user_sync";

/// Attempts to find a free report key before giving up on a save.
/// Collisions need the same team saving within the same second, so one
/// or two probes is the realistic ceiling.
const MAX_KEY_PROBES: u32 = 10;

pub struct ScoutingCore {
    reports: ReportStore,
    users: Arc<UserStore>,
    remote: Arc<dyn RemoteStore>,
    folder: String,
    data_dir: PathBuf,
    sync_config: SyncConfig,
    tasks: TaskManager,
    stats: StatsCache,
    tracker: Arc<CacheTracker>,
    activity: Arc<ActivityLog>,
    settings: SettingsManager,
}

impl ScoutingCore {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        remote: Arc<dyn RemoteStore>,
        folder: impl Into<String>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        let folder = folder.into();
        let reports = ReportStore::new(data_dir.join("reports"))?;
        let users = Arc::new(UserStore::new(data_dir.join("users.json"))?);
        let tracker = Arc::new(CacheTracker::new(data_dir.join("cache_tracking.json"))?);
        let activity = Arc::new(ActivityLog::new(data_dir.join("activity_log.json"))?);
        let settings = SettingsManager::new(Arc::clone(&remote), folder.clone(), &data_dir);

        Ok(Self {
            reports,
            users,
            remote,
            folder,
            data_dir,
            sync_config,
            tasks: TaskManager::new(),
            stats: StatsCache::new(),
            tracker,
            activity,
            settings,
        })
    }

    /// Build a core from loaded configuration, connecting a Drive
    /// client with the token from the environment.
    pub fn from_config(config: &Config) -> Result<Self> {
        let folder = config
            .drive_folder_id
            .clone()
            .ok_or_else(|| anyhow!("drive_folder_id is not configured"))?;
        let token =
            Config::drive_token().ok_or_else(|| anyhow!("DRIVE_TOKEN is not set"))?;
        let remote = Arc::new(DriveClient::new(token)?);
        Self::new(config.data_dir()?, remote, folder, SyncConfig::default())
    }

    // ===== Reports =====

    /// Persist a report: compute phase scores, allocate a collision-free
    /// key, publish locally, back up remotely best-effort, and
    /// invalidate the stats cache.
    pub async fn save_report(&self, report: Report) -> Result<ReportKey> {
        let (key, saved) = self.persist_report(report, Utc::now())?;

        // Best-effort backup; local persistence already succeeded.
        let content = serde_json::to_string_pretty(&saved)?;
        if let Err(e) = self
            .remote
            .upload(&content, &key.file_name(), &self.folder)
            .await
        {
            warn!(key = %key, error = %e, "Report backed up locally only");
        }

        self.invalidate_stats();
        self.activity.record("Report Saved", &key.to_string());
        Ok(key)
    }

    /// Local half of a save: scoring, key allocation, atomic publish.
    fn persist_report(
        &self,
        mut report: Report,
        created_at: chrono::DateTime<Utc>,
    ) -> Result<(ReportKey, Report)> {
        let auto = scoring::score_auto(&report.autonomous.scoring);
        report.autonomous.coral_count = auto.coral_count;
        report.autonomous.score = auto.score;

        let teleop = scoring::score_teleop(&report.teleop.scoring);
        report.teleop.coral_count = teleop.coral_count;
        report.teleop.score = teleop.score;

        report.endgame.score = scoring::score_endgame(report.endgame.position);

        let mut key = ReportKey::new(report.team_number, created_at);
        for _ in 0..MAX_KEY_PROBES {
            report.timestamp = key.created_at;
            match self.reports.put(&key, &report) {
                Ok(()) => {
                    debug!(key = %key, "Report persisted");
                    return Ok((key, report));
                }
                Err(e) if e.is_already_exists() => key = key.bumped(),
                Err(e) => return Err(e).context("Failed to persist report"),
            }
        }
        Err(anyhow!(
            "Could not allocate a report key for team {} after {MAX_KEY_PROBES} probes",
            report.team_number
        ))
    }

    pub fn get_report(&self, key: &ReportKey) -> Result<Report, StoreError> {
        self.reports.get(key)
    }

    /// All reports, newest first.
    pub fn list_reports(&self) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<Report> = self.reports.iter_all()?.collect();
        reports.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(reports)
    }

    /// One team's reports, ascending by match number.
    pub fn list_reports_for_team(&self, team: u32) -> Result<Vec<Report>, StoreError> {
        let mut reports: Vec<Report> = self
            .reports
            .iter_all()?
            .filter(|r| r.team_number == team)
            .collect();
        reports.sort_by_key(|r| r.match_number);
        Ok(reports)
    }

    // ===== Sync =====

    fn engine(&self) -> SyncEngine {
        SyncEngine::new(
            Arc::clone(&self.remote),
            self.reports.clone(),
            Arc::clone(&self.users),
            self.folder.clone(),
            &self.data_dir,
            self.sync_config.clone(),
        )
    }

    /// Kick off a report sync in the background. Single-flight: a run
    /// already in progress is reported, never duplicated.
    pub fn start_sync(&self) -> StartOutcome {
        let engine = self.engine();
        let outcome = self.tasks.start(SYNC_TASK, async move {
            let summary = engine.sync_reports().await;
            serde_json::to_value(summary).map_err(Into::into)
        });
        if outcome == StartOutcome::Started {
            self.activity.record("Sync Started", "Report sync from remote backup");
        }
        outcome
    }

    pub fn sync_status(&self) -> Option<TaskSnapshot> {
        self.tasks.status(SYNC_TASK)
    }

    pub fn start_user_sync(&self) -> StartOutcome {
        let engine = self.engine();
        self.tasks.start(USER_SYNC_TASK, async move {
            let summary = engine.sync_users().await;
            serde_json::to_value(summary).map_err(Into::into)
        })
    }

    pub fn user_sync_status(&self) -> Option<TaskSnapshot> {
        self.tasks.status(USER_SYNC_TASK)
    }

    /// Marker left by the last finished sync run, if any.
    pub fn last_sync_marker(&self) -> Option<SyncMarker> {
        self.engine().last_marker()
    }

    /// Every task snapshot, for diagnostics.
    pub fn task_statuses(&self) -> std::collections::HashMap<String, TaskSnapshot> {
        self.tasks.all()
    }

    // ===== Stats =====

    /// Aggregated stats for one team, memoized on the report set.
    /// A team with no reports gets the zeroed shape.
    pub fn team_stats(&self, team: u32) -> Result<TeamStats> {
        let reports = self.list_reports_for_team(team)?;
        let (stats, hit) = self.stats.get_or_compute(&reports);
        self.tracker.record_access(CacheKind::Stats);
        debug!(team, cache_hit = hit, "Computed team stats");
        Ok(stats)
    }

    /// A successful report write must not leave stale aggregates behind;
    /// the whole cache goes.
    fn invalidate_stats(&self) {
        self.stats.invalidate_all();
        self.tracker.clear(CacheKind::Stats);
    }

    pub fn clear_stats_cache(&self) {
        self.invalidate_stats();
        self.activity.record("Cache Cleared", "Stats cache was cleared");
    }

    /// Clear one instrumented cache bucket.
    pub fn clear_cache(&self, kind: CacheKind) {
        if kind == CacheKind::Stats {
            self.stats.invalidate_all();
        }
        self.tracker.clear(kind);
        self.activity
            .record("Cache Cleared", &format!("{kind} cache was cleared"));
    }

    pub fn cache_info(&self) -> TrackingInfo {
        self.tracker.snapshot()
    }

    // ===== Users =====

    pub fn create_user(&self, username: &str, password: &str) -> Result<bool> {
        let created = self.users.create_user(username, password)?;
        if created {
            self.activity.record("User Created", username);
        }
        Ok(created)
    }

    pub fn authenticate_user(&self, username: &str, password: &str) -> Result<bool> {
        self.users.authenticate(username, password)
    }

    pub fn is_admin(&self, username: &str) -> Result<bool> {
        self.users.is_admin(username)
    }

    pub fn set_admin(&self, username: &str, is_admin: bool) -> Result<bool> {
        let changed = self.users.set_admin(username, is_admin)?;
        if changed {
            self.activity.record(
                "Admin Changed",
                &format!("{username} admin = {is_admin}"),
            );
        }
        Ok(changed)
    }

    pub fn user_settings(&self, username: &str) -> Result<Option<UserSettings>> {
        self.users.user_settings(username)
    }

    pub fn update_user_settings(&self, username: &str, settings: UserSettings) -> Result<bool> {
        self.users.update_settings(username, settings)
    }

    pub fn all_users(&self) -> Result<Vec<User>, StoreError> {
        self.users.all_users()
    }

    // ===== Site settings =====

    pub async fn site_settings(&self) -> SiteSettings {
        self.settings.load().await
    }

    pub async fn save_site_settings(&self, settings: SiteSettings) -> Result<SiteSettings> {
        let saved = self.settings.save(settings).await?;
        self.activity.record("Settings Updated", "Site settings saved");
        Ok(saved)
    }

    // ===== Diagnostics =====

    pub fn recent_activity(&self, limit: usize) -> Vec<ActivityEntry> {
        self.activity.recent(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CountPair, EndgamePosition};
    use crate::remote::{ListPage, RemoteError, RemoteFileMeta};
    use crate::tasks::TaskState;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeRemote {
        files: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl RemoteStore for FakeRemote {
        async fn upload(
            &self,
            content: &str,
            name: &str,
            _folder: &str,
        ) -> Result<String, RemoteError> {
            self.files
                .lock()
                .unwrap()
                .insert(name.to_string(), content.to_string());
            Ok(name.to_string())
        }

        async fn download(&self, id: &str) -> Result<String, RemoteError> {
            self.files
                .lock()
                .unwrap()
                .get(id)
                .cloned()
                .ok_or_else(|| RemoteError::NotFound(id.to_string()))
        }

        async fn find_by_name(
            &self,
            name: &str,
            _folder: &str,
        ) -> Result<Option<RemoteFileMeta>, RemoteError> {
            Ok(self.files.lock().unwrap().contains_key(name).then(|| {
                RemoteFileMeta {
                    id: name.to_string(),
                    name: name.to_string(),
                    mime_type: None,
                    created_time: None,
                }
            }))
        }

        async fn list_page(
            &self,
            _folder: &str,
            _page_size: usize,
            _page_token: Option<&str>,
        ) -> Result<ListPage, RemoteError> {
            let files = self
                .files
                .lock()
                .unwrap()
                .keys()
                .map(|name| RemoteFileMeta {
                    id: name.clone(),
                    name: name.clone(),
                    mime_type: None,
                    created_time: None,
                })
                .collect();
            Ok(ListPage {
                files,
                next_page_token: None,
            })
        }
    }

    struct Fixture {
        _temp: tempfile::TempDir,
        core: ScoutingCore,
        remote: Arc<FakeRemote>,
    }

    fn fixture() -> Fixture {
        let temp = tempdir().unwrap();
        let remote = Arc::new(FakeRemote::default());
        let core = ScoutingCore::new(
            temp.path(),
            Arc::clone(&remote) as Arc<dyn RemoteStore>,
            "folder",
            SyncConfig::unthrottled(),
        )
        .unwrap();
        Fixture {
            _temp: temp,
            core,
            remote,
        }
    }

    fn draft(team: u32, match_number: u32) -> Report {
        Report {
            team_number: team,
            team_name: String::new(),
            event: "2025wabon".to_string(),
            scout_name: "casey".to_string(),
            match_number,
            timestamp: Utc::now(),
            autonomous: Default::default(),
            teleop: Default::default(),
            endgame: Default::default(),
            additional_notes: String::new(),
        }
    }

    #[tokio::test]
    async fn test_save_report_scores_persists_and_backs_up() {
        let fx = fixture();
        let mut report = draft(4682, 3);
        report.autonomous.scoring.l4 = CountPair {
            attempted: 2,
            successful: 1,
        };
        report.endgame.position = EndgamePosition::Park;

        let key = fx.core.save_report(report).await.unwrap();
        let saved = fx.core.get_report(&key).unwrap();
        assert_eq!(saved.autonomous.score, 7);
        assert_eq!(saved.autonomous.coral_count, 1);
        assert_eq!(saved.endgame.score, 2);

        // Remote backup carries the scored copy.
        let backed_up = fx.remote.files.lock().unwrap();
        assert!(backed_up.contains_key(&key.file_name()));
    }

    #[tokio::test]
    async fn test_same_second_saves_get_distinct_keys() {
        let fx = fixture();
        let at = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();

        let (first, _) = fx.core.persist_report(draft(4682, 1), at).unwrap();
        let (second, _) = fx.core.persist_report(draft(4682, 2), at).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.created_at, at + chrono::Duration::seconds(1));
        assert_eq!(fx.core.list_reports_for_team(4682).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_get_missing_report_is_not_found() {
        let fx = fixture();
        let key = ReportKey::new(1, Utc::now());
        assert!(fx.core.get_report(&key).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_orders() {
        let fx = fixture();
        let base = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        fx.core.persist_report(draft(111, 7), base).unwrap();
        fx.core
            .persist_report(draft(222, 3), base + chrono::Duration::minutes(5))
            .unwrap();
        fx.core
            .persist_report(draft(111, 2), base + chrono::Duration::minutes(10))
            .unwrap();

        let newest_first = fx.core.list_reports().unwrap();
        assert_eq!(newest_first[0].team_number, 111);
        assert_eq!(newest_first[0].match_number, 2);
        assert_eq!(newest_first[2].match_number, 7);

        let team = fx.core.list_reports_for_team(111).unwrap();
        assert_eq!(
            team.iter().map(|r| r.match_number).collect::<Vec<_>>(),
            vec![2, 7]
        );
    }

    #[tokio::test]
    async fn test_stats_reflect_new_report_after_save() {
        let fx = fixture();
        let mut first = draft(4682, 1);
        first.teleop.cycles = 10;
        first.teleop.successful_cycles = 5;
        fx.core.save_report(first).await.unwrap();

        let before = fx.core.team_stats(4682).unwrap();
        assert_eq!(before.games_played, 1);
        // Prime the memo with a second identical read.
        assert_eq!(fx.core.team_stats(4682).unwrap(), before);

        let mut second = draft(4682, 2);
        second.teleop.cycles = 8;
        second.teleop.successful_cycles = 4;
        fx.core.save_report(second).await.unwrap();

        let after = fx.core.team_stats(4682).unwrap();
        assert_eq!(after.games_played, 2);
        assert_eq!(after.teleop.percent_successful_cycles, 50.0);
    }

    #[tokio::test]
    async fn test_unknown_team_stats_are_zeroed() {
        let fx = fixture();
        let stats = fx.core.team_stats(9999).unwrap();
        assert_eq!(stats, TeamStats::default());
    }

    #[tokio::test]
    async fn test_clear_cache_resets_bucket_and_logs() {
        let fx = fixture();
        fx.core.team_stats(1).unwrap();
        assert!(fx.core.cache_info().stats.active);

        fx.core.clear_cache(CacheKind::Stats);
        let info = fx.core.cache_info();
        assert!(!info.stats.active);
        assert_eq!(info.stats.item_count, 0);
        assert!(fx
            .core
            .recent_activity(5)
            .iter()
            .any(|e| e.action == "Cache Cleared"));
    }

    #[tokio::test]
    async fn test_start_sync_completes_with_summary() {
        let fx = fixture();
        assert_eq!(fx.core.start_sync(), StartOutcome::Started);

        // Poll until the background run settles.
        for _ in 0..200 {
            if let Some(s) = fx.core.sync_status() {
                if s.state != TaskState::Running {
                    break;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let snapshot = fx.core.sync_status().unwrap();
        assert_eq!(snapshot.state, TaskState::Completed);
        let result = snapshot.result.unwrap();
        assert_eq!(result["synced_count"], 0);
        assert!(snapshot.end_time.is_some());

        let marker = fx.core.last_sync_marker().unwrap();
        assert!(marker.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_user_lifecycle_through_core() {
        let fx = fixture();
        assert!(fx.core.create_user("casey", "hunter2").unwrap());
        assert!(!fx.core.create_user("Casey", "other").unwrap());
        assert!(fx.core.authenticate_user("casey", "hunter2").unwrap());
        assert!(fx.core.set_admin("casey", true).unwrap());
        assert!(fx.core.is_admin("casey").unwrap());
    }
}
