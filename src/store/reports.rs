//! File-backed report store.
//!
//! One JSON file per report, named by the report key. Writes go to a
//! staging file and are published with a rename, so a concurrent reader
//! never observes a partially written record. Reports are immutable:
//! writing an existing key is rejected rather than overwritten.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::warn;

use crate::models::{Report, ReportKey};
use crate::store::{atomic_publish, StoreError};

/// Extension every report record carries on disk.
pub const REPORT_SUFFIX: &str = ".json";

/// Local authoritative store for scouting reports.
/// Clone is cheap; clones share the directory handle and write lock.
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
    // One writer claims a name at a time, so an exists check and the
    // publish that follows it are a single step to other writers.
    write_lock: Arc<Mutex<()>>,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        Ok(Self {
            dir,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    /// Persist a report under its key. Fails with `AlreadyExists` if the
    /// key is taken; callers decide whether to disambiguate or give up.
    pub fn put(&self, key: &ReportKey, report: &Report) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(report).map_err(|e| StoreError::Corrupt {
            name: key.file_name(),
            source: e,
        })?;
        self.put_named(&key.file_name(), &content)
    }

    /// Persist pre-serialized report content under an explicit file name.
    /// Used by the sync engine to keep downloaded records byte-identical.
    /// Exactly one of any concurrent writers of a name wins; the rest
    /// get `AlreadyExists`.
    pub fn put_named(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let path = self.path_for(name);
        if path.exists() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        atomic_publish(&path, content)?;
        Ok(())
    }

    pub fn get(&self, key: &ReportKey) -> Result<Report, StoreError> {
        let name = key.file_name();
        let path = self.path_for(&name);
        if !path.exists() {
            return Err(StoreError::NotFound(name));
        }
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt { name, source: e })
    }

    /// Lazily iterate every readable report. Order is unspecified; the
    /// caller sorts. A corrupt record is skipped with a warning and never
    /// aborts the scan.
    pub fn iter_all(&self) -> Result<impl Iterator<Item = Report> + '_, StoreError> {
        let entries = std::fs::read_dir(&self.dir)?;
        Ok(entries.filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(REPORT_SUFFIX) {
                return None;
            }
            let contents = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(e) => {
                    warn!(record = %name, error = %e, "Skipping unreadable report");
                    return None;
                }
            };
            match serde_json::from_str::<Report>(&contents) {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!(record = %name, error = %e, "Skipping corrupt report");
                    None
                }
            }
        }))
    }

    /// Snapshot of the report file names currently on disk.
    pub fn file_names(&self) -> Result<HashSet<String>, StoreError> {
        let mut names = HashSet::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(REPORT_SUFFIX) {
                names.insert(name);
            }
        }
        Ok(names)
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        Ok(self.file_names()?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn sample_report(team: u32, second: u32) -> Report {
        Report {
            team_number: team,
            team_name: String::new(),
            event: "2025wabon".to_string(),
            scout_name: "casey".to_string(),
            match_number: 3,
            timestamp: Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, second).unwrap(),
            autonomous: Default::default(),
            teleop: Default::default(),
            endgame: Default::default(),
            additional_notes: String::new(),
        }
    }

    #[test]
    fn test_put_get_roundtrip() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let report = sample_report(4682, 10);
        store.put(&report.key(), &report).unwrap();
        assert_eq!(store.get(&report.key()).unwrap(), report);
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let err = store.get(&sample_report(1, 0).key()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_put_existing_key_is_rejected() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let report = sample_report(4682, 10);
        store.put(&report.key(), &report).unwrap();

        let err = store.put(&report.key(), &report).unwrap_err();
        assert!(err.is_already_exists());
    }

    #[test]
    fn test_concurrent_same_name_writers_claim_once() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let content = serde_json::to_string(&sample_report(254, 9)).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let content = content.clone();
                std::thread::spawn(move || store.put_named("254_20250314_092609.json", &content))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| e.is_already_exists()));
        let on_disk =
            std::fs::read_to_string(temp.path().join("254_20250314_092609.json")).unwrap();
        assert_eq!(on_disk, content);
    }

    #[test]
    fn test_put_named_preserves_bytes() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let content = serde_json::to_string(&sample_report(11, 5)).unwrap();
        store.put_named("11_20250314_092605.json", &content).unwrap();

        let on_disk =
            std::fs::read_to_string(temp.path().join("11_20250314_092605.json")).unwrap();
        assert_eq!(on_disk, content);
    }

    #[test]
    fn test_corrupt_record_does_not_abort_scan() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        let good = sample_report(4682, 10);
        store.put(&good.key(), &good).unwrap();
        std::fs::write(temp.path().join("9999_20250314_092611.json"), "{not json").unwrap();

        let all: Vec<Report> = store.iter_all().unwrap().collect();
        assert_eq!(all, vec![good]);
    }

    #[test]
    fn test_non_report_files_ignored() {
        let temp = tempdir().unwrap();
        let store = ReportStore::new(temp.path()).unwrap();
        std::fs::write(temp.path().join("notes.txt"), "hi").unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.file_names().unwrap().is_empty());
    }
}
