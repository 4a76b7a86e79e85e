//! File-backed user store.
//!
//! All accounts live in one JSON document, rewritten atomically on every
//! change. A coarse lock serializes read-modify-write cycles so an
//! interactive edit and a background user sync cannot clobber each other.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use chrono::Utc;
use rand::rngs::OsRng;
use tracing::debug;

use crate::models::{User, UserFile, UserSettings};
use crate::store::{atomic_publish, StoreError};

pub struct UserStore {
    path: PathBuf,
    // Guards the load-modify-save cycle, not individual file ops.
    lock: Mutex<()>,
}

impl UserStore {
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

    /// Load the users document. A missing file is an empty document; a
    /// corrupt one is an error, never silently replaced — the merge
    /// invariant forbids destroying local edits.
    pub fn load(&self) -> Result<UserFile, StoreError> {
        if !self.path.exists() {
            return Ok(UserFile::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            name: "users.json".to_string(),
            source: e,
        })
    }

    fn save(&self, users: &UserFile) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(users).map_err(|e| StoreError::Corrupt {
            name: "users.json".to_string(),
            source: e,
        })?;
        atomic_publish(&self.path, &content)?;
        Ok(())
    }

    /// Create an account. Returns false when the username is taken
    /// (case-insensitively); that is an outcome, not an error.
    pub fn create_user(&self, username: &str, password: &str) -> Result<bool> {
        let _guard = self.guard();
        let mut users = self.load()?;
        if users.contains(username) {
            return Ok(false);
        }

        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("Failed to hash password: {e}"))?
            .to_string();

        users.users.push(User {
            username: username.to_string(),
            password_hash: hash,
            salt: salt.as_str().to_string(),
            is_admin: false,
            created_at: Utc::now(),
            settings: UserSettings::default(),
        });
        self.save(&users)?;
        debug!(username, "Created user");
        Ok(true)
    }

    /// Verify a password. Unknown usernames verify as false.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let users = self.load()?;
        let Some(user) = users.find(username) else {
            return Ok(false);
        };
        let parsed = PasswordHash::new(&user.password_hash)
            .map_err(|e| anyhow!("Stored password hash is malformed: {e}"))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    }

    pub fn is_admin(&self, username: &str) -> Result<bool> {
        Ok(self.load()?.find(username).map(|u| u.is_admin).unwrap_or(false))
    }

    /// Set the admin flag. Returns false for an unknown user.
    pub fn set_admin(&self, username: &str, is_admin: bool) -> Result<bool> {
        let _guard = self.guard();
        let mut users = self.load()?;
        match users.find_mut(username) {
            Some(user) => {
                user.is_admin = is_admin;
                self.save(&users)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn user_settings(&self, username: &str) -> Result<Option<UserSettings>> {
        Ok(self.load()?.find(username).map(|u| u.settings.clone()))
    }

    /// Replace a user's settings. Returns false for an unknown user.
    pub fn update_settings(&self, username: &str, settings: UserSettings) -> Result<bool> {
        let _guard = self.guard();
        let mut users = self.load()?;
        match users.find_mut(username) {
            Some(user) => {
                user.settings = settings;
                self.save(&users)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn all_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(self.load()?.users)
    }

    /// Additive merge: import remote users absent locally, keep every
    /// local user untouched. Returns the number imported.
    pub fn merge_remote(&self, remote: &UserFile) -> Result<usize, StoreError> {
        let _guard = self.guard();
        let mut local = self.load()?;
        let mut imported = 0;
        for user in &remote.users {
            if !local.contains(&user.username) {
                local.users.push(user.clone());
                imported += 1;
            }
        }
        if imported > 0 {
            self.save(&local)?;
        }
        Ok(imported)
    }
}
