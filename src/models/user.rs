//! User account model.
//!
//! Users live in a single JSON document owned by the user store.
//! Usernames are unique case-insensitively; cross-store merges are
//! additive and never replace a locally stored user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-user preferences.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    #[serde(default)]
    pub default_event: Option<String>,
}

/// A registered scout or admin account.
///
/// `password_hash` is an argon2 PHC string; `salt` is kept alongside it
/// so the record is self-describing even though the PHC string embeds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password_hash: String,
    pub salt: String,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub settings: UserSettings,
}

/// The singleton users document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserFile {
    #[serde(default)]
    pub users: Vec<User>,
}

impl UserFile {
    /// Look up a user by case-insensitive username.
    pub fn find(&self, username: &str) -> Option<&User> {
        self.users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn find_mut(&mut self, username: &str) -> Option<&mut User> {
        self.users
            .iter_mut()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    pub fn contains(&self, username: &str) -> bool {
        self.find(username).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> User {
        User {
            username: name.to_string(),
            password_hash: "x".to_string(),
            salt: "s".to_string(),
            is_admin: false,
            created_at: Utc::now(),
            settings: UserSettings::default(),
        }
    }

    #[test]
    fn test_find_is_case_insensitive() {
        let file = UserFile {
            users: vec![user("Alice")],
        };
        assert!(file.contains("alice"));
        assert!(file.contains("ALICE"));
        assert!(!file.contains("bob"));
    }
}
