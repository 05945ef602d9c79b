use serde::{Deserialize, Serialize};

use super::role::Role;

/// A row of `users.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique key. Written trimmed and lowercase; rows from older clients
    /// may keep their original case, so compare with [`UserRecord::has_name`].
    pub username: String,
    pub password_hash: String,
    /// Role id (`admin`, `manager`, `member`).
    pub role: String,
    #[serde(default)]
    pub association_ids: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

impl UserRecord {
    pub fn role(&self) -> Option<Role> {
        Role::from_str(&self.role)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// Whether this row is the user with the normalised name `key`.
    pub fn has_name(&self, key: &str) -> bool {
        normalize_username(&self.username) == key
    }

    pub fn belongs_to(&self, association_id: &str) -> bool {
        self.association_ids.iter().any(|a| a == association_id)
    }

    pub fn shares_association_with(&self, other: &[String]) -> bool {
        self.association_ids.iter().any(|a| other.contains(a))
    }
}

/// Normalise a username to its storage key.
pub fn normalize_username(raw: &str) -> String {
    raw.trim().to_lowercase()
}
