use serde::{Deserialize, Serialize};

use super::permission::Permission;
use super::role::Role;
use super::user_record::{normalize_username, UserRecord};

/// The authenticated caller on whose behalf a service operation runs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    pub role: String,
    #[serde(default)]
    pub association_ids: Vec<String>,
}

impl CurrentUser {
    pub fn from_record(rec: &UserRecord) -> Self {
        Self {
            username: normalize_username(&rec.username),
            role: rec.role.clone(),
            association_ids: rec.association_ids.clone(),
        }
    }

    /// The operator running the CLI with the storage token itself.
    pub fn operator() -> Self {
        Self {
            username: "(operator)".into(),
            role: Role::Admin.as_str().into(),
            association_ids: vec![],
        }
    }

    pub fn is_admin(&self) -> bool {
        Role::from_str(&self.role) == Some(Role::Admin)
    }

    pub fn can(&self, permission: Permission) -> bool {
        permission.is_allowed_for_role(&self.role)
    }

    pub fn is_member_of(&self, association_id: &str) -> bool {
        self.association_ids.iter().any(|a| a == association_id)
    }
}
