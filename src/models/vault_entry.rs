use serde::{Deserialize, Serialize};

/// A row of `vault.json`. The password is stored as entered.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VaultEntry {
    pub id: String,
    pub account: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub note: String,
}
