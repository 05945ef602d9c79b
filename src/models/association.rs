use serde::{Deserialize, Serialize};

/// A row of `associations.json`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Association {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
}
