use serde::{Deserialize, Serialize};

use crate::config::MUSIC_DB_FILE_PREFIX;

/// A row of `music_databases.json`: one library and the file holding its records.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct MusicDatabase {
    pub id: String,
    pub name: String,
    /// Owning association.
    pub association_id: String,
    /// Content file under the storage root.
    pub file_name: String,
    /// Cached length of the content file's record array.
    #[serde(default)]
    pub record_count: usize,
    #[serde(default)]
    pub created_at: String,
}

impl MusicDatabase {
    pub fn content_file_for(id: &str) -> String {
        format!("{}{}.json", MUSIC_DB_FILE_PREFIX, id)
    }
}

/// True for names that look like a library content file.
pub fn is_content_file(name: &str) -> bool {
    name.starts_with(MUSIC_DB_FILE_PREFIX) && name.ends_with(".json")
}
