pub mod association;
pub mod current_user;
pub mod music_database;
pub mod music_record;
pub mod permission;
pub mod role;
pub mod user_record;
pub mod vault_entry;

pub use association::Association;
pub use current_user::CurrentUser;
pub use music_database::{is_content_file, MusicDatabase};
pub use music_record::MusicRecord;
pub use permission::Permission;
pub use role::{Role, RoleDefinition};
pub use user_record::{normalize_username, UserRecord};
pub use vault_entry::VaultEntry;
