use std::env;
use std::path::Path;

// Default configuration constants
pub const DEFAULT_STORAGE_API_URL: &str = "https://api.dropboxapi.com";
pub const DEFAULT_STORAGE_CONTENT_URL: &str = "https://content.dropboxapi.com";
pub const DEFAULT_STORAGE_AUTHORIZE_URL: &str = "https://www.dropbox.com/oauth2/authorize";
pub const DEFAULT_STORAGE_ROOT: &str = "/scorebox";
pub const DEFAULT_TOKEN_FILE: &str = "token.json";
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 100_000;

// Registry file names under the storage root
pub const USERS_FILE: &str = "users.json";
pub const ASSOCIATIONS_FILE: &str = "associations.json";
pub const ROLES_FILE: &str = "roles.json";
pub const VAULT_FILE: &str = "vault.json";
pub const MUSIC_DATABASES_FILE: &str = "music_databases.json";
pub const MUSIC_DB_FILE_PREFIX: &str = "music_db_";

pub fn load_env_file(env_file: Option<&str>) {
    if let Some(path) = env_file {
        dotenvy::from_path(Path::new(path)).ok();
    } else {
        dotenvy::dotenv().ok();
    }
}

pub fn get_storage_api_url() -> String {
    sanitize_base_url(
        &env::var("STORAGE_API_URL").unwrap_or_else(|_| DEFAULT_STORAGE_API_URL.to_string()),
        DEFAULT_STORAGE_API_URL,
    )
}

pub fn get_storage_content_url() -> String {
    sanitize_base_url(
        &env::var("STORAGE_CONTENT_URL").unwrap_or_else(|_| DEFAULT_STORAGE_CONTENT_URL.to_string()),
        DEFAULT_STORAGE_CONTENT_URL,
    )
}

pub fn get_storage_authorize_url() -> String {
    sanitize_base_url(
        &env::var("STORAGE_AUTHORIZE_URL").unwrap_or_else(|_| DEFAULT_STORAGE_AUTHORIZE_URL.to_string()),
        DEFAULT_STORAGE_AUTHORIZE_URL,
    )
}

pub fn get_storage_root() -> String {
    env::var("STORAGE_ROOT").unwrap_or_else(|_| DEFAULT_STORAGE_ROOT.to_string())
}

pub fn get_access_token() -> Option<String> {
    non_empty_var("ACCESS_TOKEN")
}

pub fn get_refresh_token() -> Option<String> {
    non_empty_var("REFRESH_TOKEN")
}

pub fn get_app_key() -> Option<String> {
    non_empty_var("APP_KEY")
}

pub fn get_app_secret() -> Option<String> {
    non_empty_var("APP_SECRET")
}

pub fn get_redirect_uri() -> Option<String> {
    non_empty_var("REDIRECT_URI")
}

pub fn get_token_file() -> String {
    env::var("TOKEN_FILE").unwrap_or_else(|_| DEFAULT_TOKEN_FILE.to_string())
}

/// Local folder that replaces the remote store when set.
pub fn get_local_store_dir() -> Option<String> {
    non_empty_var("LOCAL_STORE_DIR")
}

pub fn get_default_admin_username() -> String {
    env::var("DEFAULT_ADMIN_USERNAME").unwrap_or_else(|_| DEFAULT_ADMIN_USERNAME.to_string())
}

pub fn get_default_admin_password() -> String {
    env::var("DEFAULT_ADMIN_PASSWORD").unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string())
}

/// Caller credentials used by the CLI when `--as` is not given.
pub fn get_cli_credentials() -> Option<(String, String)> {
    let user = non_empty_var("SCOREBOX_USER")?;
    let password = env::var("SCOREBOX_PASSWORD").unwrap_or_default();
    Some((user, password))
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn sanitize_base_url(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
