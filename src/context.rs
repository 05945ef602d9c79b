use std::sync::Arc;

use crate::auth::{self, AuthSettings};
use crate::config::{
    self, ASSOCIATIONS_FILE, MUSIC_DATABASES_FILE, ROLES_FILE, USERS_FILE, VAULT_FILE,
};
use crate::error::AuthError;
use crate::models::{
    Association, MusicDatabase, MusicRecord, RoleDefinition, UserRecord, VaultEntry,
};
use crate::storage::{BlobStore, LocalDirStore, Registry, RemoteFileClient};

/// Shared handles to every registry file under the storage root.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BlobStore>,
    pub users: Registry<UserRecord>,
    pub associations: Registry<Association>,
    pub roles: Registry<RoleDefinition>,
    pub vault: Registry<VaultEntry>,
    pub databases: Registry<MusicDatabase>,
}

impl AppState {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            users: Registry::new(store.clone(), USERS_FILE),
            associations: Registry::new(store.clone(), ASSOCIATIONS_FILE),
            roles: Registry::new(store.clone(), ROLES_FILE),
            vault: Registry::new(store.clone(), VAULT_FILE),
            databases: Registry::new(store.clone(), MUSIC_DATABASES_FILE),
            store,
        }
    }

    /// Record set of one library, stored in the file its registry entry points at.
    pub fn records(&self, db: &MusicDatabase) -> Registry<MusicRecord> {
        Registry::new(self.store.clone(), db.file_name.clone())
    }
}

pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(format!("scorebox/{}", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(60))
        .build()
        .expect("Failed to create HTTP client")
}

/// Pick the backend from the environment: `LOCAL_STORE_DIR` selects a local
/// folder, otherwise the remote API with a resolved access token.
pub async fn build_store_from_env(client: &reqwest::Client) -> Result<Arc<dyn BlobStore>, AuthError> {
    if let Some(dir) = config::get_local_store_dir() {
        tracing::info!(%dir, "using local directory store");
        return Ok(Arc::new(LocalDirStore::new(dir)));
    }
    let settings = AuthSettings::from_env();
    let token = auth::resolve_access_token(client, &settings).await?;
    tracing::debug!(source = ?token.source, "access token resolved");
    Ok(Arc::new(RemoteFileClient::new(
        client.clone(),
        &config::get_storage_api_url(),
        &config::get_storage_content_url(),
        &config::get_storage_root(),
        token.token,
    )))
}
