use super::random_id;
use super::visibility::require;
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{CurrentUser, Permission, VaultEntry};

/// Fields for a new vault entry.
#[derive(Clone, Debug, Default)]
pub struct NewVaultEntry {
    pub account: String,
    pub email: String,
    pub password: String,
    pub note: String,
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Clone, Debug, Default)]
pub struct VaultPatch {
    pub account: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub note: Option<String>,
}

pub async fn list_entries(state: &AppState, caller: &CurrentUser) -> Result<Vec<VaultEntry>, ServiceError> {
    require(caller, Permission::ManageVault)?;
    let mut entries = state.vault.load().await?;
    entries.sort_by_key(|e| e.account.to_lowercase());
    Ok(entries)
}

pub async fn add_entry(
    state: &AppState,
    caller: &CurrentUser,
    input: NewVaultEntry,
) -> Result<VaultEntry, ServiceError> {
    require(caller, Permission::ManageVault)?;
    let account = input.account.trim().to_string();
    if account.is_empty() {
        return Err(ServiceError::Invalid("account label must not be empty".into()));
    }
    let entry = VaultEntry {
        id: random_id(),
        account,
        email: input.email.trim().to_string(),
        password: input.password,
        note: input.note,
    };
    let created = entry.clone();
    state
        .vault
        .update(move |rows| {
            rows.push(entry);
            Ok::<_, ServiceError>(())
        })
        .await?;
    tracing::info!(id = %created.id, account = %created.account, "vault entry added");
    Ok(created)
}

pub async fn update_entry(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    patch: VaultPatch,
) -> Result<VaultEntry, ServiceError> {
    require(caller, Permission::ManageVault)?;
    if matches!(patch.account.as_deref().map(str::trim), Some("")) {
        return Err(ServiceError::Invalid("account label must not be empty".into()));
    }
    let id = id.to_string();
    state
        .vault
        .update(move |rows| {
            let row = rows
                .iter_mut()
                .find(|e| e.id == id)
                .ok_or_else(|| ServiceError::not_found("Vault entry", id.clone()))?;
            if let Some(a) = patch.account {
                row.account = a.trim().to_string();
            }
            if let Some(e) = patch.email {
                row.email = e.trim().to_string();
            }
            if let Some(p) = patch.password {
                row.password = p;
            }
            if let Some(n) = patch.note {
                row.note = n;
            }
            Ok(row.clone())
        })
        .await
}

pub async fn delete_entry(state: &AppState, caller: &CurrentUser, id: &str) -> Result<(), ServiceError> {
    require(caller, Permission::ManageVault)?;
    let key = id.to_string();
    state
        .vault
        .update(move |rows| {
            let before = rows.len();
            rows.retain(|e| e.id != key);
            if rows.len() == before {
                return Err(ServiceError::not_found("Vault entry", key));
            }
            Ok(())
        })
        .await?;
    tracing::info!(id = %id, "vault entry deleted");
    Ok(())
}
