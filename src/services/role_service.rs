use super::visibility::require;
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{CurrentUser, Permission, Role, RoleDefinition};

fn canonical_roles() -> Vec<RoleDefinition> {
    Role::all().iter().map(|r| r.definition()).collect()
}

/// Role definitions from `roles.json`, seeding the file on first use.
pub async fn list_roles(state: &AppState) -> Result<Vec<RoleDefinition>, ServiceError> {
    if !state.roles.exists().await? {
        let roles = canonical_roles();
        state.roles.save(&roles).await?;
        tracing::info!(count = roles.len(), "seeded roles.json");
        return Ok(roles);
    }
    let roles = state.roles.load().await?;
    for r in &roles {
        if Role::from_str(&r.id).is_none() {
            tracing::warn!(role = %r.id, "roles.json lists an unknown role; it grants no permissions");
        }
    }
    Ok(roles)
}

/// Rewrite `roles.json` to the built-in definitions.
pub async fn sync_roles(state: &AppState, caller: &CurrentUser) -> Result<Vec<RoleDefinition>, ServiceError> {
    require(caller, Permission::RunMaintenance)?;
    let roles = canonical_roles();
    state.roles.save(&roles).await?;
    tracing::info!(by = %caller.username, "roles.json rewritten");
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeds_missing_file() {
        let store = MemoryStore::new();
        let state = AppState::new(Arc::new(store.clone()));
        let roles = list_roles(&state).await.unwrap();
        assert_eq!(roles.len(), 3);
        assert!(store.contents("roles.json").unwrap().contains("\"manager\""));
    }

    #[tokio::test]
    async fn sync_overwrites_edits() {
        let store = MemoryStore::new();
        store.insert("roles.json", r#"[{"id": "admin", "name": "Boss"}]"#);
        let state = AppState::new(Arc::new(store.clone()));
        assert_eq!(list_roles(&state).await.unwrap()[0].name, "Boss");
        sync_roles(&state, &CurrentUser::operator()).await.unwrap();
        assert_eq!(list_roles(&state).await.unwrap()[0].name, "Administrator");
    }
}
