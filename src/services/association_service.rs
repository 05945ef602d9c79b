use super::visibility::{can_see_association, require, visible_associations};
use super::{now_iso8601, random_id};
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{Association, CurrentUser, Permission};

pub async fn list_associations(state: &AppState, caller: &CurrentUser) -> Result<Vec<Association>, ServiceError> {
    require(caller, Permission::ViewAssociations)?;
    let mut out = visible_associations(caller, state.associations.load().await?);
    out.sort_by_key(|a| a.name.to_lowercase());
    Ok(out)
}

pub async fn get_association(state: &AppState, caller: &CurrentUser, id: &str) -> Result<Association, ServiceError> {
    require(caller, Permission::ViewAssociations)?;
    state
        .associations
        .load()
        .await?
        .into_iter()
        .find(|a| a.id == id && can_see_association(caller, &a.id))
        .ok_or_else(|| ServiceError::not_found("Association", id))
}

pub async fn create_association(
    state: &AppState,
    caller: &CurrentUser,
    name: &str,
    description: &str,
) -> Result<Association, ServiceError> {
    require(caller, Permission::CreateAssociation)?;
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(ServiceError::Invalid("association name must not be empty".into()));
    }
    let record = Association {
        id: random_id(),
        name: name.clone(),
        description: description.trim().to_string(),
        created_at: now_iso8601(),
    };
    let created = record.clone();
    state
        .associations
        .update(move |rows| {
            if rows.iter().any(|a| a.name.eq_ignore_ascii_case(&name)) {
                return Err(ServiceError::already_exists("Association", name));
            }
            rows.push(record);
            Ok(())
        })
        .await?;
    tracing::info!(id = %created.id, name = %created.name, "association created");
    Ok(created)
}

/// Managers may edit the associations they belong to.
pub async fn update_association(
    state: &AppState,
    caller: &CurrentUser,
    id: &str,
    name: Option<String>,
    description: Option<String>,
) -> Result<Association, ServiceError> {
    require(caller, Permission::EditAssociation)?;
    if !can_see_association(caller, id) {
        return Err(ServiceError::not_found("Association", id));
    }
    let name = name.map(|n| n.trim().to_string());
    if matches!(name.as_deref(), Some("")) {
        return Err(ServiceError::Invalid("association name must not be empty".into()));
    }
    let id = id.to_string();
    state
        .associations
        .update(move |rows| {
            if let Some(ref n) = name {
                if rows.iter().any(|a| a.id != id && a.name.eq_ignore_ascii_case(n)) {
                    return Err(ServiceError::already_exists("Association", n.clone()));
                }
            }
            let row = rows
                .iter_mut()
                .find(|a| a.id == id)
                .ok_or_else(|| ServiceError::not_found("Association", id.clone()))?;
            if let Some(n) = name {
                row.name = n;
            }
            if let Some(d) = description {
                row.description = d.trim().to_string();
            }
            Ok(row.clone())
        })
        .await
}

/// Delete an association and strip it from every user. Refused while
/// music databases still belong to it.
pub async fn delete_association(state: &AppState, caller: &CurrentUser, id: &str) -> Result<(), ServiceError> {
    require(caller, Permission::DeleteAssociation)?;
    let owned = state
        .databases
        .load()
        .await?
        .into_iter()
        .filter(|d| d.association_id == id)
        .count();
    if owned > 0 {
        return Err(ServiceError::Invalid(format!(
            "association '{}' still owns {} music database(s); delete them first",
            id, owned
        )));
    }

    let key = id.to_string();
    state
        .associations
        .update(move |rows| {
            let idx = rows
                .iter()
                .position(|a| a.id == key)
                .ok_or_else(|| ServiceError::not_found("Association", key.clone()))?;
            rows.remove(idx);
            Ok::<_, ServiceError>(())
        })
        .await?;

    let key = id.to_string();
    let touched = state
        .users
        .update(move |users| {
            let mut touched = 0usize;
            for u in users.iter_mut() {
                let before = u.association_ids.len();
                u.association_ids.retain(|a| a != &key);
                if u.association_ids.len() != before {
                    touched += 1;
                }
            }
            Ok::<_, ServiceError>(touched)
        })
        .await?;
    tracing::info!(id = %id, users_updated = touched, "association deleted");
    Ok(())
}
