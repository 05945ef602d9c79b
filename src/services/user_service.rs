use std::collections::HashSet;

use super::password::{generate_password_hash, verify_password};
use super::visibility::{
    can_see_user, ensure_associations_in_scope, ensure_can_manage_user, require, visible_users,
};
use super::now_iso8601;
use crate::config;
use crate::context::AppState;
use crate::error::ServiceError;
use crate::models::{normalize_username, CurrentUser, Permission, Role, UserRecord};

/// Input for [`create_user`].
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role: String,
    pub association_ids: Vec<String>,
}

pub async fn list_users(state: &AppState, caller: &CurrentUser) -> Result<Vec<UserRecord>, ServiceError> {
    require(caller, Permission::ViewUsers)?;
    let mut users = visible_users(caller, state.users.load().await?);
    users.sort_by(|a, b| a.username.cmp(&b.username));
    Ok(users)
}

pub async fn get_user(
    state: &AppState,
    caller: &CurrentUser,
    username: &str,
) -> Result<UserRecord, ServiceError> {
    require(caller, Permission::ViewUsers)?;
    let key = normalize_username(username);
    state
        .users
        .load()
        .await?
        .into_iter()
        .find(|u| u.has_name(&key) && can_see_user(caller, u))
        .ok_or_else(|| ServiceError::not_found("User", key))
}

fn parse_role(raw: &str) -> Result<Role, ServiceError> {
    Role::from_str(raw).ok_or_else(|| ServiceError::Invalid(format!("unknown role '{}'", raw.trim())))
}

fn dedup_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && seen.insert(s.clone()))
        .collect()
}

/// Reject association ids that do not exist in `associations.json`.
async fn ensure_associations_exist(state: &AppState, ids: &[String]) -> Result<(), ServiceError> {
    if ids.is_empty() {
        return Ok(());
    }
    let known: HashSet<String> = state
        .associations
        .load()
        .await?
        .into_iter()
        .map(|a| a.id)
        .collect();
    match ids.iter().find(|id| !known.contains(*id)) {
        Some(id) => Err(ServiceError::not_found("Association", id.clone())),
        None => Ok(()),
    }
}

fn admin_count(users: &[UserRecord]) -> usize {
    users.iter().filter(|u| u.is_admin()).count()
}

pub async fn create_user(
    state: &AppState,
    caller: &CurrentUser,
    input: NewUser,
) -> Result<UserRecord, ServiceError> {
    require(caller, Permission::CreateUser)?;
    let username = normalize_username(&input.username);
    if username.is_empty() {
        return Err(ServiceError::Invalid("username must not be empty".into()));
    }
    if input.password.is_empty() {
        return Err(ServiceError::Invalid("password must not be empty".into()));
    }
    let role = parse_role(&input.role)?;
    let association_ids = dedup_ids(input.association_ids);

    if !caller.is_admin() {
        if role == Role::Admin {
            return Err(ServiceError::OutOfScope("only administrators can create administrators".into()));
        }
        if association_ids.is_empty() {
            return Err(ServiceError::OutOfScope(
                "new users must belong to at least one of your associations".into(),
            ));
        }
        ensure_associations_in_scope(caller, &association_ids)?;
    }
    ensure_associations_exist(state, &association_ids).await?;

    let record = UserRecord {
        username: username.clone(),
        password_hash: generate_password_hash(&input.password),
        role: role.as_str().to_string(),
        association_ids,
        created_at: now_iso8601(),
    };
    let created = record.clone();
    state
        .users
        .update(move |users| {
            if users.iter().any(|u| u.has_name(&username)) {
                return Err(ServiceError::already_exists("User", username));
            }
            users.push(record);
            Ok(())
        })
        .await?;
    tracing::info!(user = %created.username, role = %created.role, by = %caller.username, "user created");
    Ok(created)
}

pub async fn update_role(
    state: &AppState,
    caller: &CurrentUser,
    username: &str,
    role: &str,
) -> Result<UserRecord, ServiceError> {
    require(caller, Permission::UpdateUserRole)?;
    let role = parse_role(role)?;
    if role == Role::Admin && !caller.is_admin() {
        return Err(ServiceError::OutOfScope("only administrators can grant the admin role".into()));
    }
    let key = normalize_username(username);
    let caller = caller.clone();
    let updated = state
        .users
        .update(move |users| {
            let admins = admin_count(users);
            let target = users
                .iter_mut()
                .find(|u| u.has_name(&key))
                .ok_or_else(|| ServiceError::not_found("User", key.clone()))?;
            ensure_can_manage_user(&caller, target)?;
            if target.is_admin() && role != Role::Admin && admins <= 1 {
                return Err(ServiceError::Invalid("cannot demote the last administrator".into()));
            }
            target.role = role.as_str().to_string();
            Ok(target.clone())
        })
        .await?;
    tracing::info!(user = %updated.username, role = %updated.role, "role updated");
    Ok(updated)
}

/// Replace a user's association memberships. Non-admin callers only
/// control the memberships inside their own scope; memberships the caller
/// cannot see are preserved.
pub async fn set_associations(
    state: &AppState,
    caller: &CurrentUser,
    username: &str,
    association_ids: Vec<String>,
) -> Result<UserRecord, ServiceError> {
    require(caller, Permission::ManageUserAssociations)?;
    let requested = dedup_ids(association_ids);
    ensure_associations_in_scope(caller, &requested)?;
    ensure_associations_exist(state, &requested).await?;

    let key = normalize_username(username);
    let caller = caller.clone();
    let updated = state
        .users
        .update(move |users| {
            let target = users
                .iter_mut()
                .find(|u| u.has_name(&key))
                .ok_or_else(|| ServiceError::not_found("User", key.clone()))?;
            ensure_can_manage_user(&caller, target)?;
            let mut next: Vec<String> = if caller.is_admin() {
                Vec::new()
            } else {
                target
                    .association_ids
                    .iter()
                    .filter(|id| !caller.is_member_of(id))
                    .cloned()
                    .collect()
            };
            next.extend(requested);
            target.association_ids = dedup_ids(next);
            Ok::<_, ServiceError>(target.clone())
        })
        .await?;
    tracing::info!(user = %updated.username, associations = ?updated.association_ids, "associations updated");
    Ok(updated)
}

/// Users may always change their own password.
pub async fn reset_password(
    state: &AppState,
    caller: &CurrentUser,
    username: &str,
    new_password: &str,
) -> Result<(), ServiceError> {
    if new_password.is_empty() {
        return Err(ServiceError::Invalid("password must not be empty".into()));
    }
    let key = normalize_username(username);
    let is_self = key == normalize_username(&caller.username);
    if !is_self {
        require(caller, Permission::ResetUserPassword)?;
    }
    let hash = generate_password_hash(new_password);
    let caller = caller.clone();
    state
        .users
        .update(move |users| {
            let target = users
                .iter_mut()
                .find(|u| u.has_name(&key))
                .ok_or_else(|| ServiceError::not_found("User", key.clone()))?;
            if !is_self {
                ensure_can_manage_user(&caller, target)?;
            }
            target.password_hash = hash;
            Ok::<_, ServiceError>(())
        })
        .await?;
    tracing::info!(user = %normalize_username(username), "password reset");
    Ok(())
}

pub async fn delete_user(state: &AppState, caller: &CurrentUser, username: &str) -> Result<(), ServiceError> {
    require(caller, Permission::DeleteUser)?;
    let key = normalize_username(username);
    if key == normalize_username(&caller.username) {
        return Err(ServiceError::Invalid("you cannot delete your own account".into()));
    }
    let caller = caller.clone();
    let removed = state
        .users
        .update(move |users| {
            let idx = users
                .iter()
                .position(|u| u.has_name(&key))
                .ok_or_else(|| ServiceError::not_found("User", key.clone()))?;
            ensure_can_manage_user(&caller, &users[idx])?;
            if users[idx].is_admin() && admin_count(users) <= 1 {
                return Err(ServiceError::Invalid("cannot delete the last administrator".into()));
            }
            Ok(users.remove(idx))
        })
        .await?;
    tracing::info!(user = %removed.username, "user deleted");
    Ok(())
}

pub async fn authenticate(state: &AppState, username: &str, password: &str) -> Result<CurrentUser, ServiceError> {
    let key = normalize_username(username);
    let users = state.users.load().await?;
    match users.iter().find(|u| u.has_name(&key)) {
        Some(rec) if verify_password(&rec.password_hash, password) => {
            if rec.role().is_none() {
                tracing::warn!(user = %key, role = %rec.role, "user has an unknown role; no permissions granted");
            }
            Ok(CurrentUser::from_record(rec))
        }
        _ => {
            tracing::warn!(user = %key, "failed login");
            Err(ServiceError::InvalidCredentials)
        }
    }
}

/// Create the configured default administrator when no admin exists yet.
/// `users.json` is only written when something changes.
pub async fn ensure_bootstrap_admin(state: &AppState) -> Result<Option<UserRecord>, ServiceError> {
    let mut users = state.users.load().await?;
    if admin_count(&users) > 0 {
        return Ok(None);
    }
    let username = normalize_username(&config::get_default_admin_username());
    let created = match users.iter_mut().find(|u| u.has_name(&username)) {
        Some(existing) => {
            existing.role = Role::Admin.as_str().to_string();
            existing.clone()
        }
        None => {
            let record = UserRecord {
                username,
                password_hash: generate_password_hash(&config::get_default_admin_password()),
                role: Role::Admin.as_str().to_string(),
                association_ids: vec![],
                created_at: now_iso8601(),
            };
            users.push(record.clone());
            record
        }
    };
    state.users.save(&users).await?;
    tracing::warn!(user = %created.username, "no administrator found; bootstrap admin installed");
    Ok(Some(created))
}
