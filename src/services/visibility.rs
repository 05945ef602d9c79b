//! Role- and membership-based filtering.
//!
//! Admins see everything. Everyone else sees the associations listed on
//! their own user record, the libraries owned by those associations, and
//! the users who share at least one of those associations (plus themselves).

use crate::error::ServiceError;
use crate::models::{normalize_username, Association, CurrentUser, MusicDatabase, Permission, UserRecord};

pub fn require(caller: &CurrentUser, permission: Permission) -> Result<(), ServiceError> {
    if caller.can(permission) {
        Ok(())
    } else {
        tracing::warn!(user = %caller.username, ?permission, "permission denied");
        Err(ServiceError::Forbidden(permission))
    }
}

pub fn can_see_user(caller: &CurrentUser, user: &UserRecord) -> bool {
    caller.is_admin()
        || user.has_name(&normalize_username(&caller.username))
        || user.shares_association_with(&caller.association_ids)
}

pub fn can_see_association(caller: &CurrentUser, association_id: &str) -> bool {
    caller.is_admin() || caller.is_member_of(association_id)
}

pub fn can_see_library(caller: &CurrentUser, db: &MusicDatabase) -> bool {
    can_see_association(caller, &db.association_id)
}

pub fn visible_users(caller: &CurrentUser, users: Vec<UserRecord>) -> Vec<UserRecord> {
    users.into_iter().filter(|u| can_see_user(caller, u)).collect()
}

pub fn visible_associations(caller: &CurrentUser, associations: Vec<Association>) -> Vec<Association> {
    associations
        .into_iter()
        .filter(|a| can_see_association(caller, &a.id))
        .collect()
}

pub fn visible_libraries(caller: &CurrentUser, dbs: Vec<MusicDatabase>) -> Vec<MusicDatabase> {
    dbs.into_iter().filter(|d| can_see_library(caller, d)).collect()
}

/// Non-admins may only act on non-admin users inside their scope.
pub fn ensure_can_manage_user(caller: &CurrentUser, target: &UserRecord) -> Result<(), ServiceError> {
    if caller.is_admin() {
        return Ok(());
    }
    if target.is_admin() {
        return Err(ServiceError::OutOfScope(format!(
            "user '{}' is an administrator",
            target.username
        )));
    }
    if !can_see_user(caller, target) {
        return Err(ServiceError::not_found("User", target.username.clone()));
    }
    Ok(())
}

/// Non-admins may only hand out associations they belong to.
pub fn ensure_associations_in_scope(caller: &CurrentUser, ids: &[String]) -> Result<(), ServiceError> {
    if caller.is_admin() {
        return Ok(());
    }
    match ids.iter().find(|id| !caller.is_member_of(id)) {
        Some(id) => Err(ServiceError::OutOfScope(format!(
            "association '{}' is outside your associations",
            id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, role: &str, assoc: &[&str]) -> UserRecord {
        UserRecord {
            username: name.into(),
            password_hash: String::new(),
            role: role.into(),
            association_ids: assoc.iter().map(|s| s.to_string()).collect(),
            created_at: String::new(),
        }
    }

    fn db(id: &str, assoc: &str) -> MusicDatabase {
        MusicDatabase {
            id: id.into(),
            name: id.into(),
            association_id: assoc.into(),
            file_name: MusicDatabase::content_file_for(id),
            record_count: 0,
            created_at: String::new(),
        }
    }

    #[test]
    fn admin_sees_all_users() {
        let caller = CurrentUser::from_record(&user("root", "admin", &[]));
        let users = vec![user("a", "member", &["x"]), user("b", "member", &[])];
        assert_eq!(visible_users(&caller, users).len(), 2);
    }

    #[test]
    fn member_sees_self_and_shared_association_users() {
        let caller = CurrentUser::from_record(&user("anna", "member", &["x"]));
        let users = vec![
            user("anna", "member", &["x"]),
            user("bert", "manager", &["x", "y"]),
            user("carl", "member", &["y"]),
            user("dora", "member", &[]),
        ];
        let names: Vec<String> = visible_users(&caller, users)
            .into_iter()
            .map(|u| u.username)
            .collect();
        assert_eq!(names, vec!["anna", "bert"]);
    }

    #[test]
    fn user_without_associations_sees_only_self() {
        let caller = CurrentUser::from_record(&user("solo", "manager", &[]));
        let users = vec![user("solo", "manager", &[]), user("other", "member", &[])];
        assert_eq!(visible_users(&caller, users).len(), 1);
    }

    #[test]
    fn libraries_follow_association_membership() {
        let caller = CurrentUser::from_record(&user("anna", "member", &["x"]));
        let dbs = vec![db("1", "x"), db("2", "y")];
        let visible = visible_libraries(&caller, dbs);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, "1");
    }

    #[test]
    fn manager_cannot_manage_admin() {
        let caller = CurrentUser::from_record(&user("m", "manager", &["x"]));
        let target = user("root", "admin", &["x"]);
        assert!(matches!(
            ensure_can_manage_user(&caller, &target),
            Err(ServiceError::OutOfScope(_))
        ));
    }

    #[test]
    fn association_scope_check() {
        let caller = CurrentUser::from_record(&user("m", "manager", &["x"]));
        assert!(ensure_associations_in_scope(&caller, &["x".into()]).is_ok());
        assert!(ensure_associations_in_scope(&caller, &["x".into(), "y".into()]).is_err());
    }

    #[test]
    fn require_maps_to_forbidden() {
        let caller = CurrentUser::from_record(&user("m", "member", &[]));
        match require(&caller, Permission::ManageVault) {
            Err(ServiceError::Forbidden(p)) => assert_eq!(p, Permission::ManageVault),
            other => panic!("unexpected {:?}", other),
        }
    }
}
