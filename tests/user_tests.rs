mod common;

use common::{caller, new_state, seed_association, seed_user};
use scorebox::models::{CurrentUser, Permission};
use scorebox::services::user_service::{self, NewUser};
use scorebox::services::verify_password;
use scorebox::ServiceError;

fn new_user(username: &str, role: &str, associations: &[&str]) -> NewUser {
    NewUser {
        username: username.to_string(),
        password: "pw".to_string(),
        role: role.to_string(),
        association_ids: associations.iter().map(|s| s.to_string()).collect(),
    }
}

#[tokio::test]
async fn usernames_are_unique_ignoring_case() {
    let (state, _) = new_state();
    seed_user(&state, "anna", "member", &[]).await;

    let err = user_service::create_user(&state, &CurrentUser::operator(), new_user(" ANNA ", "member", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists { kind: "User", .. }));
}

#[tokio::test]
async fn created_user_gets_hashed_password_and_normalized_name() {
    let (state, store) = new_state();
    seed_association(&state, "a1", "Stadtkapelle").await;
    let created = user_service::create_user(&state, &CurrentUser::operator(), new_user("Bert", "manager", &["a1", "a1"]))
        .await
        .unwrap();
    assert_eq!(created.username, "bert");
    assert_eq!(created.association_ids, vec!["a1"]);
    assert!(created.password_hash.starts_with("pbkdf2:sha256:"));
    assert!(verify_password(&created.password_hash, "pw"));
    assert!(!store.contents("users.json").unwrap().contains("\"pw\""));
}

#[tokio::test]
async fn manager_creates_members_only_inside_own_associations() {
    let (state, _) = new_state();
    seed_association(&state, "a1", "Stadtkapelle").await;
    seed_association(&state, "a2", "Jugendorchester").await;
    let manager = caller("marta", "manager", &["a1"]);

    let err = user_service::create_user(&state, &manager, new_user("x", "member", &["a2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));

    let err = user_service::create_user(&state, &manager, new_user("y", "admin", &["a1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));

    let err = user_service::create_user(&state, &manager, new_user("z", "member", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));

    assert!(state.users.load().await.unwrap().is_empty());
}

#[tokio::test]
async fn members_cannot_create_users() {
    let (state, _) = new_state();
    let member = caller("moritz", "member", &["a1"]);
    let err = user_service::create_user(&state, &member, new_user("x", "member", &["a1"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(Permission::CreateUser)));
}

#[tokio::test]
async fn unknown_role_is_rejected() {
    let (state, _) = new_state();
    let err = user_service::create_user(&state, &CurrentUser::operator(), new_user("x", "owner", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
}

#[tokio::test]
async fn member_sees_only_users_sharing_an_association() {
    let (state, _) = new_state();
    seed_user(&state, "root", "admin", &[]).await;
    seed_user(&state, "anna", "member", &["a1"]).await;
    seed_user(&state, "bert", "manager", &["a1", "a2"]).await;
    seed_user(&state, "carl", "member", &["a2"]).await;
    seed_user(&state, "dora", "member", &[]).await;

    let anna = caller("anna", "member", &["a1"]);
    let names: Vec<String> = user_service::list_users(&state, &anna)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec!["anna", "bert"]);

    let err = user_service::get_user(&state, &anna, "carl").await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));

    let all = user_service::list_users(&state, &CurrentUser::operator()).await.unwrap();
    assert_eq!(all.len(), 5);
}

#[tokio::test]
async fn last_admin_cannot_be_demoted_or_deleted() {
    let (state, _) = new_state();
    seed_user(&state, "root", "admin", &[]).await;
    let operator = CurrentUser::operator();

    let err = user_service::update_role(&state, &operator, "root", "member").await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    let err = user_service::delete_user(&state, &operator, "root").await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    seed_user(&state, "second", "admin", &[]).await;
    let updated = user_service::update_role(&state, &operator, "root", "member").await.unwrap();
    assert_eq!(updated.role, "member");
}

#[tokio::test]
async fn users_cannot_delete_themselves() {
    let (state, _) = new_state();
    seed_user(&state, "root", "admin", &[]).await;
    seed_user(&state, "boss", "admin", &[]).await;
    let boss = caller("boss", "admin", &[]);
    let err = user_service::delete_user(&state, &boss, "BOSS").await.unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));
    user_service::delete_user(&state, &boss, "root").await.unwrap();
    assert_eq!(state.users.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn manager_cannot_touch_admins() {
    let (state, _) = new_state();
    seed_user(&state, "root", "admin", &["a1"]).await;
    let manager = caller("marta", "manager", &["a1"]);

    let err = user_service::update_role(&state, &manager, "root", "member").await.unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));
    let err = user_service::reset_password(&state, &manager, "root", "new").await.unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));
}

#[tokio::test]
async fn manager_set_associations_keeps_foreign_memberships() {
    let (state, _) = new_state();
    seed_association(&state, "a1", "Stadtkapelle").await;
    seed_association(&state, "a2", "Jugendorchester").await;
    seed_association(&state, "a3", "Kirchenchor").await;
    seed_user(&state, "anna", "member", &["a1", "a3"]).await;
    let manager = caller("marta", "manager", &["a1", "a2"]);

    let updated = user_service::set_associations(&state, &manager, "anna", vec!["a2".into()])
        .await
        .unwrap();
    assert_eq!(updated.association_ids, vec!["a3", "a2"]);

    let err = user_service::set_associations(&state, &manager, "anna", vec!["a3".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::OutOfScope(_)));
}

#[tokio::test]
async fn set_associations_rejects_unknown_ids() {
    let (state, _) = new_state();
    seed_user(&state, "anna", "member", &[]).await;
    let err = user_service::set_associations(&state, &CurrentUser::operator(), "anna", vec!["ghost".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { kind: "Association", .. }));
}

#[tokio::test]
async fn authenticate_accepts_legacy_digest() {
    let (state, _) = new_state();
    seed_user(&state, "anna", "member", &["a1"]).await;

    let user = user_service::authenticate(&state, " Anna ", "secret").await.unwrap();
    assert_eq!(user.username, "anna");
    assert_eq!(user.association_ids, vec!["a1"]);

    let err = user_service::authenticate(&state, "anna", "wrong").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
    let err = user_service::authenticate(&state, "nobody", "secret").await.unwrap_err();
    assert!(matches!(err, ServiceError::InvalidCredentials));
}

#[tokio::test]
async fn users_may_reset_their_own_password() {
    let (state, _) = new_state();
    seed_user(&state, "anna", "member", &[]).await;
    let anna = caller("anna", "member", &[]);

    user_service::reset_password(&state, &anna, "anna", "fresh").await.unwrap();
    assert!(user_service::authenticate(&state, "anna", "fresh").await.is_ok());

    seed_user(&state, "bert", "member", &[]).await;
    let err = user_service::reset_password(&state, &anna, "bert", "x").await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(Permission::ResetUserPassword)));
}

#[tokio::test]
async fn bootstrap_admin_is_created_once() {
    let (state, _) = new_state();
    let created = user_service::ensure_bootstrap_admin(&state).await.unwrap();
    assert!(created.map(|u| u.role == "admin").unwrap_or(false));
    assert!(user_service::ensure_bootstrap_admin(&state).await.unwrap().is_none());
    assert_eq!(state.users.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn mixed_case_rows_from_older_clients_stay_usable() {
    let (state, _) = new_state();
    seed_user(&state, "root", "admin", &[]).await;
    seed_user(&state, "Anna", "member", &["a1"]).await;
    let operator = CurrentUser::operator();

    let user = user_service::authenticate(&state, "Anna", "secret").await.unwrap();
    assert_eq!(user.username, "anna");
    assert!(user_service::get_user(&state, &operator, "ANNA").await.is_ok());

    let anna = caller("anna", "member", &[]);
    let names: Vec<String> = user_service::list_users(&state, &anna)
        .await
        .unwrap()
        .into_iter()
        .map(|u| u.username)
        .collect();
    assert_eq!(names, vec!["Anna"]);

    user_service::reset_password(&state, &user, "anna", "fresh").await.unwrap();
    assert!(user_service::authenticate(&state, "anna", "fresh").await.is_ok());

    let err = user_service::create_user(&state, &operator, new_user("anna", "member", &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::AlreadyExists { .. }));

    user_service::delete_user(&state, &operator, "anna").await.unwrap();
    assert_eq!(state.users.load().await.unwrap().len(), 1);
}

#[tokio::test]
async fn bootstrap_leaves_users_file_alone_when_an_admin_exists() {
    let (state, store) = new_state();
    let raw = format!(
        r#"[{{"username":"root","password_hash":"{}","role":"admin"}}]"#,
        common::legacy_hash("secret")
    );
    store.insert("users.json", &raw);

    assert!(user_service::ensure_bootstrap_admin(&state).await.unwrap().is_none());
    assert_eq!(store.contents("users.json").unwrap(), raw);
}

#[tokio::test]
async fn bootstrap_promotes_an_existing_default_user() {
    let (state, _) = new_state();
    seed_user(&state, "Admin", "member", &[]).await;

    let promoted = user_service::ensure_bootstrap_admin(&state).await.unwrap().unwrap();
    assert_eq!(promoted.username, "Admin");
    assert_eq!(promoted.role, "admin");
    assert_eq!(state.users.load().await.unwrap().len(), 1);
}
