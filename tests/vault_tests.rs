mod common;

use common::{caller, new_state};
use scorebox::models::{CurrentUser, Permission};
use scorebox::services::vault_service::{self, NewVaultEntry, VaultPatch};
use scorebox::ServiceError;

#[tokio::test]
async fn vault_is_admin_only() {
    let (state, store) = new_state();
    let manager = caller("marta", "manager", &["a1"]);
    let err = vault_service::list_entries(&state, &manager).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(Permission::ManageVault)));
    assert!(store.contents("vault.json").is_none());
}

#[tokio::test]
async fn vault_entries_can_be_added_patched_and_removed() {
    let (state, _) = new_state();
    let admin = CurrentUser::operator();
    let entry = vault_service::add_entry(
        &state,
        &admin,
        NewVaultEntry {
            account: "Notenshop".into(),
            email: " kasse@example.org ".into(),
            password: "s3cret".into(),
            note: String::new(),
        },
    )
    .await
    .unwrap();
    assert_eq!(entry.email, "kasse@example.org");

    let patched = vault_service::update_entry(
        &state,
        &admin,
        &entry.id,
        VaultPatch {
            note: Some("Jahresabo".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(patched.note, "Jahresabo");
    assert_eq!(patched.password, "s3cret");

    let err = vault_service::update_entry(
        &state,
        &admin,
        &entry.id,
        VaultPatch {
            account: Some("  ".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Invalid(_)));

    vault_service::delete_entry(&state, &admin, &entry.id).await.unwrap();
    let err = vault_service::delete_entry(&state, &admin, &entry.id).await.unwrap_err();
    assert!(matches!(err, ServiceError::NotFound { .. }));
}
