use std::sync::Arc;

use scorebox::models::CurrentUser;
use scorebox::services::{association_service, library_service};
use scorebox::storage::{BlobStore, LocalDirStore};
use scorebox::{AppState, StoreError};

#[tokio::test]
async fn local_store_lists_missing_dir_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path().join("not-yet"));
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn local_store_write_read_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path().join("root"));

    store.write("users.json", b"[]".to_vec()).await.unwrap();
    store.write("associations.json", b"[]".to_vec()).await.unwrap();
    assert_eq!(store.list().await.unwrap(), vec!["associations.json", "users.json"]);
    assert_eq!(store.read("users.json").await.unwrap(), b"[]".to_vec());

    store.delete("users.json").await.unwrap();
    let err = store.read("users.json").await.unwrap_err();
    assert!(err.is_not_found());
    let err = store.delete("users.json").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn local_store_rejects_paths_outside_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalDirStore::new(dir.path());
    let err = store.write("../escape.json", b"[]".to_vec()).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidName(_)));
    assert!(!dir.path().parent().unwrap().join("escape.json").exists());
}

#[tokio::test]
async fn services_run_against_a_local_folder() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::new(Arc::new(LocalDirStore::new(dir.path())));
    let admin = CurrentUser::operator();

    let a = association_service::create_association(&state, &admin, "Stadtkapelle", "")
        .await
        .unwrap();
    let db = library_service::create_library(&state, &admin, "Konzert", &a.id).await.unwrap();

    assert!(dir.path().join("associations.json").exists());
    assert!(dir.path().join("music_databases.json").exists());
    assert!(dir.path().join(&db.file_name).exists());

    let reopened = AppState::new(Arc::new(LocalDirStore::new(dir.path())));
    let libs = library_service::list_libraries(&reopened, &admin).await.unwrap();
    assert_eq!(libs, vec![db]);
}
