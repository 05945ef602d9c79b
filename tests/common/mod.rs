#![allow(dead_code)]

use sha2::{Digest, Sha256};
use std::sync::Arc;

use scorebox::models::{Association, CurrentUser, MusicDatabase, UserRecord};
use scorebox::storage::MemoryStore;
use scorebox::{AppState, StoreError};

pub fn new_state() -> (AppState, MemoryStore) {
    let store = MemoryStore::new();
    (AppState::new(Arc::new(store.clone())), store)
}

/// Unsalted digest as older clients stored it. Cheap to compute in tests.
pub fn legacy_hash(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

pub fn caller(username: &str, role: &str, associations: &[&str]) -> CurrentUser {
    CurrentUser {
        username: username.to_string(),
        role: role.to_string(),
        association_ids: associations.iter().map(|s| s.to_string()).collect(),
    }
}

pub async fn seed_user(state: &AppState, username: &str, role: &str, associations: &[&str]) -> UserRecord {
    let record = UserRecord {
        username: username.to_string(),
        password_hash: legacy_hash("secret"),
        role: role.to_string(),
        association_ids: associations.iter().map(|s| s.to_string()).collect(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };
    let out = record.clone();
    state
        .users
        .update(move |rows| {
            rows.push(record);
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap();
    out
}

pub async fn seed_association(state: &AppState, id: &str, name: &str) -> Association {
    let record = Association {
        id: id.to_string(),
        name: name.to_string(),
        description: String::new(),
        created_at: "2024-01-01T00:00:00Z".to_string(),
    };
    let out = record.clone();
    state
        .associations
        .update(move |rows| {
            rows.push(record);
            Ok::<_, StoreError>(())
        })
        .await
        .unwrap();
    out
}

pub fn library_entry(id: &str, association_id: &str, record_count: usize) -> MusicDatabase {
    MusicDatabase {
        id: id.to_string(),
        name: format!("Library {}", id),
        association_id: association_id.to_string(),
        file_name: MusicDatabase::content_file_for(id),
        record_count,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}
