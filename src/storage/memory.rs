use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::path::validate_name;
use super::BlobStore;
use crate::error::StoreError;

/// In-process store. Clones share the same contents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    files: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw contents of a file, for assertions.
    pub fn contents(&self, name: &str) -> Option<String> {
        self.files
            .lock()
            .unwrap()
            .get(name)
            .map(|b| String::from_utf8_lossy(b).into_owned())
    }

    pub fn insert(&self, name: &str, body: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), body.as_bytes().to_vec());
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.files.lock().unwrap().keys().cloned().collect())
    }

    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        validate_name(name)?;
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StoreError> {
        validate_name(name)?;
        self.files.lock().unwrap().insert(name.to_string(), bytes);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StoreError> {
        validate_name(name)?;
        self.files
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn describe(&self) -> String {
        "memory".into()
    }
}
