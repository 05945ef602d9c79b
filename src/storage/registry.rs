use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;

use super::BlobStore;
use crate::error::StoreError;

/// One logical table persisted as a JSON array in a single file.
///
/// There is no locking: every `update` is a fresh load followed by a whole
/// file rewrite, so two writers racing on the same file lose one update.
pub struct Registry<T> {
    store: Arc<dyn BlobStore>,
    file: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Registry<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            file: self.file.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Registry<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn BlobStore>, file: impl Into<String>) -> Self {
        Self {
            store,
            file: file.into(),
            _marker: PhantomData,
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Load the whole table. A missing or blank file is an empty table.
    pub async fn load(&self) -> Result<Vec<T>, StoreError> {
        let bytes = match self.store.read(&self.file).await {
            Ok(b) => b,
            Err(StoreError::NotFound(_)) => {
                tracing::debug!(file = %self.file, "registry file missing; treating as empty");
                return Ok(vec![]);
            }
            Err(e) => return Err(e),
        };
        decode_array(&self.file, &bytes)
    }

    /// Whether the backing file exists at all.
    pub async fn exists(&self) -> Result<bool, StoreError> {
        match self.store.read(&self.file).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Rewrite the whole table.
    pub async fn save(&self, items: &[T]) -> Result<(), StoreError> {
        let body = serde_json::to_vec_pretty(items).map_err(|e| StoreError::Decode {
            file: self.file.clone(),
            reason: e.to_string(),
        })?;
        self.store.write(&self.file, body).await?;
        tracing::debug!(file = %self.file, rows = items.len(), "registry saved");
        Ok(())
    }

    /// Load, mutate in memory, and write back. Nothing is written when the
    /// closure fails.
    pub async fn update<R, E, F>(&self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R, E>,
        E: From<StoreError>,
    {
        let mut items = self.load().await?;
        let out = f(&mut items)?;
        self.save(&items).await?;
        Ok(out)
    }

    /// Delete the backing file.
    pub async fn remove(&self) -> Result<(), StoreError> {
        self.store.delete(&self.file).await
    }
}

pub(crate) fn decode_array<T: DeserializeOwned>(file: &str, bytes: &[u8]) -> Result<Vec<T>, StoreError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(vec![]);
    }
    let value: serde_json::Value = serde_json::from_slice(bytes).map_err(|e| StoreError::Decode {
        file: file.to_string(),
        reason: e.to_string(),
    })?;
    if !value.is_array() {
        return Err(StoreError::Decode {
            file: file.to_string(),
            reason: "expected a JSON array at top level".into(),
        });
    }
    serde_json::from_value(value).map_err(|e| StoreError::Decode {
        file: file.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::storage::MemoryStore;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        name: String,
    }

    fn registry(store: &MemoryStore) -> Registry<Row> {
        Registry::new(Arc::new(store.clone()), "rows.json")
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let store = MemoryStore::new();
        assert!(registry(&store).load().await.unwrap().is_empty());
        assert!(!registry(&store).exists().await.unwrap());
    }

    #[tokio::test]
    async fn blank_file_loads_empty() {
        let store = MemoryStore::new();
        store.insert("rows.json", "  \n");
        assert!(registry(&store).load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn object_body_is_decode_error() {
        let store = MemoryStore::new();
        store.insert("rows.json", r#"{"name": "x"}"#);
        let err = registry(&store).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Decode { ref file, .. } if file == "rows.json"));
    }

    #[tokio::test]
    async fn update_writes_whole_file() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        let len: Result<usize, ServiceError> = reg
            .update(|rows| {
                rows.push(Row { name: "a".into() });
                rows.push(Row { name: "b".into() });
                Ok(rows.len())
            })
            .await;
        assert_eq!(len.unwrap(), 2);
        assert_eq!(reg.load().await.unwrap().len(), 2);
        assert!(store.contents("rows.json").unwrap().starts_with('['));
    }

    #[tokio::test]
    async fn failed_update_does_not_write() {
        let store = MemoryStore::new();
        let reg = registry(&store);
        reg.save(&[Row { name: "keep".into() }]).await.unwrap();
        let res: Result<(), ServiceError> = reg
            .update(|rows| {
                rows.clear();
                Err(ServiceError::Invalid("nope".into()))
            })
            .await;
        assert!(res.is_err());
        assert_eq!(reg.load().await.unwrap(), vec![Row { name: "keep".into() }]);
    }
}
