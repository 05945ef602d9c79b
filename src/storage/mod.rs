//! Blob storage under one scoped root folder.
//!
//! Every collection the tool manages lives in a single JSON file directly
//! under the root. [`BlobStore`] is the seam between the registry layer and
//! a concrete backend:
//!
//! - [`RemoteFileClient`]: the cloud provider's HTTP API.
//! - [`LocalDirStore`]: a folder on disk, for offline work.
//! - [`MemoryStore`]: in-process, used by the test suite.

use async_trait::async_trait;

use crate::error::StoreError;

pub mod local;
pub mod memory;
pub mod path;
pub mod registry;
pub mod remote;

pub use local::LocalDirStore;
pub use memory::MemoryStore;
pub use registry::Registry;
pub use remote::{set_silent, RemoteFileClient};

/// Flat, named blobs under a scoped root path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Names of all files directly under the root
    async fn list(&self) -> Result<Vec<String>, StoreError>;

    /// Read a whole file. Missing files yield [`StoreError::NotFound`].
    async fn read(&self, name: &str) -> Result<Vec<u8>, StoreError>;

    /// Create or overwrite a whole file
    async fn write(&self, name: &str, bytes: Vec<u8>) -> Result<(), StoreError>;

    /// Delete a file. Missing files yield [`StoreError::NotFound`].
    async fn delete(&self, name: &str) -> Result<(), StoreError>;

    /// Human-readable location, for logs and `check-config`
    fn describe(&self) -> String;
}
