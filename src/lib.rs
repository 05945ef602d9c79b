//! Admin tooling for associations and their music libraries, kept as JSON
//! registry files in a cloud storage folder.
//!
//! Each collection (users, associations, roles, the credential vault, the
//! music-database registry and every library's records) is one JSON array
//! file under a fixed root. Every change loads the whole file, edits it in
//! memory and writes it back; see [`storage::Registry`].

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use context::AppState;
pub use error::{AuthError, ServiceError, StoreError};
