/// Error types shared across the storage, auth and service layers
use thiserror::Error;

use crate::models::Permission;

/// Errors raised by a blob store backend
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named blob does not exist under the root
    #[error("File not found: {0}")]
    NotFound(String),

    /// The blob name is not a flat file name
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),

    /// The access token was rejected
    #[error("Storage rejected the access token")]
    Unauthorized,

    /// The storage API returned an error status
    #[error("Storage API error: HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// A registry file did not contain a JSON array
    #[error("Failed to decode {file}: {reason}")]
    Decode { file: String, reason: String },

    /// Local filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Errors raised while obtaining an access token
#[derive(Debug, Error)]
pub enum AuthError {
    /// Neither a refresh token nor a manual token is configured
    #[error("No storage credentials configured (set ACCESS_TOKEN or run `scorebox auth login`)")]
    NoCredentials,

    /// APP_KEY is required for the OAuth token endpoint
    #[error("APP_KEY is not configured")]
    MissingAppKey,

    /// Network-related errors
    #[error("Network error: {0}")]
    Network(String),

    /// The token endpoint returned an error
    #[error("Token endpoint error: HTTP {status}: {body}")]
    TokenEndpoint { status: u16, body: String },

    /// Reading or writing the token file failed
    #[error("Token file error: {0}")]
    TokenFile(String),
}

/// Errors raised by the registry services
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{kind} '{key}' not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} '{key}' already exists")]
    AlreadyExists { kind: &'static str, key: String },

    /// The caller's role does not grant the permission
    #[error("Permission denied: {}", .0.label())]
    Forbidden(Permission),

    /// The caller holds the permission but the target is outside their scope
    #[error("Not allowed: {0}")]
    OutOfScope(String),

    #[error("Invalid input: {0}")]
    Invalid(String),

    #[error("Invalid username or password")]
    InvalidCredentials,
}

impl ServiceError {
    pub fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        ServiceError::NotFound { kind, key: key.into() }
    }

    pub fn already_exists(kind: &'static str, key: impl Into<String>) -> Self {
        ServiceError::AlreadyExists { kind, key: key.into() }
    }
}
