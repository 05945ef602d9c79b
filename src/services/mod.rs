pub mod association_service;
pub mod integrity_service;
pub mod library_service;
pub mod password;
pub mod role_service;
pub mod user_service;
pub mod vault_service;
pub mod visibility;

use hex::encode as hex_encode;
use rand::RngCore;

// Re-export commonly used functions
pub use password::{generate_password_hash, verify_password};
pub use visibility::require;

/// 16 lowercase hex characters from the OS RNG.
pub fn random_id() -> String {
    let mut b = [0u8; 8];
    rand::rngs::OsRng.fill_bytes(&mut b);
    hex_encode(b)
}

/// Returns the current UTC timestamp as an ISO-8601 string.
pub fn now_iso8601() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_id_shape() {
        let id = random_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(id, random_id());
    }

    #[test]
    fn timestamp_shape() {
        let ts = now_iso8601();
        assert_eq!(ts.len(), 20);
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
    }
}
