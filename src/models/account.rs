use chrono::{DateTime, Utc};

/// One backup row per account: a single opaque encrypted blob plus metadata.
///
/// The server can never decrypt `encrypted_data`; the key derivation password
/// stays on the client.
#[derive(Debug, Clone)]
pub struct Account {
    /// The unique username (3-50 chars, validated against the blocklist).
    pub username: String,
    /// Base64 ciphertext of the user's data document.
    pub encrypted_data: String,
    /// Hex IV of the most recent encryption. Fresh per sync.
    pub iv: String,
    /// Hex key-derivation salt. Stable unless the password changes.
    pub encryption_salt: String,
    /// SHA-256 hash of the one-time recovery key.
    pub recovery_hash: String,
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last accepted sync; the conflict-resolution clock.
    pub last_sync: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    pub device_count: i32,
}
