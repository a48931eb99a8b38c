//! The JSON wire contract, shared by the server handlers and the sync client
//! so the two sides cannot drift.
//!
//! Ciphertext travels as base64, IVs and salts as hex, timestamps as RFC 3339.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/personalization/register`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub encrypted_data: String,
    pub iv: String,
    pub encryption_salt: String,
    pub recovery_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub username: String,
    /// The initial server clock; the client's first sync echoes this.
    pub last_sync: DateTime<Utc>,
    pub session_token: String,
}

/// Body of `POST /api/personalization/login`. The password never travels;
/// decryption happens client-side after this call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub encrypted_data: String,
    pub iv: String,
    pub encryption_salt: String,
    pub last_sync: DateTime<Utc>,
    pub session_token: String,
}

/// Body of `PUT /api/personalization/sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRequest {
    pub username: String,
    pub encrypted_data: String,
    pub iv: String,
    /// The server timestamp this client last saw; the optimistic-concurrency token.
    pub last_sync: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub success: bool,
    pub server_data_newer: bool,
    /// Present only when `server_data_newer` is true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted_data: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    pub last_sync: DateTime<Utc>,
}

/// Body of `DELETE /api/personalization/account`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteAccountRequest {
    pub username: String,
}

/// Response of `GET /api/personalization/session` (cookie-authenticated).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecoveryResponse {
    pub success: bool,
    pub username: String,
    pub encrypted_data: String,
    pub iv: String,
    pub encryption_salt: String,
    pub last_sync: DateTime<Utc>,
}

/// Body of `POST /api/personalization/reset`: replace the blob with material
/// re-encrypted client-side under a new password, authorized by the recovery key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetRequest {
    pub username: String,
    pub recovery_key: String,
    pub new_encrypted_data: String,
    pub new_iv: String,
    pub new_salt: String,
}

/// Response of `GET /api/personalization/export/{username}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub username: String,
    pub encrypted_data: String,
    pub iv: String,
    pub encryption_salt: String,
    pub created_at: DateTime<Utc>,
    pub last_sync: DateTime<Utc>,
    pub note: String,
}

/// Response of `GET /api/personalization/stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_users: i64,
    pub total_storage_bytes: i64,
    pub average_user_size_bytes: i64,
}

/// Generic success envelope for operations with no payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Error envelope: every non-2xx response carries `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
