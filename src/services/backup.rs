//! Backup store operations: the server-side half of the zero-knowledge sync.
//!
//! Everything here treats `encrypted_data` as an opaque string. No code path
//! in this module (or anywhere server-side) receives a password or key.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::models::account::Account;
use crate::repositories;
use crate::state::AppState;
use crate::validation::username::validate_username;

/// Outcome of comparing the client's `last_sync` against the server's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// The client saw the latest server state; accept its blob.
    AcceptClient,
    /// Another device synced since this client last pulled; the client must
    /// adopt the server blob instead.
    ServerNewer,
}

/// Pure conflict resolution. Strictly newer server state wins; on a tie the
/// client's write is accepted, since an equal timestamp means the client saw
/// the current server state.
pub fn resolve_sync(
    server_last_sync: DateTime<Utc>,
    client_last_sync: DateTime<Utc>,
) -> SyncDecision {
    if server_last_sync > client_last_sync {
        SyncDecision::ServerNewer
    } else {
        SyncDecision::AcceptClient
    }
}

/// Result of a sync attempt, shaped for the wire response.
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Accepted {
        last_sync: DateTime<Utc>,
    },
    ServerNewer {
        encrypted_data: String,
        iv: String,
        last_sync: DateTime<Utc>,
    },
}

/// Creates a new backup account.
///
/// Validates the username, rejects duplicates, and stores the client-supplied
/// ciphertext verbatim.
pub async fn register_account(
    state: &AppState,
    username: &str,
    encrypted_data: &str,
    iv: &str,
    encryption_salt: &str,
    recovery_hash: &str,
) -> Result<Account> {
    let username = validate_username(username).map_err(AppError::Validation)?;

    if repositories::account::find_by_username(&state.db, &username)
        .await?
        .is_some()
    {
        return Err(AppError::UsernameTaken);
    }

    let account = repositories::account::create(
        &state.db,
        &username,
        encrypted_data,
        iv,
        encryption_salt,
        recovery_hash,
    )
    .await?;

    tracing::info!(username = %username, "account registered");
    Ok(account)
}

/// Fetches an account for login and records the login.
///
/// The caller maps `NotFound` to an undifferentiated authentication failure
/// so usernames cannot be enumerated.
pub async fn fetch_account_for_login(state: &AppState, username: &str) -> Result<Account> {
    let account = repositories::account::find_by_username(&state.db, username)
        .await?
        .ok_or(AppError::NotFound)?;

    repositories::account::touch_login(&state.db, username).await?;
    Ok(account)
}

/// Applies a client sync, or tells the client to adopt newer server state.
pub async fn sync_account(
    state: &AppState,
    username: &str,
    encrypted_data: &str,
    iv: &str,
    client_last_sync: DateTime<Utc>,
) -> Result<SyncOutcome> {
    let account = repositories::account::find_by_username(&state.db, username)
        .await?
        .ok_or(AppError::NotFound)?;

    match resolve_sync(account.last_sync, client_last_sync) {
        SyncDecision::ServerNewer => {
            tracing::debug!(username = %username, "sync rejected, server data newer");
            Ok(SyncOutcome::ServerNewer {
                encrypted_data: account.encrypted_data,
                iv: account.iv,
                last_sync: account.last_sync,
            })
        }
        SyncDecision::AcceptClient => {
            let last_sync =
                repositories::account::update_sync(&state.db, username, encrypted_data, iv).await?;
            Ok(SyncOutcome::Accepted { last_sync })
        }
    }
}

/// Replaces an account's blob after verifying the recovery key.
///
/// The client re-encrypts under a new password and submits the new ciphertext,
/// IV and salt; the recovery key authorizes the swap. Comparison is constant
/// time.
pub async fn reset_with_recovery_key(
    state: &AppState,
    username: &str,
    recovery_key: &str,
    new_encrypted_data: &str,
    new_iv: &str,
    new_salt: &str,
) -> Result<DateTime<Utc>> {
    let account = repositories::account::find_by_username(&state.db, username)
        .await?
        .ok_or(AppError::NotFound)?;

    let presented = hex::encode(Sha256::digest(recovery_key.as_bytes()));
    let matches: bool = presented
        .as_bytes()
        .ct_eq(account.recovery_hash.as_bytes())
        .into();
    if !matches {
        return Err(AppError::Validation("Invalid recovery key".to_string()));
    }

    let last_sync =
        repositories::account::update_reset(&state.db, username, new_encrypted_data, new_iv, new_salt)
            .await?;

    tracing::info!(username = %username, "account reset with recovery key");
    Ok(last_sync)
}

/// Deletes an account and all of its sessions.
pub async fn delete_account(state: &AppState, username: &str) -> Result<()> {
    let existed = repositories::account::delete(&state.db, username).await?;
    if !existed {
        return Err(AppError::NotFound);
    }

    let sessions = repositories::session::delete_for_user(&state.db, username).await?;
    tracing::info!(username = %username, sessions, "account deleted");
    Ok(())
}

/// Returns an account's stored material for download. Still ciphertext; the
/// export is only useful to someone who knows the password.
pub async fn export_account(state: &AppState, username: &str) -> Result<Account> {
    repositories::account::find_by_username(&state.db, username)
        .await?
        .ok_or(AppError::NotFound)
}

/// Aggregate storage statistics.
pub async fn storage_stats(state: &AppState) -> Result<(i64, i64, i64)> {
    let (total_users, total_bytes) = repositories::account::stats(&state.db).await?;
    let average = if total_users > 0 {
        total_bytes / total_users
    } else {
        0
    };
    Ok((total_users, total_bytes, average))
}
