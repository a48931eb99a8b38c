//! Session lifecycle: opaque token issuance, validation, cleanup.
//!
//! Tokens are 256 random bits, hex encoded, stored server-side with a fixed
//! 30-day expiry. Validation refreshes `last_accessed` only; the TTL never
//! slides, so a stolen cookie cannot be kept alive indefinitely.

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::{AppError, Result};
use crate::models::session::Session;
use crate::repositories;
use crate::state::AppState;

/// Generates an opaque 256-bit session token, hex encoded.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Issues a new session for `username` with the configured fixed TTL.
pub async fn create_session(
    state: &AppState,
    username: &str,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
) -> Result<Session> {
    let token = generate_token();
    let session = repositories::session::create(
        &state.db,
        &token,
        username,
        state.config.session_duration_days,
        user_agent,
        ip_address,
    )
    .await?;

    tracing::debug!(username = %username, "session created");
    Ok(session)
}

/// Resolves a token to a live session, touching `last_accessed`.
///
/// Expired or unknown tokens are indistinguishable to the caller.
pub async fn validate_session(state: &AppState, token: &str) -> Result<Session> {
    let session = repositories::session::find_valid(&state.db, token)
        .await?
        .ok_or(AppError::SessionExpired)?;

    repositories::session::touch(&state.db, &session.token).await?;
    Ok(session)
}

/// Revokes all of a user's sessions (logout everywhere, account deletion).
pub async fn delete_user_sessions(state: &AppState, username: &str) -> Result<u64> {
    repositories::session::delete_for_user(&state.db, username).await
}

/// Removes expired sessions. Called hourly from the background task.
pub async fn cleanup_expired(state: &AppState) -> Result<u64> {
    let removed = repositories::session::delete_expired(&state.db).await?;
    if removed > 0 {
        tracing::info!(removed, "expired sessions swept");
    }
    Ok(removed)
}
