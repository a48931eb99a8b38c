use axum::{
    extract::State,
    response::{IntoResponse, Response},
    Json,
};
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::{AppError, Result},
    handlers::backup::SESSION_COOKIE,
    models::wire::SessionRecoveryResponse,
    services::backup as backup_service,
    services::session as session_service,
    state::AppState,
};

/// Session recovery: a client whose local storage was cleared presents its
/// cookie and gets its ciphertext back without retyping the username. The
/// password is still required client-side to decrypt.
#[axum::debug_handler]
pub async fn recover(State(state): State<AppState>, cookies: Cookies) -> Result<Response> {
    let token = cookies
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(AppError::SessionExpired)?;

    let session = match session_service::validate_session(&state, &token).await {
        Ok(session) => session,
        Err(err) => {
            // Stale cookies are removed so the client stops presenting them.
            cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());
            return Err(err);
        }
    };

    let account = backup_service::export_account(&state, &session.username).await?;

    tracing::debug!("🔑 Session recovered: {}", session.username);

    let response = SessionRecoveryResponse {
        success: true,
        username: account.username,
        encrypted_data: account.encrypted_data,
        iv: account.iv,
        encryption_salt: account.encryption_salt,
        last_sync: account.last_sync,
    };

    Ok(Json(response).into_response())
}
