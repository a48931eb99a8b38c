use axum::{
    extract::{ConnectInfo, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::net::SocketAddr;
use tower_cookies::cookie::time::Duration;
use tower_cookies::{Cookie, Cookies};

use crate::{
    error::Result,
    models::wire::{
        DeleteAccountRequest, ExportResponse, LoginRequest, LoginResponse, RegisterRequest,
        RegisterResponse, ResetRequest, StatsResponse, SuccessResponse, SyncRequest, SyncResponse,
    },
    services::backup as backup_service,
    services::backup::SyncOutcome,
    services::session as session_service,
    state::AppState,
};

pub const SESSION_COOKIE: &str = "wdp_session";

/// Creates the session cookie: HttpOnly, SameSite=Strict, Secure in
/// production, fixed 30-day max-age.
fn create_session_cookie(token: String, max_age_days: i64, production: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_http_only(true);
    if production {
        cookie.set_secure(true);
    }
    cookie.set_same_site(tower_cookies::cookie::SameSite::Strict);
    cookie.set_max_age(Duration::seconds(max_age_days * 86400));
    cookie.set_path("/");
    cookie
}

fn user_agent_of(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Handles account registration: stores the client's ciphertext and opens a
/// session.
#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    tracing::info!("📝 Register attempt: {}", payload.username);

    let account = backup_service::register_account(
        &state,
        &payload.username,
        &payload.encrypted_data,
        &payload.iv,
        &payload.encryption_salt,
        &payload.recovery_hash,
    )
    .await?;

    let session = session_service::create_session(
        &state,
        &account.username,
        user_agent_of(&headers).as_deref(),
        Some(&addr.ip().to_string()),
    )
    .await?;

    cookies.add(create_session_cookie(
        session.token.clone(),
        state.config.session_duration_days,
        state.config.production,
    ));

    tracing::info!("✅ Account registered: {}", account.username);

    let response = RegisterResponse {
        success: true,
        username: account.username,
        last_sync: account.last_sync,
        session_token: session.token,
    };

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

/// Handles login. The request carries only the username; the server returns
/// the ciphertext and decryption happens client-side. An unknown username is
/// reported as 404 and the client folds it into an undifferentiated
/// authentication failure.
#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Result<Response> {
    tracing::info!("🔐 Login attempt: {}", payload.username);

    let account = backup_service::fetch_account_for_login(&state, &payload.username).await?;

    let session = session_service::create_session(
        &state,
        &account.username,
        user_agent_of(&headers).as_deref(),
        Some(&addr.ip().to_string()),
    )
    .await?;

    cookies.add(create_session_cookie(
        session.token.clone(),
        state.config.session_duration_days,
        state.config.production,
    ));

    let response = LoginResponse {
        success: true,
        encrypted_data: account.encrypted_data,
        iv: account.iv,
        encryption_salt: account.encryption_salt,
        last_sync: account.last_sync,
        session_token: session.token,
    };

    Ok(Json(response).into_response())
}

/// Handles a sync upload. Answers `server_data_newer` with the server blob
/// when another device synced since this client last pulled.
#[axum::debug_handler]
pub async fn sync(
    State(state): State<AppState>,
    Json(payload): Json<SyncRequest>,
) -> Result<Response> {
    let outcome = backup_service::sync_account(
        &state,
        &payload.username,
        &payload.encrypted_data,
        &payload.iv,
        payload.last_sync,
    )
    .await?;

    let response = match outcome {
        SyncOutcome::Accepted { last_sync } => SyncResponse {
            success: true,
            server_data_newer: false,
            encrypted_data: None,
            iv: None,
            last_sync,
        },
        SyncOutcome::ServerNewer {
            encrypted_data,
            iv,
            last_sync,
        } => SyncResponse {
            success: true,
            server_data_newer: true,
            encrypted_data: Some(encrypted_data),
            iv: Some(iv),
            last_sync,
        },
    };

    Ok(Json(response).into_response())
}

/// Handles account deletion: removes the backup row, all sessions, and the
/// cookie.
#[axum::debug_handler]
pub async fn delete_account(
    State(state): State<AppState>,
    cookies: Cookies,
    Json(payload): Json<DeleteAccountRequest>,
) -> Result<Response> {
    backup_service::delete_account(&state, &payload.username).await?;

    cookies.remove(Cookie::build(SESSION_COOKIE).path("/").build());

    let response = SuccessResponse {
        success: true,
        message: "Account deleted".to_string(),
    };

    Ok(Json(response).into_response())
}

/// Handles a recovery-key reset: swaps in a blob re-encrypted under a new
/// password.
#[axum::debug_handler]
pub async fn reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Response> {
    backup_service::reset_with_recovery_key(
        &state,
        &payload.username,
        &payload.recovery_key,
        &payload.new_encrypted_data,
        &payload.new_iv,
        &payload.new_salt,
    )
    .await?;

    let response = SuccessResponse {
        success: true,
        message: "Account reset".to_string(),
    };

    Ok(Json(response).into_response())
}

/// Returns an account's stored material for download. Ciphertext only.
#[axum::debug_handler]
pub async fn export(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response> {
    let account = backup_service::export_account(&state, &username).await?;

    let response = ExportResponse {
        username: account.username,
        encrypted_data: account.encrypted_data,
        iv: account.iv,
        encryption_salt: account.encryption_salt,
        created_at: account.created_at,
        last_sync: account.last_sync,
        note: "Data is encrypted; decryption requires your password".to_string(),
    };

    Ok(Json(response).into_response())
}

/// Aggregate storage statistics.
#[axum::debug_handler]
pub async fn stats(State(state): State<AppState>) -> Result<Response> {
    let (total_users, total_storage_bytes, average_user_size_bytes) =
        backup_service::storage_stats(&state).await?;

    let response = StatsResponse {
        total_users,
        total_storage_bytes,
        average_user_size_bytes,
    };

    Ok(Json(response).into_response())
}
