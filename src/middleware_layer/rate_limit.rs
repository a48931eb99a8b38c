use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::net::SocketAddr;

use crate::{error::AppError, state::AppState};

/// Extracts the real IP address from the request extensions.
fn extract_real_ip(req: &Request<Body>) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Per-IP limiter backed by Redis INCR/EXPIRE. Counters fail open: if Redis
/// is down the request goes through.
async fn limit_by_ip(
    state: &AppState,
    ip: String,
    bucket: &str,
    max_attempts: i32,
    window_secs: i64,
    message: &str,
) -> Option<Response> {
    let key = format!("rate_limit:{}:{}", bucket, ip);

    let count: Option<i32> = redis::cmd("GET")
        .arg(&key)
        .query_async(&mut state.redis.clone())
        .await
        .unwrap_or(None);

    if let Some(attempts) = count {
        if attempts >= max_attempts {
            let ttl: Option<i32> = redis::cmd("TTL")
                .arg(&key)
                .query_async(&mut state.redis.clone())
                .await
                .unwrap_or(None);

            return Some(
                AppError::RateLimitExceeded(format!(
                    "{}. Try again in {} minutes",
                    message,
                    ttl.unwrap_or(0) / 60
                ))
                .into_response(),
            );
        }
    }

    let _: () = redis::cmd("INCR")
        .arg(&key)
        .query_async(&mut state.redis.clone())
        .await
        .unwrap_or(());

    let _: () = redis::cmd("EXPIRE")
        .arg(&key)
        .arg(window_secs)
        .query_async(&mut state.redis.clone())
        .await
        .unwrap_or(());

    None
}

/// A middleware that rate limits account registration: 5 per IP per hour.
pub async fn rate_limit_register(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    if let Some(rejected) =
        limit_by_ip(&state, ip, "register", 5, 3600, "Registration limit exceeded").await
    {
        return rejected;
    }

    next.run(req).await
}

/// A middleware that rate limits login attempts: 20 per IP per 15 minutes.
pub async fn rate_limit_login(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = extract_real_ip(&req);
    if let Some(rejected) =
        limit_by_ip(&state, ip, "login", 20, 900, "Too many login attempts").await
    {
        return rejected;
    }

    next.run(req).await
}
