use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::error::{AppError, Result};
use crate::models::session::Session;

fn row_to_session(row: &Row) -> Result<Session> {
    Ok(Session {
        token: row
            .try_get("token")
            .map_err(|_| AppError::MissingData("token".into()))?,
        username: row
            .try_get("username")
            .map_err(|_| AppError::MissingData("username".into()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|_| AppError::MissingData("created_at".into()))?,
        expires_at: row
            .try_get("expires_at")
            .map_err(|_| AppError::MissingData("expires_at".into()))?,
        last_accessed: row
            .try_get("last_accessed")
            .map_err(|_| AppError::MissingData("last_accessed".into()))?,
        user_agent: row
            .try_get("user_agent")
            .map_err(|_| AppError::MissingData("user_agent".into()))?,
        ip_address: row
            .try_get("ip_address")
            .map_err(|_| AppError::MissingData("ip_address".into()))?,
    })
}

/// Inserts a session with a fixed expiry `duration_days` out from now.
pub async fn create(
    pool: &Pool,
    token: &str,
    username: &str,
    duration_days: i64,
    user_agent: Option<&str>,
    ip_address: Option<&str>,
) -> Result<Session> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO sessions (token, username, created_at, expires_at, last_accessed, user_agent, ip_address)
            VALUES ($1, $2, NOW(), NOW() + make_interval(days => $3::int), NOW(), $4, $5)
            RETURNING token, username, created_at, expires_at, last_accessed, user_agent, ip_address
            "#,
            &[&token, &username, &(duration_days as i32), &user_agent, &ip_address],
        )
        .await?;

    row_to_session(&row)
}

/// Looks up a session by token, returning it only if unexpired.
pub async fn find_valid(pool: &Pool, token: &str) -> Result<Option<Session>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT token, username, created_at, expires_at, last_accessed, user_agent, ip_address
            FROM sessions
            WHERE token = $1 AND expires_at > NOW()
            "#,
            &[&token],
        )
        .await?;

    row.as_ref().map(row_to_session).transpose()
}

/// Records activity on a session. Never moves `expires_at`.
pub async fn touch(pool: &Pool, token: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE sessions SET last_accessed = NOW() WHERE token = $1",
            &[&token],
        )
        .await?;
    Ok(())
}

/// Deletes every session belonging to a user. Returns the number removed.
pub async fn delete_for_user(pool: &Pool, username: &str) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute("DELETE FROM sessions WHERE username = $1", &[&username])
        .await?;
    Ok(deleted)
}

/// Sweeps expired sessions. Run periodically from the cleanup task.
pub async fn delete_expired(pool: &Pool) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute("DELETE FROM sessions WHERE expires_at <= NOW()", &[])
        .await?;
    Ok(deleted)
}
