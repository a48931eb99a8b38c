use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use crate::error::{AppError, Result};
use crate::models::account::Account;

fn row_to_account(row: &Row) -> Result<Account> {
    Ok(Account {
        username: row
            .try_get("username")
            .map_err(|_| AppError::MissingData("username".into()))?,
        encrypted_data: row
            .try_get("encrypted_data")
            .map_err(|_| AppError::MissingData("encrypted_data".into()))?,
        iv: row
            .try_get("iv")
            .map_err(|_| AppError::MissingData("iv".into()))?,
        encryption_salt: row
            .try_get("encryption_salt")
            .map_err(|_| AppError::MissingData("encryption_salt".into()))?,
        recovery_hash: row
            .try_get("recovery_hash")
            .map_err(|_| AppError::MissingData("recovery_hash".into()))?,
        created_at: row
            .try_get("created_at")
            .map_err(|_| AppError::MissingData("created_at".into()))?,
        last_sync: row
            .try_get("last_sync")
            .map_err(|_| AppError::MissingData("last_sync".into()))?,
        last_login: row
            .try_get("last_login")
            .map_err(|_| AppError::MissingData("last_login".into()))?,
        device_count: row
            .try_get("device_count")
            .map_err(|_| AppError::MissingData("device_count".into()))?,
    })
}

/// Inserts a new account row.
///
/// # Arguments
///
/// * `pool` - The database connection pool.
/// * `username` - The validated username.
/// * `encrypted_data` - The base64 ciphertext of the initial document.
/// * `iv` - The hex IV of the initial encryption.
/// * `encryption_salt` - The hex key-derivation salt.
/// * `recovery_hash` - The SHA-256 hash of the recovery key.
///
/// # Returns
///
/// A `Result` containing the created `Account`.
pub async fn create(
    pool: &Pool,
    username: &str,
    encrypted_data: &str,
    iv: &str,
    encryption_salt: &str,
    recovery_hash: &str,
) -> Result<Account> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO user_backups (
                username, encrypted_data, iv, encryption_salt, recovery_hash,
                created_at, last_sync, last_login, device_count
            )
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW(), NOW(), 1)
            RETURNING username, encrypted_data, iv, encryption_salt, recovery_hash,
                      created_at, last_sync, last_login, device_count
            "#,
            &[&username, &encrypted_data, &iv, &encryption_salt, &recovery_hash],
        )
        .await?;

    row_to_account(&row)
}

/// Finds an account by username, or `None` if it does not exist.
pub async fn find_by_username(pool: &Pool, username: &str) -> Result<Option<Account>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT username, encrypted_data, iv, encryption_salt, recovery_hash,
                   created_at, last_sync, last_login, device_count
            FROM user_backups
            WHERE username = $1
            "#,
            &[&username],
        )
        .await?;

    row.as_ref().map(row_to_account).transpose()
}

/// Replaces the encrypted blob and advances `last_sync` to the server clock.
///
/// # Returns
///
/// The new `last_sync` timestamp, which the caller must echo to the client.
pub async fn update_sync(
    pool: &Pool,
    username: &str,
    encrypted_data: &str,
    iv: &str,
) -> Result<DateTime<Utc>> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            UPDATE user_backups
            SET encrypted_data = $2, iv = $3, last_sync = NOW()
            WHERE username = $1
            RETURNING last_sync
            "#,
            &[&username, &encrypted_data, &iv],
        )
        .await?;

    row.try_get("last_sync")
        .map_err(|_| AppError::MissingData("last_sync".into()))
}

/// Bumps the device counter and login timestamp on a successful login.
pub async fn touch_login(pool: &Pool, username: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute(
            r#"
            UPDATE user_backups
            SET device_count = device_count + 1, last_login = NOW()
            WHERE username = $1
            "#,
            &[&username],
        )
        .await?;
    Ok(())
}

/// Replaces the blob, IV and salt after a recovery-key reset.
pub async fn update_reset(
    pool: &Pool,
    username: &str,
    encrypted_data: &str,
    iv: &str,
    encryption_salt: &str,
) -> Result<DateTime<Utc>> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            UPDATE user_backups
            SET encrypted_data = $2, iv = $3, encryption_salt = $4, last_sync = NOW()
            WHERE username = $1
            RETURNING last_sync
            "#,
            &[&username, &encrypted_data, &iv, &encryption_salt],
        )
        .await?;

    row.try_get("last_sync")
        .map_err(|_| AppError::MissingData("last_sync".into()))
}

/// Deletes an account row. Returns whether a row existed.
pub async fn delete(pool: &Pool, username: &str) -> Result<bool> {
    let client = pool.get().await?;
    let deleted = client
        .execute("DELETE FROM user_backups WHERE username = $1", &[&username])
        .await?;
    Ok(deleted > 0)
}

/// Aggregate storage statistics. Counts and byte totals only; the server has
/// nothing else it could report.
pub async fn stats(pool: &Pool) -> Result<(i64, i64)> {
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            SELECT COUNT(*) AS total_users,
                   COALESCE(SUM(LENGTH(encrypted_data)), 0)::BIGINT AS total_bytes
            FROM user_backups
            "#,
            &[],
        )
        .await?;

    let total_users: i64 = row
        .try_get("total_users")
        .map_err(|_| AppError::MissingData("total_users".into()))?;
    let total_bytes: i64 = row
        .try_get("total_bytes")
        .map_err(|_| AppError::MissingData("total_bytes".into()))?;
    Ok((total_users, total_bytes))
}
