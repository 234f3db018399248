use chrono::{TimeZone, Utc};
use sqlx::{Pool, Postgres};

use crate::{error::ApiError, schema::Uuid};

/// `Some(is_superuser)` when the user still exists and the token id has not been revoked.
pub async fn session_admin_flag(
    user_id: Uuid,
    jti: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<bool>, ApiError> {
    let row: Option<(bool,)> = sqlx::query_as(
        "
        SELECT u.is_superuser
        FROM users u
        WHERE u.id = $1
        AND NOT EXISTS (SELECT 1 FROM revoked_tokens t WHERE t.jti = $2)
        ",
    )
    .bind(user_id)
    .bind(jti)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.0))
}

/// Records the token id as revoked until it would have expired anyway.
/// Entries whose tokens have already expired are cleaned up on the way.
pub async fn revoke_token(jti: &str, expires_at: i64, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let expires_at = Utc
        .timestamp_opt(expires_at, 0)
        .single()
        .ok_or_else(|| ApiError::internal(format!("Invalid token expiry {expires_at}")))?;

    let mut tr = pool.begin().await?;

    sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < NOW()")
        .execute(&mut *tr)
        .await?;

    sqlx::query("INSERT INTO revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(jti)
        .bind(expires_at)
        .execute(&mut *tr)
        .await?;

    tr.commit().await?;
    Ok(())
}
