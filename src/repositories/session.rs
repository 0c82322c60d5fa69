use deadpool_postgres::Pool;
use tokio_postgres::Row;
use uuid::Uuid;
use crate::{
    error::{AppError, Result},
    models::session::Session,
};

fn row_to_session(row: &Row) -> Result<Session> {
    Ok(Session {
        id: row.try_get("id").map_err(|_| AppError::MissingData("id".to_string()))?,
        user_id: row.try_get("user_id").map_err(|_| AppError::MissingData("user_id".to_string()))?,
        token: row.try_get("token").map_err(|_| AppError::MissingData("token".to_string()))?,
        expires_at: row.try_get("expires_at").map_err(|_| AppError::MissingData("expires_at".to_string()))?,
        created_at: row.try_get("created_at").map_err(|_| AppError::MissingData("created_at".to_string()))?,
    })
}

/// Inserts a session expiring `lifetime_hours` after the database clock.
pub async fn create_session(
    pool: &Pool,
    id: Uuid,
    user_id: Uuid,
    token: &str,
    lifetime_hours: i64,
) -> Result<Session> {
    let hours = lifetime_hours as f64;
    let client = pool.get().await?;
    let row = client
        .query_one(
            r#"
            INSERT INTO user_sessions (id, user_id, token, expires_at)
            VALUES ($1, $2, $3, NOW() + ($4::FLOAT8 * INTERVAL '1 hour'))
            RETURNING id, user_id, token, expires_at, created_at
            "#,
            &[&id, &user_id, &token, &hours],
        )
        .await?;
    row_to_session(&row)
}

/// Finds a session by its token, expired or not.
pub async fn find_by_token(pool: &Pool, token: &str) -> Result<Option<Session>> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            r#"
            SELECT id, user_id, token, expires_at, created_at
            FROM user_sessions
            WHERE token = $1
            "#,
            &[&token],
        )
        .await?;
    row.map(|r| row_to_session(&r)).transpose()
}

/// Deletes the session carrying `token`. Deleting a missing row is not an error.
pub async fn delete_by_token(pool: &Pool, token: &str) -> Result<()> {
    let client = pool.get().await?;
    client
        .execute("DELETE FROM user_sessions WHERE token = $1", &[&token])
        .await?;
    Ok(())
}

/// Deletes every session that is past its expiry or never had one.
pub async fn delete_expired(pool: &Pool) -> Result<u64> {
    let client = pool.get().await?;
    let deleted = client
        .execute(
            "DELETE FROM user_sessions WHERE expires_at IS NULL OR expires_at <= NOW()",
            &[],
        )
        .await?;
    Ok(deleted)
}
