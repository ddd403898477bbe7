use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub session_token: String,
    pub login_ip: Option<String>,
    pub browser: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateSessionData {
    pub user_id: Uuid,
    pub session_token: String,
    pub login_ip: Option<String>,
    pub browser: Option<String>,
}

impl UserSession {
    pub async fn create(
        conn: &mut PgConnection,
        data: &CreateSessionData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO user_sessions (user_id, session_token, login_ip, browser)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(&data.session_token)
        .bind(&data.login_ip)
        .bind(&data.browser)
        .fetch_one(conn)
        .await
    }

    /// Finds a live session by its bearer token
    pub async fn find_by_token(
        conn: &mut PgConnection,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM user_sessions WHERE session_token = $1 AND deleted_at IS NULL",
        )
        .bind(token)
        .fetch_optional(conn)
        .await
    }

    /// Checks every session, soft-deleted ones included
    pub async fn token_exists(conn: &mut PgConnection, token: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM user_sessions WHERE session_token = $1)")
            .bind(token)
            .fetch_one(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE user_sessions
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }
}
