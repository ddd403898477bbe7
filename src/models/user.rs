use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::RecordState;
use crate::db::query::{Column, ColumnKind, ListQuery, Page, Record, Value};

/// Account type. Only clients hold cards; admins review them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub const LABELS: &'static [&'static str] = &["admin", "client"];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Client => "client",
        }
    }

    pub fn can_own_cards(self) -> bool {
        matches!(self, Role::Client)
    }

    pub fn can_review_cards(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub state: RecordState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateUserData {
    pub name: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserColumn {
    Id,
    Name,
    Email,
    Role,
    State,
    CreatedAt,
    UpdatedAt,
}

impl Column for UserColumn {
    const ALL: &'static [Self] = &[
        UserColumn::Id,
        UserColumn::Name,
        UserColumn::Email,
        UserColumn::Role,
        UserColumn::State,
        UserColumn::CreatedAt,
        UserColumn::UpdatedAt,
    ];
    const UPDATED_AT: Self = UserColumn::UpdatedAt;

    fn name(self) -> &'static str {
        match self {
            UserColumn::Id => "id",
            UserColumn::Name => "name",
            UserColumn::Email => "email",
            UserColumn::Role => "role",
            UserColumn::State => "state",
            UserColumn::CreatedAt => "created_at",
            UserColumn::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            UserColumn::Id => ColumnKind::Uuid,
            UserColumn::Name | UserColumn::Email => ColumnKind::Text,
            UserColumn::Role => ColumnKind::Enum(Role::LABELS),
            UserColumn::State => ColumnKind::Enum(RecordState::LABELS),
            UserColumn::CreatedAt | UserColumn::UpdatedAt => ColumnKind::Timestamp,
        }
    }
}

impl Record<UserColumn> for User {
    fn value(&self, column: UserColumn) -> Value {
        match column {
            UserColumn::Id => self.id.into(),
            UserColumn::Name => self.name.as_deref().into(),
            UserColumn::Email => self.email.as_str().into(),
            UserColumn::Role => self.role.as_str().into(),
            UserColumn::State => self.state.as_str().into(),
            UserColumn::CreatedAt => self.created_at.into(),
            UserColumn::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl User {
    pub async fn create(conn: &mut PgConnection, data: &CreateUserData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.password_hash)
        .bind(data.role)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Email lookup is case-insensitive
    pub async fn find_by_email(
        conn: &mut PgConnection,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM users WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(conn)
        .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        query: &ListQuery<UserColumn>,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL");
        query.push_filters(&mut count);
        let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM users WHERE deleted_at IS NULL");
        query.push_filters(&mut select);
        query.push_order_and_page(&mut select);
        let data = select.build_query_as::<Self>().fetch_all(&mut *conn).await?;

        Ok(Page {
            data,
            total_count,
            skip: query.pagination.skip(),
            limit: query.pagination.limit(),
        })
    }
}
