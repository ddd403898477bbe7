use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Column, ColumnKind, ListQuery, Page, Record, Value};

/// Lifecycle of a card. `approved` and `rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum CardState {
    Issued,
    Approved,
    Rejected,
}

impl CardState {
    pub const LABELS: &'static [&'static str] = &["issued", "approved", "rejected"];

    pub fn as_str(self) -> &'static str {
        match self {
            CardState::Issued => "issued",
            CardState::Approved => "approved",
            CardState::Rejected => "rejected",
        }
    }

    /// Only `issued -> approved` and `issued -> rejected` exist.
    pub fn can_transition_to(self, next: CardState) -> bool {
        matches!(
            (self, next),
            (CardState::Issued, CardState::Approved) | (CardState::Issued, CardState::Rejected)
        )
    }
}

impl std::fmt::Display for CardState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Card {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub state: CardState,
    pub activation_code: Option<String>,
    pub pin_code: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateCardData {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub pin_code: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardColumn {
    Id,
    UserId,
    ProductId,
    State,
    ActivationCode,
    PinCode,
    CreatedAt,
    UpdatedAt,
}

impl Column for CardColumn {
    const ALL: &'static [Self] = &[
        CardColumn::Id,
        CardColumn::UserId,
        CardColumn::ProductId,
        CardColumn::State,
        CardColumn::ActivationCode,
        CardColumn::PinCode,
        CardColumn::CreatedAt,
        CardColumn::UpdatedAt,
    ];
    const UPDATED_AT: Self = CardColumn::UpdatedAt;

    fn name(self) -> &'static str {
        match self {
            CardColumn::Id => "id",
            CardColumn::UserId => "user_id",
            CardColumn::ProductId => "product_id",
            CardColumn::State => "state",
            CardColumn::ActivationCode => "activation_code",
            CardColumn::PinCode => "pin_code",
            CardColumn::CreatedAt => "created_at",
            CardColumn::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            CardColumn::Id | CardColumn::UserId | CardColumn::ProductId => ColumnKind::Uuid,
            CardColumn::State => ColumnKind::Enum(CardState::LABELS),
            CardColumn::ActivationCode | CardColumn::PinCode => ColumnKind::Text,
            CardColumn::CreatedAt | CardColumn::UpdatedAt => ColumnKind::Timestamp,
        }
    }
}

impl Record<CardColumn> for Card {
    fn value(&self, column: CardColumn) -> Value {
        match column {
            CardColumn::Id => self.id.into(),
            CardColumn::UserId => self.user_id.into(),
            CardColumn::ProductId => self.product_id.into(),
            CardColumn::State => self.state.as_str().into(),
            CardColumn::ActivationCode => self.activation_code.as_deref().into(),
            CardColumn::PinCode => self.pin_code.as_deref().into(),
            CardColumn::CreatedAt => self.created_at.into(),
            CardColumn::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Card {
    /// Creates a new card in `issued` state
    pub async fn create(conn: &mut PgConnection, data: &CreateCardData) -> Result<Self, sqlx::Error> {
        let card = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO cards (user_id, product_id, state, pin_code)
            VALUES ($1, $2, 'issued', $3)
            RETURNING *
            "#,
        )
        .bind(data.user_id)
        .bind(data.product_id)
        .bind(&data.pin_code)
        .fetch_one(conn)
        .await?;

        Ok(card)
    }

    /// Finds a live card, optionally restricted to one owner
    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM cards
            WHERE id = $1
              AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR user_id = $2)
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(conn)
        .await
    }

    /// Same as `find_by_id` but holds a row lock until the transaction ends
    pub async fn lock_by_id(
        conn: &mut PgConnection,
        id: Uuid,
        owner: Option<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM cards
            WHERE id = $1
              AND deleted_at IS NULL
              AND ($2::uuid IS NULL OR user_id = $2)
            FOR UPDATE
            "#,
        )
        .bind(id)
        .bind(owner)
        .fetch_optional(conn)
        .await
    }

    /// Whether the (user, product) pair already has a live card other than `except`
    pub async fn live_exists(
        conn: &mut PgConnection,
        user_id: Uuid,
        product_id: Uuid,
        except: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cards
                WHERE user_id = $1
                  AND product_id = $2
                  AND deleted_at IS NULL
                  AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .bind(except)
        .fetch_one(conn)
        .await?;

        Ok(exists)
    }

    /// Checks every card, soft-deleted ones included
    pub async fn activation_code_exists(
        conn: &mut PgConnection,
        code: &str,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM cards WHERE activation_code = $1)")
            .bind(code)
            .fetch_one(conn)
            .await
    }

    /// Persists the mutable columns of a card
    pub async fn save(conn: &mut PgConnection, card: &Card) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE cards
            SET
                product_id = $2,
                state = $3,
                activation_code = $4,
                pin_code = $5,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(card.id)
        .bind(card.product_id)
        .bind(card.state)
        .bind(&card.activation_code)
        .bind(&card.pin_code)
        .fetch_one(conn)
        .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE cards
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_one(conn)
        .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        query: &ListQuery<CardColumn>,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM cards WHERE deleted_at IS NULL");
        query.push_filters(&mut count);
        let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM cards WHERE deleted_at IS NULL");
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
