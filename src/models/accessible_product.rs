use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::db::query::{Column, ColumnKind, ListQuery, Page, Record, Value};

/// A user's access to a product. Moves to `active` once and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum EntitlementState {
    Inactive,
    Active,
}

impl EntitlementState {
    pub const LABELS: &'static [&'static str] = &["inactive", "active"];

    pub fn as_str(self) -> &'static str {
        match self {
            EntitlementState::Inactive => "inactive",
            EntitlementState::Active => "active",
        }
    }
}

/// Per-user, per-product entitlement, created inactive when a card for the
/// pair is approved and activated by redeeming that card.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AccessibleProduct {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub state: EntitlementState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessibleProductColumn {
    Id,
    UserId,
    ProductId,
    State,
    CreatedAt,
    UpdatedAt,
}

impl Column for AccessibleProductColumn {
    const ALL: &'static [Self] = &[
        AccessibleProductColumn::Id,
        AccessibleProductColumn::UserId,
        AccessibleProductColumn::ProductId,
        AccessibleProductColumn::State,
        AccessibleProductColumn::CreatedAt,
        AccessibleProductColumn::UpdatedAt,
    ];
    const UPDATED_AT: Self = AccessibleProductColumn::UpdatedAt;

    fn name(self) -> &'static str {
        match self {
            AccessibleProductColumn::Id => "id",
            AccessibleProductColumn::UserId => "user_id",
            AccessibleProductColumn::ProductId => "product_id",
            AccessibleProductColumn::State => "state",
            AccessibleProductColumn::CreatedAt => "created_at",
            AccessibleProductColumn::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            AccessibleProductColumn::Id
            | AccessibleProductColumn::UserId
            | AccessibleProductColumn::ProductId => ColumnKind::Uuid,
            AccessibleProductColumn::State => ColumnKind::Enum(EntitlementState::LABELS),
            AccessibleProductColumn::CreatedAt | AccessibleProductColumn::UpdatedAt => {
                ColumnKind::Timestamp
            }
        }
    }
}

impl Record<AccessibleProductColumn> for AccessibleProduct {
    fn value(&self, column: AccessibleProductColumn) -> Value {
        match column {
            AccessibleProductColumn::Id => self.id.into(),
            AccessibleProductColumn::UserId => self.user_id.into(),
            AccessibleProductColumn::ProductId => self.product_id.into(),
            AccessibleProductColumn::State => self.state.as_str().into(),
            AccessibleProductColumn::CreatedAt => self.created_at.into(),
            AccessibleProductColumn::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl AccessibleProduct {
    /// Creates an inactive entitlement. Fails on the (user, product) unique
    /// constraint if one already exists.
    pub async fn create_inactive(
        conn: &mut PgConnection,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO accessible_products (user_id, product_id, state)
            VALUES ($1, $2, 'inactive')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_one(conn)
        .await
    }

    /// Flips the pair's entitlement from inactive to active. Returns `None`
    /// when there is no inactive entitlement, so of two concurrent callers
    /// only one gets a row back.
    pub async fn activate(
        conn: &mut PgConnection,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE accessible_products
            SET state = 'active', updated_at = NOW()
            WHERE user_id = $1
              AND product_id = $2
              AND state = 'inactive'
              AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(conn)
        .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        query: &ListQuery<AccessibleProductColumn>,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM accessible_products WHERE deleted_at IS NULL",
        );
        query.push_filters(&mut count);
        let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut select =
            QueryBuilder::<Postgres>::new("SELECT * FROM accessible_products WHERE deleted_at IS NULL");
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
