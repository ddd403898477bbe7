use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::RecordState;
use crate::db::query::{Column, ColumnKind, ListQuery, Page, Record, Value};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub brand_id: Uuid,
    pub name: String,
    pub state: RecordState,
    pub description: Option<String>,
    pub price_cents: i64,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateProductData {
    pub brand_id: Uuid,
    pub name: String,
    pub state: RecordState,
    pub description: Option<String>,
    pub price_cents: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductColumn {
    Id,
    BrandId,
    Name,
    State,
    PriceCents,
    CreatedAt,
    UpdatedAt,
}

impl Column for ProductColumn {
    const ALL: &'static [Self] = &[
        ProductColumn::Id,
        ProductColumn::BrandId,
        ProductColumn::Name,
        ProductColumn::State,
        ProductColumn::PriceCents,
        ProductColumn::CreatedAt,
        ProductColumn::UpdatedAt,
    ];
    const UPDATED_AT: Self = ProductColumn::UpdatedAt;

    fn name(self) -> &'static str {
        match self {
            ProductColumn::Id => "id",
            ProductColumn::BrandId => "brand_id",
            ProductColumn::Name => "name",
            ProductColumn::State => "state",
            ProductColumn::PriceCents => "price_cents",
            ProductColumn::CreatedAt => "created_at",
            ProductColumn::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            ProductColumn::Id | ProductColumn::BrandId => ColumnKind::Uuid,
            ProductColumn::Name => ColumnKind::Text,
            ProductColumn::State => ColumnKind::Enum(RecordState::LABELS),
            ProductColumn::PriceCents => ColumnKind::Integer,
            ProductColumn::CreatedAt | ProductColumn::UpdatedAt => ColumnKind::Timestamp,
        }
    }
}

impl Record<ProductColumn> for Product {
    fn value(&self, column: ProductColumn) -> Value {
        match column {
            ProductColumn::Id => self.id.into(),
            ProductColumn::BrandId => self.brand_id.into(),
            ProductColumn::Name => self.name.as_str().into(),
            ProductColumn::State => self.state.as_str().into(),
            ProductColumn::PriceCents => Value::Integer(self.price_cents),
            ProductColumn::CreatedAt => self.created_at.into(),
            ProductColumn::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Product {
    pub async fn create(
        conn: &mut PgConnection,
        data: &CreateProductData,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO products (brand_id, name, state, description, price_cents)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(data.brand_id)
        .bind(&data.name)
        .bind(data.state)
        .bind(&data.description)
        .bind(data.price_cents)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM products WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Persists the editable columns of a product
    pub async fn save(conn: &mut PgConnection, product: &Product) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE products
            SET
                name = $2,
                state = $3,
                description = $4,
                price_cents = $5,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.state)
        .bind(&product.description)
        .bind(product.price_cents)
        .fetch_one(conn)
        .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(conn)
        .await?;

        Ok(())
    }

    pub async fn list(
        conn: &mut PgConnection,
        query: &ListQuery<ProductColumn>,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count =
            QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL");
        query.push_filters(&mut count);
        let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM products WHERE deleted_at IS NULL");
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
