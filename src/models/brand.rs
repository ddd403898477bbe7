use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use super::RecordState;
use crate::db::query::{Column, ColumnKind, ListQuery, Page, Record, Value};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Brand {
    pub id: Uuid,
    pub name: String,
    pub state: RecordState,
    pub description: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBrandData {
    pub name: String,
    pub description: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandColumn {
    Id,
    Name,
    State,
    Country,
    CreatedAt,
    UpdatedAt,
}

impl Column for BrandColumn {
    const ALL: &'static [Self] = &[
        BrandColumn::Id,
        BrandColumn::Name,
        BrandColumn::State,
        BrandColumn::Country,
        BrandColumn::CreatedAt,
        BrandColumn::UpdatedAt,
    ];
    const UPDATED_AT: Self = BrandColumn::UpdatedAt;

    fn name(self) -> &'static str {
        match self {
            BrandColumn::Id => "id",
            BrandColumn::Name => "name",
            BrandColumn::State => "state",
            BrandColumn::Country => "country",
            BrandColumn::CreatedAt => "created_at",
            BrandColumn::UpdatedAt => "updated_at",
        }
    }

    fn kind(self) -> ColumnKind {
        match self {
            BrandColumn::Id => ColumnKind::Uuid,
            BrandColumn::Name | BrandColumn::Country => ColumnKind::Text,
            BrandColumn::State => ColumnKind::Enum(RecordState::LABELS),
            BrandColumn::CreatedAt | BrandColumn::UpdatedAt => ColumnKind::Timestamp,
        }
    }
}

impl Record<BrandColumn> for Brand {
    fn value(&self, column: BrandColumn) -> Value {
        match column {
            BrandColumn::Id => self.id.into(),
            BrandColumn::Name => self.name.as_str().into(),
            BrandColumn::State => self.state.as_str().into(),
            BrandColumn::Country => self.country.as_deref().into(),
            BrandColumn::CreatedAt => self.created_at.into(),
            BrandColumn::UpdatedAt => self.updated_at.into(),
        }
    }
}

impl Brand {
    pub async fn create(conn: &mut PgConnection, data: &CreateBrandData) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO brands (name, description, country, website_url)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&data.name)
        .bind(&data.description)
        .bind(&data.country)
        .bind(&data.website_url)
        .fetch_one(conn)
        .await
    }

    pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM brands WHERE id = $1 AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// Persists the editable columns of a brand
    pub async fn save(conn: &mut PgConnection, brand: &Brand) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE brands
            SET
                name = $2,
                state = $3,
                description = $4,
                country = $5,
                website_url = $6,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(brand.id)
        .bind(&brand.name)
        .bind(brand.state)
        .bind(&brand.description)
        .bind(&brand.country)
        .bind(&brand.website_url)
        .fetch_one(conn)
        .await
    }

    /// Soft-deletes the brand together with its live products
    pub async fn soft_delete(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE products
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE brand_id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        sqlx::query(
            r#"
            UPDATE brands
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn list(
        conn: &mut PgConnection,
        query: &ListQuery<BrandColumn>,
    ) -> Result<Page<Self>, sqlx::Error> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM brands WHERE deleted_at IS NULL");
        query.push_filters(&mut count);
        let (total_count,) = count.build_query_as::<(i64,)>().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new("SELECT * FROM brands WHERE deleted_at IS NULL");
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
