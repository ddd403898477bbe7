//! Brands and the products sold under them.

use uuid::Uuid;

use crate::db::query::{ListQuery, Page};
use crate::db::{Store, UnitOfWork};
use crate::error::{AppError, Result};
use crate::models::{
    brand::{Brand, BrandColumn, CreateBrandData},
    product::{CreateProductData, Product, ProductColumn},
    user::User,
    RecordState,
};

#[derive(Debug, Clone)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub state: Option<RecordState>,
}

/// Fields left `None` keep their current value
#[derive(Debug, Clone, Default)]
pub struct UpdateBrandRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub state: Option<RecordState>,
}

/// Fields left `None` keep their current value
#[derive(Debug, Clone, Default)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub state: Option<RecordState>,
}

fn require_admin(actor: &User) -> Result<()> {
    if actor.role.can_review_cards() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn required_text(value: &str, field: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be blank")));
    }
    Ok(trimmed.to_string())
}

#[tracing::instrument(skip(store, actor, data), fields(admin_id = %actor.id))]
pub async fn create_brand(store: &dyn Store, actor: &User, data: CreateBrandData) -> Result<Brand> {
    require_admin(actor)?;
    let data = CreateBrandData {
        name: required_text(&data.name, "name")?,
        ..data
    };

    let mut uow = store.begin().await?;
    let brand = uow.insert_brand(&data).await?;
    uow.commit().await?;

    tracing::info!(brand_id = %brand.id, "Brand created");
    Ok(brand)
}

fn positive_price(price_cents: i64) -> Result<i64> {
    if price_cents <= 0 {
        return Err(AppError::Validation(
            "price_cents must be greater than zero".to_string(),
        ));
    }
    Ok(price_cents)
}

async fn live_brand(uow: &mut dyn UnitOfWork, brand_id: Uuid) -> Result<Brand> {
    uow.find_brand(brand_id)
        .await?
        .ok_or(AppError::NotFound { resource: "brand" })
}

/// A live product that belongs to a live brand
async fn brand_product(uow: &mut dyn UnitOfWork, brand_id: Uuid, product_id: Uuid) -> Result<Product> {
    live_brand(uow, brand_id).await?;
    uow.find_product(product_id)
        .await?
        .filter(|p| p.brand_id == brand_id)
        .ok_or(AppError::NotFound { resource: "product" })
}

pub async fn list_brands(
    store: &dyn Store,
    actor: &User,
    query: ListQuery<BrandColumn>,
) -> Result<Page<Brand>> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    uow.list_brands(&query).await
}

pub async fn get_brand(store: &dyn Store, actor: &User, brand_id: Uuid) -> Result<Brand> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    live_brand(&mut *uow, brand_id).await
}

#[tracing::instrument(skip(store, actor, request), fields(admin_id = %actor.id))]
pub async fn update_brand(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    request: UpdateBrandRequest,
) -> Result<Brand> {
    require_admin(actor)?;

    let mut uow = store.begin().await?;
    let mut brand = live_brand(&mut *uow, brand_id).await?;
    if let Some(name) = request.name {
        brand.name = required_text(&name, "name")?;
    }
    if let Some(state) = request.state {
        brand.state = state;
    }
    brand.description = request.description.or(brand.description);
    brand.country = request.country.or(brand.country);
    brand.website_url = request.website_url.or(brand.website_url);

    let brand = uow.save_brand(&brand).await?;
    uow.commit().await?;

    tracing::info!("Brand updated");
    Ok(brand)
}

/// Soft-deletes a brand and its products. Cards and entitlements for those
/// products are left as they are.
#[tracing::instrument(skip(store, actor), fields(admin_id = %actor.id))]
pub async fn destroy_brand(store: &dyn Store, actor: &User, brand_id: Uuid) -> Result<()> {
    require_admin(actor)?;

    let mut uow = store.begin().await?;
    live_brand(&mut *uow, brand_id).await?;
    uow.soft_delete_brand(brand_id).await?;
    uow.commit().await?;

    tracing::info!("Brand deleted");
    Ok(())
}

#[tracing::instrument(skip(store, actor, request), fields(admin_id = %actor.id))]
pub async fn create_product(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    request: CreateProductRequest,
) -> Result<Product> {
    require_admin(actor)?;
    let name = required_text(&request.name, "name")?;
    let price_cents = positive_price(request.price_cents)?;

    let mut uow = store.begin().await?;
    live_brand(&mut *uow, brand_id).await?;

    let product = uow
        .insert_product(&CreateProductData {
            brand_id,
            name,
            state: request.state.unwrap_or(RecordState::Active),
            description: request.description,
            price_cents,
        })
        .await?;
    uow.commit().await?;

    tracing::info!(product_id = %product.id, "Product created");
    Ok(product)
}

/// Products of one brand, for the admin catalog.
pub async fn list_brand_products(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    query: ListQuery<ProductColumn>,
) -> Result<Page<Product>> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    live_brand(&mut *uow, brand_id).await?;
    uow.list_products(&query.scoped(ProductColumn::BrandId, brand_id))
        .await
}

pub async fn get_product(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    product_id: Uuid,
) -> Result<Product> {
    require_admin(actor)?;
    let mut uow = store.begin().await?;
    brand_product(&mut *uow, brand_id, product_id).await
}

#[tracing::instrument(skip(store, actor, request), fields(admin_id = %actor.id))]
pub async fn update_product(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    product_id: Uuid,
    request: UpdateProductRequest,
) -> Result<Product> {
    require_admin(actor)?;

    let mut uow = store.begin().await?;
    let mut product = brand_product(&mut *uow, brand_id, product_id).await?;
    if let Some(name) = request.name {
        product.name = required_text(&name, "name")?;
    }
    if let Some(price_cents) = request.price_cents {
        product.price_cents = positive_price(price_cents)?;
    }
    if let Some(state) = request.state {
        product.state = state;
    }
    product.description = request.description.or(product.description);

    let product = uow.save_product(&product).await?;
    uow.commit().await?;

    tracing::info!("Product updated");
    Ok(product)
}

#[tracing::instrument(skip(store, actor), fields(admin_id = %actor.id))]
pub async fn destroy_product(
    store: &dyn Store,
    actor: &User,
    brand_id: Uuid,
    product_id: Uuid,
) -> Result<()> {
    require_admin(actor)?;

    let mut uow = store.begin().await?;
    brand_product(&mut *uow, brand_id, product_id).await?;
    uow.soft_delete_product(product_id).await?;
    uow.commit().await?;

    tracing::info!("Product deleted");
    Ok(())
}

/// Lists products. Clients only ever see active ones.
pub async fn list_products(
    store: &dyn Store,
    actor: &User,
    query: ListQuery<ProductColumn>,
) -> Result<Page<Product>> {
    let query = if actor.role.can_review_cards() {
        query
    } else {
        query.scoped(ProductColumn::State, RecordState::Active.as_str())
    };
    let mut uow = store.begin().await?;
    uow.list_products(&query).await
}
