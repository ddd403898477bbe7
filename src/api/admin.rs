//! Back-office endpoints. Every route requires an admin session.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract_json;
use crate::api::middleware::{auth::CurrentUser, session::AppState};
use crate::api::views::CardView;
use crate::db::query::{ListQuery, Page};
use crate::error::AppError;
use crate::models::{
    accessible_product::AccessibleProduct, brand::Brand, brand::CreateBrandData,
    product::Product, user::Role, user::User, RecordState,
};
use crate::services::{
    accounts::{self, CreateUserRequest},
    card_lifecycle, catalog,
    catalog::{CreateProductRequest, UpdateBrandRequest, UpdateProductRequest},
    entitlements,
};

#[derive(Debug, Deserialize)]
pub struct CreateUserBody {
    pub name: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
pub struct CreateBrandBody {
    pub name: String,
    pub description: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateBrandBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub country: Option<String>,
    pub website_url: Option<String>,
    pub state: Option<RecordState>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProductBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub state: Option<RecordState>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductBody {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub state: Option<RecordState>,
}

async fn create_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<CreateUserBody>, JsonRejection>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let body = extract_json(body)?;
    let user = accounts::create_user(
        state.store.as_ref(),
        &current.user,
        CreateUserRequest {
            name: body.name,
            email: body.email,
            password: body.password,
            role: body.role,
        },
        state.password_hash_cost,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<User>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page = accounts::list_users(state.store.as_ref(), &current.user, query).await?;
    Ok(Json(page))
}

async fn show_user(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<User>, AppError> {
    let user = accounts::get_user(state.store.as_ref(), &current.user, user_id).await?;
    Ok(Json(user))
}

async fn list_brands(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Brand>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page = catalog::list_brands(state.store.as_ref(), &current.user, query).await?;
    Ok(Json(page))
}

async fn show_brand(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(brand_id): Path<Uuid>,
) -> Result<Json<Brand>, AppError> {
    let brand = catalog::get_brand(state.store.as_ref(), &current.user, brand_id).await?;
    Ok(Json(brand))
}

async fn update_brand(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(brand_id): Path<Uuid>,
    body: Result<Json<UpdateBrandBody>, JsonRejection>,
) -> Result<Json<Brand>, AppError> {
    let body = extract_json(body)?;
    let brand = catalog::update_brand(
        state.store.as_ref(),
        &current.user,
        brand_id,
        UpdateBrandRequest {
            name: body.name,
            description: body.description,
            country: body.country,
            website_url: body.website_url,
            state: body.state,
        },
    )
    .await?;
    Ok(Json(brand))
}

async fn destroy_brand(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(brand_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    catalog::destroy_brand(state.store.as_ref(), &current.user, brand_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_brand(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<CreateBrandBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Brand>), AppError> {
    let body = extract_json(body)?;
    let brand = catalog::create_brand(
        state.store.as_ref(),
        &current.user,
        CreateBrandData {
            name: body.name,
            description: body.description,
            country: body.country,
            website_url: body.website_url,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(brand)))
}

async fn create_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(brand_id): Path<Uuid>,
    body: Result<Json<CreateProductBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let body = extract_json(body)?;
    let product = catalog::create_product(
        state.store.as_ref(),
        &current.user,
        brand_id,
        CreateProductRequest {
            name: body.name,
            description: body.description,
            price_cents: body.price_cents,
            state: body.state,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(product)))
}

async fn list_brand_products(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(brand_id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Product>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page =
        catalog::list_brand_products(state.store.as_ref(), &current.user, brand_id, query).await?;
    Ok(Json(page))
}

async fn show_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((brand_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Product>, AppError> {
    let product =
        catalog::get_product(state.store.as_ref(), &current.user, brand_id, product_id).await?;
    Ok(Json(product))
}

async fn update_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((brand_id, product_id)): Path<(Uuid, Uuid)>,
    body: Result<Json<UpdateProductBody>, JsonRejection>,
) -> Result<Json<Product>, AppError> {
    let body = extract_json(body)?;
    let product = catalog::update_product(
        state.store.as_ref(),
        &current.user,
        brand_id,
        product_id,
        UpdateProductRequest {
            name: body.name,
            description: body.description,
            price_cents: body.price_cents,
            state: body.state,
        },
    )
    .await?;
    Ok(Json(product))
}

async fn destroy_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path((brand_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    catalog::destroy_product(state.store.as_ref(), &current.user, brand_id, product_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_products(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<Product>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page = catalog::list_products(state.store.as_ref(), &current.user, query).await?;
    Ok(Json(page))
}

async fn list_cards(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<CardView>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page = card_lifecycle::list_cards(state.store.as_ref(), &current.user, query).await?;
    Ok(Json(page.map(CardView::from)))
}

async fn approve_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<CardView>, AppError> {
    let card = card_lifecycle::approve_card(
        state.store.as_ref(),
        &state.generator,
        &current.user,
        card_id,
    )
    .await?;
    Ok(Json(card.into()))
}

async fn reject_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<CardView>, AppError> {
    let card = card_lifecycle::reject_card(state.store.as_ref(), &current.user, card_id).await?;
    Ok(Json(card.into()))
}

async fn list_accessible_products(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Page<AccessibleProduct>>, AppError> {
    let query = ListQuery::from_params(&params)?;
    let page =
        entitlements::list_accessible_products(state.store.as_ref(), &current.user, query).await?;
    Ok(Json(page))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(show_user))
        .route("/brands", get(list_brands).post(create_brand))
        .route(
            "/brands/:brand_id",
            get(show_brand).patch(update_brand).delete(destroy_brand),
        )
        .route(
            "/brands/:brand_id/products",
            get(list_brand_products).post(create_product),
        )
        .route(
            "/brands/:brand_id/products/:id",
            get(show_product).patch(update_product).delete(destroy_product),
        )
        .route("/products", get(list_products))
        .route("/cards", get(list_cards))
        .route("/cards/:id/approved", patch(approve_card))
        .route("/cards/:id/rejected", patch(reject_card))
        .route("/accessible_products", get(list_accessible_products))
}
