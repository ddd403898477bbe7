//! Card holder endpoints. Every route requires a client session and only
//! reaches the caller's own records.

use std::collections::HashMap;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::api::extract_json;
use crate::api::middleware::{auth::CurrentUser, session::AppState};
use crate::api::views::CardView;
use crate::db::query::{ListQuery, Page};
use crate::error::AppError;
use crate::models::{accessible_product::AccessibleProduct, product::Product};
use crate::services::{
    card_lifecycle::{self, CreateCardRequest, UpdateCardRequest},
    catalog, entitlements,
    redemption::{self, RedeemRequest},
};

#[derive(Debug, Deserialize)]
pub struct CreateCardBody {
    pub product_id: Uuid,
    pub pin_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCardBody {
    pub product_id: Option<Uuid>,
    pub pin_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemBody {
    pub activation_code: Option<String>,
    pub pin_code: Option<String>,
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

async fn create_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    body: Result<Json<CreateCardBody>, JsonRejection>,
) -> Result<(StatusCode, Json<CardView>), AppError> {
    let body = extract_json(body)?;
    let card = card_lifecycle::create_card(
        state.store.as_ref(),
        &current.user,
        CreateCardRequest {
            product_id: body.product_id,
            pin_code: body.pin_code,
        },
    )
    .await?;
    Ok((StatusCode::CREATED, Json(card.into())))
}

async fn show_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<CardView>, AppError> {
    let card = card_lifecycle::get_card(state.store.as_ref(), &current.user, card_id).await?;
    Ok(Json(card.into()))
}

async fn update_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
    body: Result<Json<UpdateCardBody>, JsonRejection>,
) -> Result<Json<CardView>, AppError> {
    let body = extract_json(body)?;
    let card = card_lifecycle::update_card(
        state.store.as_ref(),
        &current.user,
        card_id,
        UpdateCardRequest {
            product_id: body.product_id,
            pin_code: body.pin_code,
        },
    )
    .await?;
    Ok(Json(card.into()))
}

async fn destroy_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    card_lifecycle::destroy_card(state.store.as_ref(), &current.user, card_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reject_card(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
) -> Result<Json<CardView>, AppError> {
    let card = card_lifecycle::reject_card(state.store.as_ref(), &current.user, card_id).await?;
    Ok(Json(card.into()))
}

async fn activate_accessible_product(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(card_id): Path<Uuid>,
    body: Result<Json<RedeemBody>, JsonRejection>,
) -> Result<Json<AccessibleProduct>, AppError> {
    let body = extract_json(body)?;
    let entitlement = redemption::redeem(
        state.store.as_ref(),
        &current.user,
        card_id,
        RedeemRequest {
            activation_code: body.activation_code,
            pin_code: body.pin_code,
        },
    )
    .await?;
    Ok(Json(entitlement))
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
        .route("/cards", get(list_cards).post(create_card))
        .route(
            "/cards/:id",
            get(show_card).patch(update_card).delete(destroy_card),
        )
        .route("/cards/:id/rejected", patch(reject_card))
        .route(
            "/cards/:id/activate_accessible_product",
            patch(activate_accessible_product),
        )
        .route("/products", get(list_products))
        .route("/accessible_products", get(list_accessible_products))
}
