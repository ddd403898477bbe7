// API module - HTTP endpoints

pub mod admin;
pub mod client;
pub mod health;
pub mod middleware;
pub mod sessions;
pub mod views;

use axum::{
    extract::rejection::JsonRejection,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Json, Router,
};

use crate::error::AppError;
use middleware::{
    auth::{require_admin, require_client, require_session},
    session::AppState,
};

/// Unwraps a JSON body, reporting malformed input in the API's error format
pub(crate) fn extract_json<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Builds the full application router
pub fn router(state: AppState) -> Router {
    let admin = admin::router().route_layer(from_fn_with_state(state.clone(), require_admin));
    let client = client::router().route_layer(from_fn_with_state(state.clone(), require_client));
    let logout = Router::new()
        .route("/logout", delete(sessions::logout))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    let api = Router::new()
        .route("/login", post(sessions::login))
        .merge(logout)
        .nest("/admin", admin)
        .nest("/client", client);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1", api)
        .with_state(state)
}
