use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;

use crate::api::extract_json;
use crate::api::middleware::{auth::CurrentUser, session::AppState};
use crate::api::views::SessionView;
use crate::error::AppError;
use crate::services::accounts::{self, ClientInfo};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    ClientInfo {
        ip: header_text("x-forwarded-for")
            .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
            .filter(|ip| !ip.is_empty()),
        user_agent: header_text(header::USER_AGENT.as_str()),
    }
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let body = extract_json(body)?;
    let (session, user) = accounts::login(
        state.store.as_ref(),
        &state.generator,
        &body.email,
        &body.password,
        client_info(&headers),
        state.password_hash_cost,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(SessionView::new(session, user))))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<StatusCode, AppError> {
    accounts::logout(state.store.as_ref(), current.session.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
