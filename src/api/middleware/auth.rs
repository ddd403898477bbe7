use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::session::{bearer_token, AppState};
use crate::error::AppError;
use crate::models::{user::User, user_session::UserSession};
use crate::services::accounts;

/// Extension type that holds the authenticated user and their session
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub session: UserSession,
}

/// Takes the token owned so the request is not borrowed across the lookup.
async fn authenticate(state: &AppState, token: Option<String>) -> Result<CurrentUser, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;
    let (session, user) = accounts::authenticate(state.store.as_ref(), &token).await?;
    Ok(CurrentUser { user, session })
}

fn request_token(request: &Request) -> Option<String> {
    bearer_token(request.headers()).map(str::to_owned)
}

/// Middleware that requires a valid session of any role
pub async fn require_session(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authenticate(&state, request_token(&request)).await?;
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Middleware that requires an admin session
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authenticate(&state, request_token(&request)).await?;
    if !current.user.role.can_review_cards() {
        tracing::warn!(user_id = %current.user.id, "Admin route refused");
        return Err(AppError::Forbidden);
    }
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}

/// Middleware that requires a client session
pub async fn require_client(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let current = authenticate(&state, request_token(&request)).await?;
    if !current.user.role.can_own_cards() {
        tracing::warn!(user_id = %current.user.id, "Client route refused");
        return Err(AppError::Forbidden);
    }
    request.extensions_mut().insert(current);
    Ok(next.run(request).await)
}
