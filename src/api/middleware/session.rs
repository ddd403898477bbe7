use std::sync::Arc;

use axum::http::{header, HeaderMap};

use crate::db::Store;
use crate::services::code_generator::CodeGenerator;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub generator: Arc<CodeGenerator>,
    pub password_hash_cost: u32,
}

/// Extracts the session token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}
