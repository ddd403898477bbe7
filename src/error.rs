use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("{resource} in state {state} cannot be changed this way")]
    InvalidState { resource: &'static str, state: String },

    #[error("Activation code does not match")]
    InvalidActivationCode,

    #[error("Pin code does not match")]
    InvalidPinCode,

    #[error("{resource} with the same {field} already exists")]
    Duplicate {
        resource: &'static str,
        field: &'static str,
    },

    #[error("Could not generate a unique {field} after {attempts} attempts")]
    GenerationExhausted { field: &'static str, attempts: u32 },

    #[error("Missing required parameter: {0}")]
    ParameterMissing(&'static str),

    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter { name: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } => "not_found",
            AppError::InvalidState { .. } => "invalid_state",
            AppError::InvalidActivationCode => "invalid_code",
            AppError::InvalidPinCode => "invalid_pin",
            AppError::Duplicate { .. } => "duplicate",
            AppError::GenerationExhausted { .. } => "generation_exhausted",
            AppError::ParameterMissing(_) => "parameter_missing",
            AppError::InvalidParameter { .. } => "invalid_parameter",
            AppError::Validation(_) => "validation",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InvalidState { .. }
            | AppError::InvalidActivationCode
            | AppError::InvalidPinCode => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Duplicate { .. } => StatusCode::CONFLICT,
            AppError::GenerationExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::ParameterMissing(_)
            | AppError::InvalidParameter { .. }
            | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Maps named unique constraints from the migrations to the resource and
/// field they protect.
fn unique_constraint(constraint: &str) -> Option<(&'static str, &'static str)> {
    match constraint {
        "cards_activation_code_key" => Some(("card", "activation_code")),
        "cards_live_user_product_idx" => Some(("card", "product_id")),
        "accessible_products_user_product_key" => Some(("accessible_product", "product_id")),
        "user_sessions_session_token_key" => Some(("user_session", "session_token")),
        "users_email_idx" => Some(("user", "email")),
        "brands_name_idx" => Some(("brand", "name")),
        _ => None,
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                if let Some((resource, field)) = db_err.constraint().and_then(unique_constraint) {
                    return AppError::Duplicate { resource, field };
                }
            } else if db_err.is_foreign_key_violation() {
                return AppError::Validation(db_err.message().to_string());
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            AppError::Database(e) => tracing::error!(error = %e, "Database error"),
            AppError::Internal(e) => tracing::error!(error = ?e, "Internal error"),
            _ => {}
        }

        let message = match &self {
            AppError::Database(_) => "Database error".to_string(),
            other => other.to_string(),
        };

        let mut body = json!({
            "error": self.kind(),
            "message": message,
        });

        match &self {
            AppError::NotFound { resource } | AppError::InvalidState { resource, .. } => {
                body["resource"] = json!(resource);
            }
            AppError::Duplicate { resource, field } => {
                body["resource"] = json!(resource);
                body["field"] = json!(field);
            }
            AppError::GenerationExhausted { field, .. } | AppError::ParameterMissing(field) => {
                body["field"] = json!(field);
            }
            AppError::InvalidParameter { name, .. } => {
                body["field"] = json!(name);
            }
            AppError::InvalidActivationCode => body["field"] = json!("activation_code"),
            AppError::InvalidPinCode => body["field"] = json!("pin_code"),
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
