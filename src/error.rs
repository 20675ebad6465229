use actix_web::{HttpResponse, http::StatusCode};
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;

/// Field-keyed validation messages, e.g. `breaks.0.start_at`.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub fn push_field_error(errors: &mut FieldErrors, key: impl Into<String>, message: &str) {
    errors.entry(key.into()).or_default().push(message.to_string());
}

#[derive(Debug, Error)]
pub enum AppError {
    /// All submission problems reported together; nothing is written.
    #[error("validation failed")]
    Validation(FieldErrors),

    /// State conflicts: double punches, processed requests, duplicate
    /// pending corrections.
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl AppError {
    pub fn conflict(message: &str) -> Self {
        AppError::Conflict(message.to_string())
    }

    pub fn not_found(message: &str) -> Self {
        AppError::NotFound(message.to_string())
    }
}

impl actix_web::ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            AppError::Validation(errors) => HttpResponse::UnprocessableEntity().json(json!({
                "message": "validation failed",
                "errors": errors,
            })),
            AppError::Conflict(message) => HttpResponse::Conflict().json(json!({
                "message": message,
            })),
            AppError::NotFound(message) => HttpResponse::NotFound().json(json!({
                "message": message,
            })),
            AppError::Forbidden(message) => HttpResponse::Forbidden().json(json!({
                "message": message,
            })),
            AppError::Db(e) => {
                tracing::error!(error = %e, "database error");
                HttpResponse::InternalServerError().json(json!({
                    "message": "Internal Server Error",
                }))
            }
        }
    }
}
