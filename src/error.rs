// src/error.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::generation::GenerationError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("login required")]
    Unauthorized,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("invalid payments secret")]
    InvalidSecret,

    #[error("{0}")]
    Forbidden(String),

    #[error("not enough credits: required={required} available={available}")]
    NeedCredits { required: i64, available: i64 },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("payments are disabled")]
    PaymentsDisabled,

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials | ApiError::InvalidSecret => {
                StatusCode::UNAUTHORIZED
            },
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NeedCredits { .. } => StatusCode::PAYMENT_REQUIRED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PaymentsDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Generation(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::BadRequest(reason) | ApiError::Forbidden(reason) => json!({ "error": reason }),
            ApiError::Validation(errors) => json!({ "errors": errors }),
            ApiError::Unauthorized => json!({ "error": "Login required" }),
            ApiError::InvalidCredentials => json!({ "error": "Invalid credentials" }),
            ApiError::InvalidSecret => json!({ "error": "Invalid payments secret" }),
            ApiError::NeedCredits { required, available } => json!({
                "error": "Not enough credits",
                "need_credits": true,
                "required": required,
                "available": available,
            }),
            ApiError::NotFound(what) => json!({ "error": format!("{what} not found") }),
            ApiError::RateLimited => json!({ "error": "Too many requests, try again in a minute" }),
            ApiError::PaymentsDisabled => json!({ "error": "Payments are disabled" }),
            ApiError::Generation(detail) => json!({ "error": "Generation failed", "detail": detail }),
            ApiError::Upstream(detail) => json!({ "error": "Upstream service error", "detail": detail }),
            ApiError::Internal(_) => json!({ "error": "Internal server error" }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(value: sqlx::Error) -> Self {
        log::error!("db error: {value}");
        ApiError::Internal(value.to_string())
    }
}

impl From<GenerationError> for ApiError {
    fn from(value: GenerationError) -> Self {
        match value {
            GenerationError::InvalidRequest(reason) => ApiError::BadRequest(reason),
            other => {
                log::error!("generation error: {other}");
                ApiError::Generation(other.to_string())
            }
        }
    }
}
