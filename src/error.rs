//! Application error taxonomy and its HTTP mapping.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;
use sea_orm::DbErr;
use serde::Serialize;

/// Every failure a route can surface to a client.
///
/// Variants map one-to-one onto the categories clients act on: sign in again,
/// "not yours", "doesn't exist", fix the input, a business rule refused the
/// change, or retry later.
#[derive(Debug, Display)]
pub enum AppError {
    /// No valid session.
    #[display(fmt = "{}", _0)]
    Unauthenticated(String),
    /// Authenticated, but not allowed.
    #[display(fmt = "{}", _0)]
    Forbidden(String),
    #[display(fmt = "{}", _0)]
    NotFound(String),
    /// Malformed input, rejected before any business logic ran.
    #[display(fmt = "{}", _0)]
    Validation(String),
    /// A business rule rejected the operation. Nothing was persisted.
    #[display(fmt = "{}", _0)]
    InvariantViolation(String),
    /// Details are logged, never sent to the client.
    #[display(fmt = "Something went wrong. Please try again.")]
    Internal(String),
}

impl std::error::Error for AppError {}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl AppError {
    pub fn unauthenticated() -> Self {
        AppError::Unauthenticated("Login required".to_owned())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        AppError::InvariantViolation(msg.into())
    }

    /// Stable machine-readable code for the error category.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvariantViolation(_) => "CONFLICT",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvariantViolation(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.code(),
            message: self.to_string(),
        })
    }
}

impl From<DbErr> for AppError {
    fn from(err: DbErr) -> Self {
        log::error!("Database error: {}", err);
        AppError::Internal(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_error_hides_details() {
        let err = AppError::Internal("relation \"users\" does not exist".to_owned());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.to_string().contains("users"));
    }

    #[test]
    fn test_authz_and_not_found_are_distinct() {
        let forbidden = AppError::forbidden("not yours");
        let missing = AppError::not_found("no such post");
        assert_ne!(forbidden.status_code(), missing.status_code());
        assert_ne!(forbidden.code(), missing.code());
    }

    #[test]
    fn test_invariant_violation_is_conflict() {
        let err = AppError::invariant("Insufficient karma for operation");
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "Insufficient karma for operation");
    }
}
