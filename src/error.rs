use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Every failure a handler can report. Each variant maps to one HTTP status
/// and one stable `error` key in the JSON body.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Too many code generations, try again later")]
    RateLimited,

    #[error("Could not find a free code")]
    GenerationExhausted,

    #[error("{0} has expired")]
    Expired(String),

    #[error("Invitation has already been accepted")]
    AlreadyAccepted,

    #[error("Invitation was issued for a different email address")]
    EmailMismatch,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Expired(_) | Self::AlreadyAccepted => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) | Self::EmailMismatch => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::GenerationExhausted | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::RateLimited => "rate_limited",
            Self::GenerationExhausted => "generation_exhausted",
            Self::Expired(_) => "expired",
            Self::AlreadyAccepted => "already_accepted",
            Self::EmailMismatch => "email_mismatch",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Database(e) => {
                tracing::error!("database error: {e}");
                "Internal server error".to_string()
            }
            Self::Internal(e) => {
                tracing::error!("internal error: {e}");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "error": self.kind(), "message": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::RateLimited.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(AppError::EmailMismatch.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::AlreadyAccepted.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Expired("Invitation".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let res = AppError::Internal("connection reset by peer".into()).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_kind_keys() {
        assert_eq!(AppError::GenerationExhausted.kind(), "generation_exhausted");
        assert_eq!(AppError::Expired("Code".into()).to_string(), "Code has expired");
        assert_eq!(AppError::Database(sqlx::Error::RowNotFound).kind(), "internal_error");
    }
}
