//! API error type rendered as `{"error": "<message>"}`

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::auth::AuthError;
use crate::llm::generation::GenerationError;
use crate::store::StoreError;
use crate::video_search::VideoSearchError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// API-level errors with HTTP status mapping
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// Generation failed; the message is already user-facing
    #[error("{0}")]
    Generation(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Log a generation failure and keep only its user-facing message
    pub fn generation(error: GenerationError, what: &str) -> Self {
        tracing::error!("Error generating {}: {}", what, error);
        ApiError::Generation(error.user_message(what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Generation(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Internal(detail) => {
                tracing::error!(%detail, "API internal error");
                "An internal error occurred".to_string()
            }
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::NotFound(m)
            | ApiError::Generation(m)
            | ApiError::Unavailable(m)
            | ApiError::RateLimited(m)
            | ApiError::BadGateway(m) => m,
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::UsernameTaken => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<VideoSearchError> for ApiError {
    fn from(err: VideoSearchError) -> Self {
        match err {
            VideoSearchError::EmptyQuery => ApiError::BadRequest(err.to_string()),
            VideoSearchError::NotConfigured => ApiError::Unavailable(err.to_string()),
            VideoSearchError::QuotaExceeded => ApiError::RateLimited(err.to_string()),
            other => {
                tracing::warn!("Video search failed: {}", other);
                ApiError::BadGateway("Video search failed. Please try again later.".to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
