use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::serializer::ValidationError;

/// Generic `{"detail": ...}` body used for non-field errors.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody { pub detail: String }

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    UnsupportedMediaType(String),
    #[error("{0}")]
    NotFound(&'static str),
    /// Store or other unexpected failure. `detail` is only filled in debug mode.
    #[error("internal error")]
    Internal { detail: Option<String> },
}

impl ApiError {
    pub fn not_found() -> Self { Self::NotFound("Not found.") }

    pub fn invalid_page() -> Self { Self::NotFound("Invalid page.") }

    pub fn internal(error: anyhow::Error, debug: bool) -> Self {
        tracing::error!(error = ?error, "request failed");
        Self::Internal { detail: debug.then(|| format!("{error:#}")) }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(r) => Self::UnsupportedMediaType(r.body_text()),
            other => Self::BadRequest(other.body_text()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let detail = |detail: String| axum::Json(ApiErrorBody { detail });
        match self {
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, axum::Json(errors)).into_response(),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, detail(msg)).into_response(),
            Self::UnsupportedMediaType(msg) => (StatusCode::UNSUPPORTED_MEDIA_TYPE, detail(msg)).into_response(),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, detail(msg.to_string())).into_response(),
            Self::Internal { detail: d } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                detail(d.unwrap_or_else(|| "A server error occurred.".to_string())),
            )
                .into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses() {
        assert_eq!(ApiError::not_found().into_response().status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::BadRequest("x".into()).into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::from(ValidationError::default()).into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn internal_detail_only_in_debug() {
        let hidden = ApiError::internal(anyhow::anyhow!("disk I/O error at /var/db"), false);
        assert!(matches!(hidden, ApiError::Internal { detail: None }));
        let shown = ApiError::internal(anyhow::anyhow!("disk I/O error"), true);
        assert!(matches!(shown, ApiError::Internal { detail: Some(ref d) } if d.contains("disk I/O")));
        assert_eq!(shown.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
