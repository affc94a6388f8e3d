//! Crate-level error type and its HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::models::{error_codes, ApiError};
use crate::gemini::GeminiError;
use crate::image::ImageError;
use crate::session::SessionError;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    Validation(String),

    #[error("Session ID not found.")]
    NotFound(String),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Upstream(#[from] GeminiError),
}

impl From<SessionError> for RelayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => Self::NotFound(id),
        }
    }
}

impl RelayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Image(ImageError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Image(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(GeminiError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            Self::Upstream(GeminiError::Io(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION_ERROR,
            Self::NotFound(_) => error_codes::NOT_FOUND,
            Self::Image(ImageError::Io(_)) => error_codes::INTERNAL_ERROR,
            Self::Image(_) => error_codes::IMAGE_ERROR,
            Self::Upstream(GeminiError::Timeout(_)) => error_codes::TIMEOUT,
            Self::Upstream(GeminiError::Io(_)) => error_codes::INTERNAL_ERROR,
            Self::Upstream(_) => error_codes::UPSTREAM_ERROR,
        }
    }

    /// Message safe to return to clients; upstream and internal details
    /// stay in the logs
    pub fn public_message(&self) -> String {
        match self {
            Self::Upstream(GeminiError::Timeout(_)) => {
                "The model provider did not respond in time.".to_string()
            }
            Self::Upstream(GeminiError::Io(_))
            | Self::Image(ImageError::Io(_)) => "Internal server error.".to_string(),
            Self::Upstream(_) => "The model provider request failed.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn into_api_error(self) -> (StatusCode, Json<ApiError>) {
        (
            self.status(),
            Json(ApiError::new(self.code(), self.public_message())),
        )
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        self.into_api_error().into_response()
    }
}
