use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::ContentError;
use crate::game::GameError;

#[derive(Debug, Error)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    InternalServerError(String),
    #[error("Service unavailable: {0}")]
    Unavailable(String),
}

impl From<GameError> for WebError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::NotFound(msg) => WebError::NotFound(msg),
            GameError::WrongPhase { .. } | GameError::Validation(_) | GameError::UnknownTheme(_) => {
                WebError::BadRequest(err.to_string())
            }
            GameError::WordSource(msg) => WebError::Unavailable(msg),
            GameError::Storage(source) => {
                tracing::error!(error = %source, "Storage failure");
                WebError::InternalServerError("Storage failure".to_string())
            }
        }
    }
}

impl From<ContentError> for WebError {
    fn from(err: ContentError) -> Self {
        tracing::error!(error = %err, "Word source failure");
        WebError::Unavailable(err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WebError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            WebError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = Json(json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T, E = WebError> = std::result::Result<T, E>;
