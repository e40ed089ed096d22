use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cueplay_core::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::Core(CoreError::InvalidSeek { .. }) => {
                StatusCode::BAD_REQUEST
            }
            Self::Core(CoreError::FileNotFound { .. } | CoreError::TrackNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::Core(CoreError::PathOutsideLibrary { .. }) => StatusCode::FORBIDDEN,
            Self::Core(
                CoreError::MalformedSheet { .. }
                | CoreError::NoTracks { .. }
                | CoreError::TrackHasNoFile { .. },
            ) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Core(CoreError::NoActiveMedia) => StatusCode::CONFLICT,
            Self::Core(CoreError::EngineFailure(_)) => StatusCode::BAD_GATEWAY,
            Self::Core(_) | Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            warn!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
