use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lectern_core::{
    ANSWER_FAILED, BackendUnavailableError, CoreError, InvalidInputError, NotFoundError,
};
use lectern_epub::DocumentParseError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("failed to bind {0}: {1}")]
    Bind(String, std::io::Error),
    #[error("server error: {0}")]
    Server(String),
}

/// Failure of a single request, rendered as `{"error": ...}`.
#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error(transparent)]
    InvalidInput(#[from] InvalidInputError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error(transparent)]
    Document(#[from] DocumentParseError),
    #[error(transparent)]
    Backend(#[from] BackendUnavailableError),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error("failed to store upload: {0}")]
    Storage(std::io::Error),
    #[error("{0}")]
    Internal(String),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(e) => Self::InvalidInput(e),
            CoreError::NotFound(e) => Self::NotFound(e),
            CoreError::BackendUnavailable(e) => Self::Backend(e),
            CoreError::Document(e) => Self::Document(e),
            CoreError::Exchange(e) => Self::Internal(e.to_string()),
        }
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Document(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Multipart(e) => e.status(),
            Self::Backend(_) | Self::Storage(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(e) => e.to_string(),
            Self::NotFound(e) => e.to_string(),
            Self::Document(_) => "Could not read EPUB file".into(),
            Self::Backend(_) => ANSWER_FAILED.into(),
            Self::Multipart(e) => e.body_text(),
            Self::Storage(_) => "Failed to store upload".into(),
            Self::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::warn!(%status, error = %self, "request rejected");
        }
        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}
