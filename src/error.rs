use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::response::{IntoResponse, Response};
use axum::{http::StatusCode, Json};
use serde_json::json;
use tracing::{error, warn};

use crate::service::TodoError;

#[derive(Debug)]
pub enum AppError {
    Decode(String),
    Validation(&'static str),
    InvalidIdentifier(String),
    NotFound,
    Timeout,
    Storage { message: &'static str, error: String },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, error) = match self {
            AppError::Decode(err) => (StatusCode::BAD_REQUEST, "could not decode data", err),
            AppError::Validation(err) => {
                (StatusCode::BAD_REQUEST, "please add a title", err.to_string())
            }
            AppError::InvalidIdentifier(err) => (StatusCode::BAD_REQUEST, "the id is invalid", err),
            AppError::NotFound => (
                StatusCode::NOT_FOUND,
                "Todo not found",
                "no todo matches the given id".to_string(),
            ),
            AppError::Timeout => (
                StatusCode::REQUEST_TIMEOUT,
                "request timed out",
                "the request did not complete in time".to_string(),
            ),
            AppError::Storage { message, error } => {
                (StatusCode::INTERNAL_SERVER_ERROR, message, error)
            }
        };

        if status.is_server_error() {
            error!(%status, reason = message, error = %error, "Request failed");
        } else {
            warn!(%status, reason = message, error = %error, "Rejected request");
        }

        (status, Json(json!({ "message": message, "error": error }))).into_response()
    }
}

impl From<TodoError> for AppError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::Validation(msg) => AppError::Validation(msg),
            TodoError::InvalidIdentifier(err) => AppError::InvalidIdentifier(err.to_string()),
            TodoError::NotFound => AppError::NotFound,
            TodoError::Storage { action, source } => AppError::Storage {
                message: action,
                error: source.to_string(),
            },
        }
    }
}

/// Gives the bare 408 produced by the timeout layer the usual JSON body.
pub async fn timeout_envelope<B>(response: axum::http::Response<B>) -> Response
where
    B: axum::body::HttpBody<Data = axum::body::Bytes> + Send + 'static,
    B::Error: Into<axum::BoxError>,
{
    if response.status() == StatusCode::REQUEST_TIMEOUT {
        return AppError::Timeout.into_response();
    }
    response.map(axum::body::Body::new)
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::InvalidIdentifier(rejection.body_text())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Decode(rejection.body_text())
    }
}
