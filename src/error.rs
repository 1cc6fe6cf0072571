use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Errors surfaced by the transcode session manager core.
///
/// Mirrors the error kinds named in the design: a session either starts
/// cleanly or fails for one of these reasons. `Cancelled` is deliberately
/// never constructed on the client-facing path — disconnects just close
/// the connection.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("source file not found")]
    NotFound,

    #[error("failed to start encoder: {0}")]
    StartError(String),
}

/// Top-level error type returned by HTTP handlers.
///
/// Centralizes the status-code mapping in one `IntoResponse` impl rather
/// than repeating `(StatusCode, String)` tuples at every call site.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            HttpError::Core(CoreError::NotFound) => (StatusCode::NOT_FOUND, self.to_string()),
            HttpError::Core(CoreError::StartError(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            HttpError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            HttpError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            HttpError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
        };

        (status, axum::Json(json!({ "error": message }))).into_response()
    }
}
