use axum::http::StatusCode;
use axum::response::IntoResponse;
use thiserror::Error;

/// API-facing errors. Snapshot loading is best-effort (missing or broken
/// files are skipped), so requests fail only on bad parameters or when
/// there is nothing to show.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    NoData(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            AppError::NoData(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
        }
    }
}
