use crate::config::ConfigError;
use crate::store::StoreError;
use crate::types::ApiResponse;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

/// An error on its way out to an HTTP client.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized")
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// Log `err` and answer with a generic 500 carrying only `message`.
    pub fn internal(message: &str, err: impl std::error::Error) -> Self {
        error!(error=%err, "{message}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Like `internal`, but the client also sees the error text.
    pub fn internal_with_detail(message: &str, err: impl std::error::Error) -> Self {
        let detail = err.to_string();
        let mut app_error = Self::internal(message, err);
        app_error.detail = Some(detail);
        app_error
    }

    /// Conflicts surface as 409; anything else is a logged 500.
    pub fn from_store(message: &str, err: StoreError) -> Self {
        match err {
            StoreError::Conflict(reason) => Self::new(StatusCode::CONFLICT, reason),
            other => Self::internal(message, other),
        }
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()>::failure(self.message, self.detail);
        (self.status, Json(body)).into_response()
    }
}

/// Anything that stops the service from coming up.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to build provider client: {0}")]
    Provider(#[from] reqwest::Error),
    #[error("failed to install tracing subscriber: {0}")]
    Tracing(#[from] tracing::subscriber::SetGlobalDefaultError),
    #[error("http server error: {0}")]
    Serve(#[from] hyper::Error),
}
