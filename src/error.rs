use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::BookingStatus;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("authentication required")]
    AuthRequired,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("administrator access required")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("booking is already {from}, cannot become {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },
    #[error("favorite list is full ({limit} selections)")]
    QuotaExceeded { limit: i64 },
    #[error("{0}")]
    Validation(String),
    #[error("store failure: {0}")]
    Store(#[from] sqlx::Error),
    #[error("upload failure: {0}")]
    Upload(String),
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("template error: {0}")]
    Template(#[from] askama::Error),
    #[error("password hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed record: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::AuthRequired | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::InvalidTransition { .. } | AppError::QuotaExceeded { .. } => {
                StatusCode::CONFLICT
            }
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Upload(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!("{self}");
            match self {
                AppError::Upload(_) => "Upload failed".to_string(),
                _ => "Internal server error".to_string(),
            }
        } else {
            self.to_string()
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
