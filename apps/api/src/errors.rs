use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::artifacts::StoreError;
use crate::conversion::ConversionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("Store write error: {0}")]
    StoreWrite(#[source] StoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conversion(_) => StatusCode::BAD_GATEWAY,
            AppError::Render(_) | AppError::StoreWrite(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match &self {
            AppError::InvalidInput(msg) => ("INVALID_INPUT", msg.clone()),
            AppError::NotFound(msg) => ("NOT_FOUND", msg.clone()),
            AppError::Render(msg) => {
                tracing::error!("Render error: {msg}");
                ("RENDER_ERROR", "Failed to generate HTML".to_string())
            }
            AppError::Conversion(e) => {
                tracing::error!("Conversion error: {e}");
                let message = match e {
                    ConversionError::Status { status, .. } => {
                        format!("Conversion service returned non-OK status: {status}")
                    }
                    ConversionError::Transport(_) => {
                        "Failed to reach the conversion service".to_string()
                    }
                };
                ("CONVERSION_ERROR", message)
            }
            AppError::StoreWrite(e) => {
                tracing::error!("Store write error: {e}");
                ("STORE_ERROR", "Failed to save the generated file".to_string())
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
