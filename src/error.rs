use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: max {0}MB allowed")]
    FileTooLarge(u64),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Listing failed: {0}")]
    Listing(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            AppError::Validation(msg) => {
                tracing::warn!("Validation error: {}", msg);
                (StatusCode::BAD_REQUEST, json!({ "error": msg }))
            }
            AppError::FileTooLarge(max) => {
                tracing::warn!("Rejected upload larger than {}MB", max);
                (
                    StatusCode::PAYLOAD_TOO_LARGE,
                    json!({ "error": format!("File too large: max {}MB allowed", max) }),
                )
            }
            AppError::Upload(msg) => {
                tracing::error!("Upload error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to process upload", "message": msg }),
                )
            }
            AppError::Listing(msg) => {
                tracing::error!("Error listing videos: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Failed to list videos", "message": msg }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        let cases = [
            (AppError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (AppError::FileTooLarge(100), StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Upload("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (AppError::Listing("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
