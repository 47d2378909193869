use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::io;

/// Errors raised by basket and registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BasketError {
    #[error("Basket with name '{0}' already exists")]
    DuplicateName(String),

    #[error("Invalid basket configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Basket(#[from] BasketError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Basket not found")]
    NotFound,

    #[error("Basket name is reserved: {0}")]
    ReservedName(String),

    #[error("Missing or invalid token")]
    Unauthorized,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::Basket(BasketError::DuplicateName(name)) => (
                StatusCode::CONFLICT,
                format!("Basket with name '{}' already exists", name),
            ),
            AppError::Basket(BasketError::InvalidConfig(reason)) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid basket configuration: {}", reason),
            ),
            AppError::Config(_) | AppError::ReqwestError(_) | AppError::IoError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error: {}", self),
            ),
            AppError::InvalidBody(reason) => (
                StatusCode::BAD_REQUEST,
                format!("Invalid request body: {}", reason),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "Basket not found".to_string()),
            AppError::ReservedName(name) => (
                StatusCode::FORBIDDEN,
                format!("Basket name is reserved: {}", name),
            ),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Missing or invalid token".to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "message": error_message,
                "type": format!("{:?}", self),
            }
        }));

        (status, body).into_response()
    }
}

