use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application error types
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed address or CIDR text; rejects the whitelist mutation
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    /// Caller's address is not on the whitelist; terminal per request
    #[error("Not whitelisted: {0}")]
    NotWhitelisted(String),
    /// File open/read/write failure
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid configuration at startup; fatal
    #[error("Configuration error: {0}")]
    Config(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidFormat(_) => StatusCode::BAD_REQUEST,
            Self::NotWhitelisted(_) => StatusCode::FORBIDDEN,
            Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": {
                "message": self.to_string(),
                "type": error_type_name(&self),
            }
        }));

        (status, body).into_response()
    }
}

fn error_type_name(error: &AppError) -> &'static str {
    match error {
        AppError::InvalidFormat(_) => "invalid_format",
        AppError::NotWhitelisted(_) => "not_whitelisted",
        AppError::Io(_) => "io_failure",
        AppError::Config(_) => "config_error",
    }
}
