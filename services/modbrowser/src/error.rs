//! Error handling for the register browser service
//!
//! Connection failures are stored on the server status and never abort the
//! process; the variants below surface through the library API and the HTTP
//! layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use register_model::ModelError;
use thiserror::Error;

use crate::api::ErrorResponse;

/// Register browser error type
#[derive(Error, Debug, Clone)]
pub enum BrowserError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connection establishment and maintenance errors
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Modbus exception responses and transport errors
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Operation timeout errors
    #[error("Timeout error: {0}")]
    TimeoutError(String),

    /// Server directory errors (not found, exists)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Rejected register blocks and request values
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Serialization errors
    #[error("Data error: {0}")]
    DataError(String),

    /// Input/Output operation errors
    #[error("IO error: {0}")]
    IoError(String),
}

/// Result type alias for the register browser
pub type Result<T> = std::result::Result<T, BrowserError>;

impl BrowserError {
    pub fn config(msg: impl Into<String>) -> Self {
        BrowserError::ConfigError(msg.into())
    }

    pub fn connection(msg: impl Into<String>) -> Self {
        BrowserError::ConnectionError(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        BrowserError::ProtocolError(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        BrowserError::TimeoutError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        BrowserError::ValidationError(msg.into())
    }

    pub fn server_not_found(id: impl std::fmt::Display) -> Self {
        BrowserError::ServerError(format!("Server not found: {}", id))
    }

    pub fn server_exists(id: impl std::fmt::Display) -> Self {
        BrowserError::ServerError(format!("Server already exists: {}", id))
    }

    pub fn not_connected() -> Self {
        BrowserError::ConnectionError("not connected".to_string())
    }

    /// HTTP status used when the error crosses the API boundary
    pub fn http_status(&self) -> StatusCode {
        match self {
            BrowserError::ServerError(msg) if msg.contains("not found") => StatusCode::NOT_FOUND,
            BrowserError::ServerError(msg) if msg.contains("exists") => StatusCode::CONFLICT,
            BrowserError::ValidationError(_)
            | BrowserError::DataError(_)
            | BrowserError::ConfigError(_) => StatusCode::BAD_REQUEST,
            BrowserError::ConnectionError(_) | BrowserError::ProtocolError(_) => {
                StatusCode::BAD_GATEWAY
            }
            BrowserError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
            BrowserError::ServerError(_) | BrowserError::IoError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ModelError> for BrowserError {
    fn from(err: ModelError) -> Self {
        BrowserError::ValidationError(err.to_string())
    }
}

impl From<std::io::Error> for BrowserError {
    fn from(err: std::io::Error) -> Self {
        BrowserError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::DataError(format!("JSON: {err}"))
    }
}

impl From<figment::Error> for BrowserError {
    fn from(err: figment::Error) -> Self {
        BrowserError::ConfigError(err.to_string())
    }
}

impl IntoResponse for BrowserError {
    fn into_response(self) -> Response {
        let status = self.http_status();
        (status, Json(ErrorResponse::new(status, self.to_string()))).into_response()
    }
}
