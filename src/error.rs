//! Domain-specific error types for change-metis

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Main error type for the change-metis service.
///
/// Narrative generation problems never show up here: the orchestrator recovers
/// them locally by falling back to templates. What remains is caller contract
/// violations and boundary plumbing.
#[derive(Error, Debug)]
pub enum ChangeMetisError {
    #[error("Invalid input: missing required field '{field}'")]
    InvalidInput { field: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Request cancelled before the strategy was generated")]
    Cancelled,

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("HTTP error: {message}")]
    Http { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ChangeMetisError {
    pub fn missing(field: &str) -> Self {
        ChangeMetisError::InvalidInput {
            field: field.to_string(),
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ChangeMetisError::InvalidInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ChangeMetisError::Serialization { .. } => StatusCode::BAD_REQUEST,
            ChangeMetisError::Http { .. } => StatusCode::BAD_GATEWAY,
            // 499 is nginx's "client closed request"; nobody is usually listening
            ChangeMetisError::Cancelled => {
                StatusCode::from_u16(499).unwrap_or(StatusCode::REQUEST_TIMEOUT)
            }
            ChangeMetisError::Config { .. } | ChangeMetisError::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ChangeMetisError::InvalidInput { .. } => "invalid_input",
            ChangeMetisError::Config { .. } => "config",
            ChangeMetisError::Cancelled => "cancelled",
            ChangeMetisError::Serialization { .. } => "serialization",
            ChangeMetisError::Http { .. } => "http",
            ChangeMetisError::Internal { .. } => "internal",
        }
    }
}

impl From<anyhow::Error> for ChangeMetisError {
    fn from(err: anyhow::Error) -> Self {
        ChangeMetisError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ChangeMetisError {
    fn from(err: serde_json::Error) -> Self {
        ChangeMetisError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ChangeMetisError {
    fn from(err: reqwest::Error) -> Self {
        ChangeMetisError::Http {
            message: format!("HTTP request failed: {}", err),
        }
    }
}

impl From<std::io::Error> for ChangeMetisError {
    fn from(err: std::io::Error) -> Self {
        ChangeMetisError::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<toml::de::Error> for ChangeMetisError {
    fn from(err: toml::de::Error) -> Self {
        ChangeMetisError::Config {
            message: err.to_string(),
        }
    }
}

/// Convert ChangeMetisError to an HTTP error response
impl IntoResponse for ChangeMetisError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        });
        if let ChangeMetisError::InvalidInput { field } = &self {
            body["error"]["field"] = json!(field);
        }
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        (status, axum::Json(body)).into_response()
    }
}

/// Result type alias for change-metis operations
pub type Result<T> = std::result::Result<T, ChangeMetisError>;
