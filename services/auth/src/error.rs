//! Error types for the authentication service
//!
//! User-facing failures are field-scoped ([`FieldError`]) and travel inside
//! [`AuthError::Invalid`]. Everything else is fatal for the request.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::CacheError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// A validation failure attributed to one named input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Transport or connectivity failure in one of the backing stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("credential store error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("malformed cached record: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Errors returned by the auth flows
#[derive(Error, Debug)]
pub enum AuthError {
    /// Input was rejected; returned to the caller as field errors
    #[error("invalid input: {0:?}")]
    Invalid(Vec<FieldError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl AuthError {
    /// Single-field rejection
    pub fn field_error(field: impl Into<String>, message: impl Into<String>) -> Self {
        AuthError::Invalid(vec![FieldError::new(field, message)])
    }

    /// Name of the first rejected field, if this is a validation failure
    pub fn field(&self) -> Option<&str> {
        match self {
            AuthError::Invalid(errors) => errors.first().map(|e| e.field.as_str()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Store(StoreError::Database(err))
    }
}

impl From<CacheError> for AuthError {
    fn from(err: CacheError) -> Self {
        AuthError::Store(StoreError::Cache(err))
    }
}

/// Type alias for auth results
pub type AuthResult<T> = Result<T, AuthError>;

/// Error surfaced by an HTTP handler
#[derive(Error, Debug)]
pub enum ApiError {
    /// Field errors outside a payload-or-errors envelope
    #[error("invalid input: {0:?}")]
    Invalid(Vec<FieldError>),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("password hashing failed: {0}")]
    Hash(String),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid(errors) => ApiError::Invalid(errors),
            AuthError::Store(e) => ApiError::Store(e),
            AuthError::Hash(msg) => ApiError::Hash(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Invalid(errors) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
            }
            fatal => {
                error!("Request failed: {}", fatal);
                let body = Json(json!({
                    "error": "Internal server error",
                }));
                (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
            }
        }
    }
}
