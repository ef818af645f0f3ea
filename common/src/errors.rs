//! Application error types.
//!
//! Every failure a handler can produce ends up here and is turned into a
//! fixed status code with a generic `{"error": "..."}` body. Driver messages
//! and panic payloads are logged server-side and never sent to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::response::ErrorBody;

/// Client-facing message for a missing or empty `AccountNumber`.
pub const MSG_MISSING_ACCOUNT_NUMBER: &str = "Missing AccountNumber parameter";
/// Client-facing message for any database failure.
pub const MSG_DATABASE_ERROR: &str = "Database connection error";
/// Client-facing message for an empty result.
pub const MSG_NO_TRANSACTIONS: &str = "No transactions found";
/// Client-facing message for unexpected failures.
pub const MSG_INTERNAL_ERROR: &str = "An internal error occurred";

/// Result alias used across the workspace.
pub type AppResult<T> = Result<T, AppError>;

/// Application error taxonomy.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required request parameter is missing or empty.
    #[error("validation error: {0}")]
    Validation(String),

    /// Opening a database connection failed.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// The database rejected or failed a statement.
    #[error("database query error: {0}")]
    DatabaseQuery(String),

    /// The request was valid but produced nothing to return.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything else.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::DatabaseConnection(_)
            | AppError::DatabaseQuery(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the client.
    pub fn client_message(&self) -> String {
        match self {
            AppError::Validation(msg) | AppError::NotFound(msg) => msg.clone(),
            AppError::DatabaseConnection(_) | AppError::DatabaseQuery(_) => {
                MSG_DATABASE_ERROR.to_string()
            }
            AppError::Internal(_) => MSG_INTERNAL_ERROR.to_string(),
        }
    }

    /// Whether this error belongs to the database family.
    pub fn is_database_error(&self) -> bool {
        matches!(
            self,
            AppError::DatabaseConnection(_) | AppError::DatabaseQuery(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        (status, Json(ErrorBody::new(self.client_message()))).into_response()
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Internal(format!("serialization failed: {}", err))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(format!("{:#}", err))
    }
}
