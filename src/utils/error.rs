use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;
use crate::utils::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(ValidationErrors),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Registrations are closed")]
    RegistrationsClosed,

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Internal server error")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::RegistrationsClosed => StatusCode::CONFLICT,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Auth(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::RegistrationsClosed => "REGISTRATIONS_CLOSED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Gateway(_) => "PAYMENT_GATEWAY_ERROR",
            AppError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Validation(errors) => {
                error!(?errors, "Validation rejected request");
            }
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Internal(msg) => {
                error!(error = ?self, message = %msg, "Application error");
            }
            AppError::RegistrationsClosed => {
                error!("Registration attempt against a closed window");
            }
            AppError::Database(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::Gateway(msg) => {
                error!(message = %msg, "Payment gateway error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client; gateway and
        // database internals stay in the logs.
        let public_message = match &self {
            AppError::Auth(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::Validation(_) => "Some fields are invalid".to_string(),
            AppError::RegistrationsClosed => "Registrations are closed".to_string(),
            AppError::Gateway(_) => {
                "The payment service could not be reached, please try again".to_string()
            }
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Internal(_) => "An internal error occurred".to_string(),
        };

        // Validation errors are the only variant carrying structured details
        let details = match &self {
            AppError::Validation(errors) => serde_json::to_value(errors).ok(),
            _ => None,
        };

        error_response(code, public_message, details, status)
    }
}
