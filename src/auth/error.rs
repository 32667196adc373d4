// Authentication and authorization error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::auth::models::Role;
use crate::error::ErrorResponse;

/// Authentication, OTP and authorization failures
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    // Registration / reset flow
    #[error("{field} is already in use")]
    Conflict { field: &'static str },
    #[error("Password must be at least 8 characters and contain an uppercase letter or a special character")]
    WeakPassword,
    #[error("Phone number must be exactly 10 digits and start with 0")]
    InvalidPhone,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("{0} not found")]
    NotFound(String),
    #[error("OTP code has expired")]
    OtpExpired,
    #[error("OTP code is incorrect")]
    OtpMismatch,
    #[error("{0}")]
    BadRequest(String),
    #[error("Request validation failed")]
    ValidationError(#[from] validator::ValidationErrors),

    // Tokens
    #[error("Missing authentication token")]
    MissingToken,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token has expired")]
    ExpiredToken,

    // Authorization
    #[error("Insufficient permissions: required role '{required}', but user has role '{actual}'")]
    InsufficientPermissions { required: Role, actual: Role },
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // Collaborator faults
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Pending state store error: {0}")]
    StoreError(String),
    #[error("Password hashing error")]
    PasswordHashError,
    #[error("Token generation error: {0}")]
    TokenGenerationError(String),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::DatabaseError(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, body) = self.to_error_response();
        (status, Json(body)).into_response()
    }
}

impl AuthError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Conflict { .. } => StatusCode::CONFLICT,
            AuthError::WeakPassword => StatusCode::BAD_REQUEST,
            AuthError::InvalidPhone => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AuthError::NotFound(_) => StatusCode::NOT_FOUND,
            AuthError::OtpExpired => StatusCode::BAD_REQUEST,
            AuthError::OtpMismatch => StatusCode::BAD_REQUEST,
            AuthError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::ExpiredToken => StatusCode::UNAUTHORIZED,
            AuthError::InsufficientPermissions { .. } => StatusCode::FORBIDDEN,
            AuthError::Forbidden(_) => StatusCode::FORBIDDEN,
            AuthError::EmailDelivery(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::StoreError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::PasswordHashError => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::TokenGenerationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable code for the response body
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::Conflict { .. } => "CONFLICT",
            AuthError::WeakPassword => "WEAK_PASSWORD",
            AuthError::InvalidPhone => "INVALID_PHONE",
            AuthError::InvalidCredentials => "INVALID_CREDENTIALS",
            AuthError::NotFound(_) => "NOT_FOUND",
            AuthError::OtpExpired => "OTP_EXPIRED",
            AuthError::OtpMismatch => "OTP_MISMATCH",
            AuthError::BadRequest(_) => "BAD_REQUEST",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::ExpiredToken => "EXPIRED_TOKEN",
            AuthError::InsufficientPermissions { .. } => "FORBIDDEN",
            AuthError::Forbidden(_) => "FORBIDDEN",
            AuthError::EmailDelivery(_) => "EMAIL_UNAVAILABLE",
            AuthError::DatabaseError(_) => "DATABASE_ERROR",
            AuthError::StoreError(_) => "INTERNAL_ERROR",
            AuthError::PasswordHashError => "INTERNAL_ERROR",
            AuthError::TokenGenerationError(_) => "INTERNAL_ERROR",
        }
    }

    /// Message that is safe to send to clients (no internal details)
    pub fn error_message(&self) -> String {
        match self {
            AuthError::InsufficientPermissions { required, .. } => {
                format!("Insufficient permissions: required role '{}'", required)
            }
            AuthError::EmailDelivery(_) => {
                "Could not send the verification email, please try again later".to_string()
            }
            AuthError::DatabaseError(_)
            | AuthError::StoreError(_)
            | AuthError::PasswordHashError
            | AuthError::TokenGenerationError(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }

    pub(crate) fn to_error_response(&self) -> (StatusCode, ErrorResponse) {
        match self {
            AuthError::InvalidToken | AuthError::ExpiredToken | AuthError::MissingToken => {
                warn!("Rejected bearer token: {}", self);
            }
            AuthError::InsufficientPermissions { required, actual } => {
                warn!(
                    "Authorization failed: required role '{}', user has role '{}'",
                    required, actual
                );
            }
            AuthError::EmailDelivery(msg) => error!("Email delivery failed: {}", msg),
            AuthError::DatabaseError(msg) => error!("Database error in auth: {}", msg),
            AuthError::StoreError(msg) => error!("Pending OTP store error: {}", msg),
            AuthError::PasswordHashError => error!("Password hashing error"),
            AuthError::TokenGenerationError(msg) => error!("Token generation error: {}", msg),
            _ => {}
        }

        let mut body = ErrorResponse::new(self.error_code(), self.error_message());
        if let AuthError::ValidationError(errors) = self {
            body = body.with_details(serde_json::to_value(errors).unwrap_or(serde_json::json!({})));
        }
        (self.status_code(), body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_status_codes() {
        assert_eq!(AuthError::Conflict { field: "email" }.status_code(), StatusCode::CONFLICT);
        assert_eq!(AuthError::WeakPassword.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidPhone.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::InvalidCredentials.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::NotFound("User".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::OtpExpired.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::OtpMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::ExpiredToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::EmailDelivery("timeout".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_conflict_names_the_field() {
        let msg = AuthError::Conflict { field: "phone" }.error_message();
        assert!(msg.starts_with("phone"));
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let msg = AuthError::DatabaseError("relation users does not exist".into()).error_message();
        assert_eq!(msg, "Internal server error");
        let msg = AuthError::EmailDelivery("smtp.example.com refused".into()).error_message();
        assert!(!msg.contains("smtp.example.com"));
    }
}
