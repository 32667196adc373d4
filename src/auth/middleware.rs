// Bearer token extractors for protected routes

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use tracing::{debug, warn};

use crate::auth::{error::AuthError, models::Role, token::TokenService};

/// Raw token from an `Authorization: Bearer <token>` header, not yet validated
#[derive(Debug, Clone)]
pub struct BearerToken(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| {
                warn!(path = %parts.uri.path(), "authorization header is not a bearer token");
                AuthError::InvalidToken
            })?;

        Ok(BearerToken(token.to_string()))
    }
}

/// Caller identity taken from a valid access token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: Role,
    pub claims: crate::auth::token::Claims,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
    TokenService: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;

        let claims = TokenService::from_ref(state)
            .validate_access_token(&token)
            .map_err(|e| {
                debug!(path = %parts.uri.path(), error = %e, "rejected access token");
                e
            })?;

        Ok(AuthenticatedUser {
            username: claims.sub.clone(),
            role: claims.role,
            claims,
        })
    }
}

impl AuthenticatedUser {
    /// Fail with `InsufficientPermissions` unless the caller holds `required`
    pub fn require_role(&self, required: Role) -> Result<(), AuthError> {
        if self.role != required {
            warn!(
                username = %self.username,
                required_role = %required,
                actual_role = %self.role,
                "authorization failed"
            );
            return Err(AuthError::InsufficientPermissions {
                required,
                actual: self.role,
            });
        }
        Ok(())
    }

    pub fn require_admin(&self) -> Result<(), AuthError> {
        self.require_role(Role::Admin)
    }

    /// Allow the named user themselves or any admin
    pub fn require_self_or_admin(&self, username: &str) -> Result<(), AuthError> {
        if self.username == username || self.role == Role::Admin {
            Ok(())
        } else {
            warn!(caller = %self.username, target = %username, "access to another user's resource denied");
            Err(AuthError::Forbidden(
                "You can only access your own account".to_string(),
            ))
        }
    }
}
