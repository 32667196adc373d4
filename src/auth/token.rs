// JWT token generation and validation service

use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};

use crate::auth::{error::AuthError, models::Role};

/// Login tokens live for an hour
pub const DEFAULT_ACCESS_TOKEN_SECONDS: i64 = 3600;
/// Tokens issued from profile flows live for 60 minutes
pub const DEFAULT_PROFILE_TOKEN_MINUTES: i64 = 60;

/// JWT claims structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub role: Role,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

/// Token service for JWT operations
///
/// Validation is stateless: there is no revocation list, a leaked token stays
/// valid until its `exp`.
#[derive(Clone)]
pub struct TokenService {
    secret: String,
    access_token_duration: i64,  // in seconds
    profile_token_duration: i64, // in seconds
}

impl TokenService {
    /// Create a new TokenService with the default lifetimes
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            access_token_duration: DEFAULT_ACCESS_TOKEN_SECONDS,
            profile_token_duration: DEFAULT_PROFILE_TOKEN_MINUTES * 60,
        }
    }

    pub fn with_durations(secret: String, access_seconds: i64, profile_minutes: i64) -> Self {
        Self {
            secret,
            access_token_duration: access_seconds,
            profile_token_duration: profile_minutes * 60,
        }
    }

    /// Generate an access token with the login lifetime
    pub fn generate_access_token(&self, username: &str, role: Role) -> Result<String, AuthError> {
        self.generate_token(username, role, self.access_token_duration)
    }

    /// Generate a token for the profile flows (60 minutes by default)
    pub fn generate_profile_token(&self, username: &str, role: Role) -> Result<String, AuthError> {
        self.generate_token(username, role, self.profile_token_duration)
    }

    /// Sign a token embedding subject, role and an absolute expiry
    pub fn generate_token(
        &self,
        username: &str,
        role: Role,
        ttl_seconds: i64,
    ) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: username.to_string(),
            role,
            iat: now,
            exp: now + ttl_seconds,
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenGenerationError(e.to_string()))
    }

    /// Validate an access token
    ///
    /// Bad signature, wrong algorithm or missing claims give `InvalidToken`;
    /// a token past its `exp` gives `ExpiredToken`.
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
    }

    /// Reissue a token with the same subject and role and a new expiry window
    ///
    /// Expired tokens cannot be refreshed; the caller has to log in again.
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.validate_access_token(token)?;
        self.generate_access_token(&claims.sub, claims.role)
    }
}
