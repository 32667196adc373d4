// Password hashing and validation service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use tracing::error;

use crate::auth::error::AuthError;
use crate::validation;

/// Argon2id hash with the default cost parameters that matches no password
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$bWVzcy1hcGkvbG9naW4hIQ$kvBtyUeiH1A7i9YWsoDEAtXu465eN7nDBgDwEL+HAbI";

/// Credential store: one salted Argon2id scheme for every code path
pub struct PasswordService;

impl PasswordService {
    /// Hash a password using Argon2id with a random salt
    pub fn hash_password(password: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                AuthError::PasswordHashError
            })
    }

    /// Verify a password against a stored PHC string
    ///
    /// The comparison inside argon2 is constant time. A stored value that is
    /// not a parseable hash never matches.
    pub fn verify_password(password: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(e) => {
                error!(error = %e, "argon2 parse hash error");
                false
            }
        }
    }

    /// Spend a full verification on a fixed hash, for accounts that do not exist
    pub fn verify_against_dummy(password: &str) {
        let _ = Self::verify_password(password, DUMMY_HASH);
    }

    /// Validate password strength requirements
    pub fn validate_password_strength(password: &str) -> Result<(), AuthError> {
        if validation::is_strong_password(password) {
            Ok(())
        } else {
            Err(AuthError::WeakPassword)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify_roundtrip() {
        let hash = PasswordService::hash_password("Secur3P@ssw0rd!").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(PasswordService::verify_password("Secur3P@ssw0rd!", &hash));
    }

    #[test]
    fn verify_rejects_wrong_password() {
        let hash = PasswordService::hash_password("Passw0rd!").unwrap();
        assert!(!PasswordService::verify_password("passw0rd!", &hash));
    }

    #[test]
    fn dummy_hash_uses_default_cost() {
        let parsed = PasswordHash::new(DUMMY_HASH).unwrap();
        let params = argon2::Params::try_from(&parsed).unwrap();
        assert_eq!(params.m_cost(), argon2::Params::DEFAULT_M_COST);
        assert_eq!(params.t_cost(), argon2::Params::DEFAULT_T_COST);
        assert_eq!(params.p_cost(), argon2::Params::DEFAULT_P_COST);
        assert!(!PasswordService::verify_password("Passw0rd!", DUMMY_HASH));
    }

    #[test]
    fn hashes_are_salted() {
        let a = PasswordService::hash_password("Passw0rd!").unwrap();
        let b = PasswordService::hash_password("Passw0rd!").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn malformed_hash_never_matches() {
        // e.g. an unsalted sha256 hex digest left over from another scheme
        let legacy = "5e884898da28047151d0e56f8dc6292773603d0d6aabbdd62a11ef721d1542d8";
        assert!(!PasswordService::verify_password("password", legacy));
    }

    #[test]
    fn strength_maps_to_weak_password() {
        assert!(PasswordService::validate_password_strength("Passw0rd!").is_ok());
        assert!(matches!(
            PasswordService::validate_password_strength("short"),
            Err(AuthError::WeakPassword)
        ));
    }
}
