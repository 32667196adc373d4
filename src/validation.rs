// Validation utilities module
// Domain rules for passwords and phone numbers shared by registration,
// password reset and profile updates

use lazy_static::lazy_static;
use regex::Regex;
use validator::ValidationError;

lazy_static! {
    // ASCII digits only: `\d` would also accept other Unicode digits
    static ref PHONE_RE: Regex = Regex::new(r"^0[0-9]{9}$").unwrap();
    static ref STRONG_CHAR_RE: Regex = Regex::new(r#"[A-Z!@#$%^&*(),.?":{}|<>]"#).unwrap();
    static ref WEEK_RE: Regex = Regex::new(r"^[0-9]{4}-W(0[1-9]|[1-4][0-9]|5[0-3])$").unwrap();
}

/// Minimum password length, counted in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// At least 8 characters and at least one uppercase letter or one of
/// `!@#$%^&*(),.?":{}|<>`
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH && STRONG_CHAR_RE.is_match(password)
}

/// Exactly 10 ASCII digits, the first one being 0
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

/// validator hook rejecting strings that are empty after trimming
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::new("must_not_be_blank"))
    } else {
        Ok(())
    }
}

/// ISO week identifier such as `2024-W07`
pub fn validate_week(week: &str) -> Result<(), ValidationError> {
    if WEEK_RE.is_match(week) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_week"))
    }
}
