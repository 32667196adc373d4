use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::validate_not_blank;

/// Hospitality-style member record, independent of login accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Member {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "Jane Doe")]
    pub full_name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[schema(example = "0912345678")]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    /// Set by the server on creation
    pub join_date: Option<NaiveDate>,
    #[schema(example = "female")]
    pub gender: Option<String>,
}

/// Client-writable member fields, used by both create and replace
///
/// `id` and `join_date` are not part of the body and cannot be set by clients.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct MemberInput {
    #[validate(
        length(min = 1, max = 100, message = "Full name must be 1-100 characters"),
        custom(function = "validate_not_blank", message = "Full name must not be blank")
    )]
    #[schema(example = "Jane Doe")]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    /// Free-form contact number
    #[validate(length(max = 20, message = "Phone must be at most 20 characters"))]
    #[schema(example = "+1 555 0100")]
    pub phone: Option<String>,
    pub birth_date: Option<NaiveDate>,
    #[validate(length(max = 20, message = "Gender must be at most 20 characters"))]
    #[schema(example = "female")]
    pub gender: Option<String>,
}

impl MemberInput {
    /// Trim text fields and lowercase the email
    pub fn normalized(mut self) -> Self {
        self.full_name = self.full_name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self.phone = self
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        self.gender = self
            .gender
            .map(|g| g.trim().to_string())
            .filter(|g| !g.is_empty());
        self
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MemberResponse {
    pub message: String,
    pub member: Member,
}
