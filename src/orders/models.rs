use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::validation::{validate_not_blank, validate_week};

/// A meal ordered for a given week, owned by one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct WeeklyOrder {
    #[schema(example = 1)]
    pub id: i32,
    /// Owning user, taken from the access token
    #[schema(example = 7)]
    pub user_id: i32,
    #[schema(example = "2024-W07")]
    pub week: String,
    #[schema(example = "Vegetarian lasagne")]
    pub meal: String,
    pub date: NaiveDate,
}

/// Request body for POST /orders/week
///
/// The owner is never part of the body; it comes from the caller's token.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct NewWeeklyOrder {
    #[validate(custom(
        function = "validate_week",
        message = "Week must look like YYYY-Www, e.g. 2024-W07"
    ))]
    #[schema(example = "2024-W07")]
    pub week: String,
    #[validate(
        length(min = 1, max = 255, message = "Meal must be 1-255 characters"),
        custom(function = "validate_not_blank", message = "Meal must not be blank")
    )]
    #[schema(example = "Vegetarian lasagne")]
    pub meal: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WeeklyOrderResponse {
    pub message: String,
    pub order: WeeklyOrder,
}
