// HTTP handlers for weekly order endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::auth::{AuthError, AuthenticatedUser};
use crate::error::ApiError;
use crate::orders::models::{NewWeeklyOrder, WeeklyOrder, WeeklyOrderResponse};
use crate::AppState;

/// Resolve the caller's user id; a token whose user was deleted is no longer valid
async fn caller_id(state: &AppState, caller: &AuthenticatedUser) -> Result<i32, ApiError> {
    match state.users.find_by_username(&caller.username).await? {
        Some(user) => Ok(user.id),
        None => {
            tracing::warn!(username = %caller.username, "token subject no longer exists");
            Err(AuthError::InvalidToken.into())
        }
    }
}

/// Handler for POST /orders/week
/// Creates a weekly order owned by the authenticated user
#[utoipa::path(
    post,
    path = "/orders/week",
    request_body = NewWeeklyOrder,
    responses(
        (status = 201, description = "Order created", body = WeeklyOrderResponse),
        (status = 400, description = "Invalid input data"),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn create_weekly_order(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(request): Json<NewWeeklyOrder>,
) -> Result<(StatusCode, Json<WeeklyOrderResponse>), ApiError> {
    request.validate()?;
    let user_id = caller_id(&state, &caller).await?;

    let order = state.orders.create(user_id, request).await?;
    tracing::info!(order_id = order.id, user_id, week = %order.week, "weekly order created");

    Ok((
        StatusCode::CREATED,
        Json(WeeklyOrderResponse {
            message: "Weekly order created successfully".to_string(),
            order,
        }),
    ))
}

/// Handler for GET /orders/week
/// Lists the caller's own orders only
#[utoipa::path(
    get,
    path = "/orders/week",
    responses(
        (status = 200, description = "Caller's weekly orders", body = Vec<WeeklyOrder>),
        (status = 401, description = "Missing or invalid token")
    ),
    security(("bearer_auth" = [])),
    tag = "orders"
)]
pub async fn list_weekly_orders(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
) -> Result<Json<Vec<WeeklyOrder>>, ApiError> {
    let user_id = caller_id(&state, &caller).await?;
    let orders = state.orders.list_by_user(user_id).await?;
    tracing::debug!(user_id, "retrieved {} weekly orders", orders.len());
    Ok(Json(orders))
}
