// HTTP handlers for member endpoints
// Reads are public; writes require the admin role

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::members::models::{Member, MemberInput, MemberResponse};
use crate::AppState;

fn member_not_found(id: i32) -> ApiError {
    ApiError::NotFound {
        resource: "Member".to_string(),
        id: id.to_string(),
    }
}

/// Handler for GET /members
#[utoipa::path(
    get,
    path = "/members",
    responses(
        (status = 200, description = "All members ordered by id", body = Vec<Member>)
    ),
    tag = "members"
)]
pub async fn list_members(State(state): State<AppState>) -> Result<Json<Vec<Member>>, ApiError> {
    let members = state.members.list().await?;
    tracing::debug!("Retrieved {} members", members.len());
    Ok(Json(members))
}

/// Handler for GET /members/{id}
#[utoipa::path(
    get,
    path = "/members/{id}",
    params(("id" = i32, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member found", body = Member),
        (status = 404, description = "Member not found")
    ),
    tag = "members"
)]
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Member>, ApiError> {
    state
        .members
        .find_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| member_not_found(id))
}

/// Handler for POST /members
#[utoipa::path(
    post,
    path = "/members",
    request_body = MemberInput,
    responses(
        (status = 201, description = "Member created", body = MemberResponse),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Caller is not an admin"),
        (status = 409, description = "Email already used by another member")
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn create_member(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Json(payload): Json<MemberInput>,
) -> Result<(StatusCode, Json<MemberResponse>), ApiError> {
    caller.require_admin()?;
    payload.validate()?;
    let payload = payload.normalized();

    if state.members.email_taken(&payload.email, None).await? {
        tracing::warn!("Attempt to create member with duplicate email");
        return Err(ApiError::Conflict {
            message: "A member with this email already exists".to_string(),
        });
    }

    let member = state.members.create(payload).await?;
    tracing::info!(member_id = member.id, by = %caller.username, "member created");
    Ok((
        StatusCode::CREATED,
        Json(MemberResponse {
            message: "Member created successfully".to_string(),
            member,
        }),
    ))
}

/// Handler for PUT /members/{id}
/// Replaces the client-writable fields; id and join date are kept
#[utoipa::path(
    put,
    path = "/members/{id}",
    params(("id" = i32, Path, description = "Member id")),
    request_body = MemberInput,
    responses(
        (status = 200, description = "Member updated", body = MemberResponse),
        (status = 400, description = "Invalid input data"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Member not found"),
        (status = 409, description = "Email already used by another member")
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn update_member(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i32>,
    Json(payload): Json<MemberInput>,
) -> Result<Json<MemberResponse>, ApiError> {
    caller.require_admin()?;
    payload.validate()?;
    let payload = payload.normalized();

    if state.members.find_by_id(id).await?.is_none() {
        return Err(member_not_found(id));
    }
    if state.members.email_taken(&payload.email, Some(id)).await? {
        return Err(ApiError::Conflict {
            message: "A member with this email already exists".to_string(),
        });
    }

    let member = state
        .members
        .update(id, payload)
        .await?
        .ok_or_else(|| member_not_found(id))?;

    tracing::info!(member_id = id, by = %caller.username, "member updated");
    Ok(Json(MemberResponse {
        message: "Member updated successfully".to_string(),
        member,
    }))
}

/// Handler for DELETE /members/{id}
/// Returns the deleted record
#[utoipa::path(
    delete,
    path = "/members/{id}",
    params(("id" = i32, Path, description = "Member id")),
    responses(
        (status = 200, description = "Member deleted", body = MemberResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Member not found")
    ),
    security(("bearer_auth" = [])),
    tag = "members"
)]
pub async fn delete_member(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(id): Path<i32>,
) -> Result<Json<MemberResponse>, ApiError> {
    caller.require_admin()?;

    let member = state
        .members
        .delete(id)
        .await?
        .ok_or_else(|| member_not_found(id))?;

    tracing::info!(member_id = id, by = %caller.username, "member deleted");
    Ok(Json(MemberResponse {
        message: "Member deleted successfully".to_string(),
        member,
    }))
}
