// HTTP handlers for per-user resources: avatar image and profile

use std::path::Path as FsPath;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::{
    models::{ProfileResponse, UpdateProfileRequest, UserResponse},
    AuthenticatedUser,
};
use crate::error::ApiError;
use crate::AppState;

/// Public prefix recorded on the user row in front of the storage key
pub const AVATAR_PATH_PREFIX: &str = "uploads/";

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvatarResponse {
    pub message: String,
    #[schema(example = "uploads/user_bob.png")]
    pub avatar: String,
}

/// Lowercased alphanumeric extension of an uploaded file name, dot included
fn extension_of(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| FsPath::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}

fn content_type_for(key: &str) -> &'static str {
    match FsPath::new(key).extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

fn avatar_not_found(username: &str) -> ApiError {
    ApiError::NotFound {
        resource: "Avatar".to_string(),
        id: username.to_string(),
    }
}

fn user_not_found(username: &str) -> ApiError {
    ApiError::NotFound {
        resource: "User".to_string(),
        id: username.to_string(),
    }
}

/// Store the avatar for `username` as `user_{username}{ext}` and record its path
///
/// A previous avatar stored under a different extension is removed.
pub async fn store_avatar(
    state: &AppState,
    username: &str,
    file_name: Option<&str>,
    bytes: Bytes,
) -> Result<String, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Uploaded file is empty".to_string()));
    }

    let user = state
        .users
        .find_by_username(username)
        .await?
        .ok_or_else(|| user_not_found(username))?;

    let key = format!("user_{}{}", user.username, extension_of(file_name));
    let previous = user
        .avatar
        .as_deref()
        .and_then(|path| path.strip_prefix(AVATAR_PATH_PREFIX))
        .filter(|previous| *previous != key);

    state.avatars.put(&key, bytes).await?;

    // The row must point at the new file before the old one goes away
    let path = format!("{}{}", AVATAR_PATH_PREFIX, key);
    if let Err(e) = state.users.set_avatar(user.id, &path).await {
        if user.avatar.as_deref() != Some(path.as_str()) {
            if let Err(cleanup) = state.avatars.delete(&key).await {
                tracing::warn!(error = %cleanup, "failed to remove unrecorded avatar");
            }
        }
        return Err(e.into());
    }

    if let Some(previous) = previous {
        if let Err(e) = state.avatars.delete(previous).await {
            tracing::warn!(error = %e, "failed to remove previous avatar");
        }
    }

    tracing::info!(%username, avatar = %path, "avatar stored");
    Ok(path)
}

/// Avatar bytes and content type for `username`
pub async fn load_avatar(state: &AppState, username: &str) -> Result<(Bytes, &'static str), ApiError> {
    let user = state
        .users
        .find_by_username(username)
        .await?
        .ok_or_else(|| avatar_not_found(username))?;

    let key = user
        .avatar
        .as_deref()
        .map(|path| path.strip_prefix(AVATAR_PATH_PREFIX).unwrap_or(path))
        .ok_or_else(|| avatar_not_found(username))?;

    let bytes = state
        .avatars
        .get(key)
        .await?
        .ok_or_else(|| {
            tracing::warn!(%username, %key, "avatar recorded but file is missing");
            avatar_not_found(username)
        })?;

    Ok((bytes, content_type_for(key)))
}

/// Handler for POST /users/{username}/avatar
/// Expects a multipart body with a `file` part
#[utoipa::path(
    post,
    path = "/users/{username}/avatar",
    params(("username" = String, Path, description = "Owner of the avatar")),
    request_body(content = String, content_type = "multipart/form-data", description = "Image in a `file` part"),
    responses(
        (status = 200, description = "Avatar stored", body = AvatarResponse),
        (status = 400, description = "No file or empty file"),
        (status = 403, description = "Not the user themselves or an admin"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn upload_avatar(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(username): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, ApiError> {
    caller.require_self_or_admin(&username)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?;

        let avatar = store_avatar(&state, &username, file_name.as_deref(), bytes).await?;
        return Ok(Json(AvatarResponse {
            message: "Avatar uploaded successfully".to_string(),
            avatar,
        }));
    }

    Err(ApiError::BadRequest(
        "Multipart field 'file' is required".to_string(),
    ))
}

/// Handler for GET /users/{username}/avatar
#[utoipa::path(
    get,
    path = "/users/{username}/avatar",
    params(("username" = String, Path, description = "Owner of the avatar")),
    responses(
        (status = 200, description = "Avatar image bytes"),
        (status = 404, description = "No avatar recorded or file missing")
    ),
    tag = "users"
)]
pub async fn get_avatar(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Response, ApiError> {
    let (bytes, content_type) = load_avatar(&state, &username).await?;
    Ok(([(header::CONTENT_TYPE, content_type)], bytes).into_response())
}

/// Handler for PUT /users/{username}
/// Updates whitelisted profile fields and returns a fresh token
#[utoipa::path(
    put,
    path = "/users/{username}",
    params(("username" = String, Path, description = "User to update")),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ProfileResponse),
        (status = 400, description = "Invalid input or weak password"),
        (status = 401, description = "Wrong current password"),
        (status = 403, description = "Not the user themselves or an admin"),
        (status = 404, description = "User not found"),
        (status = 409, description = "Username, email or phone already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(username): Path<String>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (user, token) = state
        .auth
        .update_profile(&caller.claims, &username, request)
        .await?;

    Ok(Json(ProfileResponse {
        message: "Profile updated successfully".to_string(),
        user: UserResponse::from(user),
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}
