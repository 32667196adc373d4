// HTTP handlers for authentication endpoints

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Form, Json,
};

use crate::auth::{
    error::AuthError,
    middleware::{AuthenticatedUser, BearerToken},
    models::{
        DeleteUsersResponse, EmailRequest, LoginRequest, MessageResponse, RegisterRequest,
        ResetPasswordRequest, TokenResponse, UserResponse, VerifyOtpRequest,
    },
    service::AuthService,
};
use validator::Validate;

/// Start a registration and email a verification code
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body(content = RegisterRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Verification code sent", body = MessageResponse),
        (status = 400, description = "Weak password, bad phone or invalid input"),
        (status = 409, description = "Username, email or phone already in use"),
        (status = 503, description = "Verification email could not be sent")
    ),
    tag = "auth"
)]
pub async fn register_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<RegisterRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    tracing::debug!(username = %request.username, "register request");
    service.register(request).await?;
    Ok(Json(MessageResponse::new(
        "OTP sent to your email. Please verify to complete registration.",
    )))
}

/// Confirm a registration with the emailed code
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    request_body(content = VerifyOtpRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Account created", body = TokenResponse),
        (status = 400, description = "Code expired or incorrect"),
        (status = 404, description = "No pending registration for this email")
    ),
    tag = "auth"
)]
pub async fn verify_otp_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<VerifyOtpRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    request.validate()?;
    let token = service
        .confirm_registration(&request.email, &request.otp)
        .await?;
    Ok(Json(TokenResponse::bearer(
        "Registration completed successfully",
        token,
    )))
}

/// Send a fresh registration code
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    request_body(content = EmailRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "New code sent", body = MessageResponse),
        (status = 404, description = "No pending registration for this email"),
        (status = 503, description = "Email could not be sent")
    ),
    tag = "auth"
)]
pub async fn resend_otp_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    request.validate()?;
    service.resend_registration_otp(&request.email).await?;
    Ok(Json(MessageResponse::new("A new OTP has been sent to your email")))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body(content = LoginRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid username or password")
    ),
    tag = "auth"
)]
pub async fn login_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<LoginRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    request.validate()?;
    let token = service.login(&request.username, &request.password).await?;
    Ok(Json(TokenResponse::bearer("Login successful", token)))
}

/// Reissue the bearer token with a new expiry
#[utoipa::path(
    post,
    path = "/auth/refresh-token",
    responses(
        (status = 200, description = "Token refreshed", body = TokenResponse),
        (status = 401, description = "Missing, invalid or expired token")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn refresh_handler(
    State(service): State<Arc<AuthService>>,
    BearerToken(token): BearerToken,
) -> Result<Json<TokenResponse>, AuthError> {
    let token = service.refresh(&token)?;
    Ok(Json(TokenResponse::bearer("Token refreshed", token)))
}

#[utoipa::path(
    get,
    path = "/auth/users/{username}",
    params(("username" = String, Path, description = "Username to look up")),
    responses(
        (status = 200, description = "User profile", body = UserResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn get_user_handler(
    State(service): State<Arc<AuthService>>,
    _caller: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<Json<UserResponse>, AuthError> {
    Ok(Json(service.get_user(&username).await?))
}

/// Email a password reset code
#[utoipa::path(
    post,
    path = "/auth/forgot-password",
    request_body(content = EmailRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Reset code sent", body = MessageResponse),
        (status = 404, description = "No account with this email"),
        (status = 503, description = "Email could not be sent")
    ),
    tag = "auth"
)]
pub async fn forgot_password_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    request.validate()?;
    service.forgot_password(&request.email).await?;
    Ok(Json(MessageResponse::new("OTP sent to your email")))
}

#[utoipa::path(
    post,
    path = "/auth/reset-password",
    request_body(content = ResetPasswordRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Code expired or incorrect, or weak password"),
        (status = 404, description = "No pending reset for this email")
    ),
    tag = "auth"
)]
pub async fn reset_password_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    service.reset_password(request).await?;
    Ok(Json(MessageResponse::new("Password has been reset successfully")))
}

#[utoipa::path(
    post,
    path = "/auth/resend-otp-forgot-password",
    request_body(content = EmailRequest, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "New reset code sent", body = MessageResponse),
        (status = 404, description = "No account or no pending reset for this email"),
        (status = 503, description = "Email could not be sent")
    ),
    tag = "auth"
)]
pub async fn resend_forgot_password_handler(
    State(service): State<Arc<AuthService>>,
    Form(request): Form<EmailRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    request.validate()?;
    service.resend_forgot_password_otp(&request.email).await?;
    Ok(Json(MessageResponse::new("A new OTP has been sent to your email")))
}

/// Delete several accounts at once (admin only)
#[utoipa::path(
    delete,
    path = "/auth/users/by-usernames",
    request_body = Vec<String>,
    responses(
        (status = 200, description = "Users deleted", body = DeleteUsersResponse),
        (status = 400, description = "Empty username list"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "None of the usernames exist")
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn delete_users_handler(
    State(service): State<Arc<AuthService>>,
    caller: AuthenticatedUser,
    Json(usernames): Json<Vec<String>>,
) -> Result<Json<DeleteUsersResponse>, AuthError> {
    caller.require_admin()?;
    let deleted = service.delete_by_usernames(usernames).await?;
    Ok(Json(DeleteUsersResponse {
        message: format!("Deleted {} user(s)", deleted.len()),
        deleted,
    }))
}
