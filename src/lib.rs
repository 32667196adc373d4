// Membership and weekly meal ordering API
// Accounts are created through email OTP verification and authenticated with JWT bearer tokens

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod members;
pub mod orders;
pub mod users;
pub mod validation;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    routing::{delete, get, post, put},
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use auth::{
    handlers as auth_handlers, models::MessageResponse, AuthService, TokenService, UserRepository,
};
use members::MemberRepository;
use orders::WeeklyOrderRepository;
use users::FileStorage;

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        auth::handlers::register_handler,
        auth::handlers::verify_otp_handler,
        auth::handlers::resend_otp_handler,
        auth::handlers::login_handler,
        auth::handlers::refresh_handler,
        auth::handlers::get_user_handler,
        auth::handlers::forgot_password_handler,
        auth::handlers::reset_password_handler,
        auth::handlers::resend_forgot_password_handler,
        auth::handlers::delete_users_handler,
        members::handlers::list_members,
        members::handlers::get_member,
        members::handlers::create_member,
        members::handlers::update_member,
        members::handlers::delete_member,
        orders::handlers::create_weekly_order,
        orders::handlers::list_weekly_orders,
        users::handlers::upload_avatar,
        users::handlers::get_avatar,
        users::handlers::update_profile,
    ),
    components(
        schemas(
            auth::models::Role,
            auth::models::UserResponse,
            auth::models::RegisterRequest,
            auth::models::VerifyOtpRequest,
            auth::models::EmailRequest,
            auth::models::LoginRequest,
            auth::models::ResetPasswordRequest,
            auth::models::UpdateProfileRequest,
            auth::models::MessageResponse,
            auth::models::TokenResponse,
            auth::models::ProfileResponse,
            auth::models::DeleteUsersResponse,
            members::Member,
            members::MemberInput,
            members::MemberResponse,
            orders::WeeklyOrder,
            orders::NewWeeklyOrder,
            orders::WeeklyOrderResponse,
            users::AvatarResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login, tokens and password reset"),
        (name = "members", description = "Member records (writes are admin only)"),
        (name = "orders", description = "Weekly meal orders of the caller"),
        (name = "users", description = "Avatar images and profile updates")
    ),
    info(
        title = "Mess API",
        version = "1.0.0",
        description = "Membership and weekly meal ordering backend"
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub tokens: TokenService,
    pub users: Arc<dyn UserRepository>,
    pub members: Arc<dyn MemberRepository>,
    pub orders: Arc<dyn WeeklyOrderRepository>,
    pub avatars: Arc<dyn FileStorage>,
}

impl FromRef<AppState> for TokenService {
    fn from_ref(state: &AppState) -> Self {
        state.tokens.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(state: &AppState) -> Self {
        state.auth.clone()
    }
}

async fn root() -> Json<MessageResponse> {
    Json(MessageResponse::new("Welcome to the Mess API"))
}

/// Creates and configures the application router
/// Maps all API endpoints to their handlers and adds CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    // Configure CORS to allow all origins, methods, and headers
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth_handlers::register_handler))
        .route("/verify-otp", post(auth_handlers::verify_otp_handler))
        .route("/resend-otp", post(auth_handlers::resend_otp_handler))
        .route("/login", post(auth_handlers::login_handler))
        .route("/refresh-token", post(auth_handlers::refresh_handler))
        .route("/users/by-usernames", delete(auth_handlers::delete_users_handler))
        .route("/users/:username", get(auth_handlers::get_user_handler))
        .route("/forgot-password", post(auth_handlers::forgot_password_handler))
        .route("/reset-password", post(auth_handlers::reset_password_handler))
        .route(
            "/resend-otp-forgot-password",
            post(auth_handlers::resend_forgot_password_handler),
        );

    Router::new()
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(root))
        .nest("/auth", auth_routes)
        .route(
            "/members",
            get(members::list_members).post(members::create_member),
        )
        .route(
            "/members/:id",
            get(members::get_member)
                .put(members::update_member)
                .delete(members::delete_member),
        )
        .route(
            "/orders/week",
            post(orders::create_weekly_order).get(orders::list_weekly_orders),
        )
        .route("/users/:username", put(users::update_profile))
        .route(
            "/users/:username/avatar",
            post(users::upload_avatar).get(users::get_avatar),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
