// Authentication module
// Email OTP registration and password reset, Argon2 credentials and JWT bearer tokens

pub mod email;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod otp;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

// Re-export commonly used types
pub use error::AuthError;
pub use middleware::{AuthenticatedUser, BearerToken};
pub use models::{Role, User, UserResponse};
pub use repository::{PgUserRepository, UserRepository};
pub use service::AuthService;
pub use token::TokenService;
