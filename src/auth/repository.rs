// Database repository for users

use axum::async_trait;
use sqlx::PgPool;

use crate::auth::{
    error::AuthError,
    models::{NewUser, User, UserChanges},
};

const USER_COLUMNS: &str =
    "id, username, email, phone, password_hash, full_name, role, avatar, created_at";

/// Persistence contract for User records
///
/// Uniqueness of username, email and phone is enforced by the storage layer;
/// violations come back as `AuthError::Conflict` naming the field.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthError>;
    async fn create(&self, user: NewUser) -> Result<User, AuthError>;
    async fn update_password(&self, id: i32, password_hash: &str) -> Result<(), AuthError>;
    async fn update_profile(&self, id: i32, changes: UserChanges) -> Result<User, AuthError>;
    async fn set_avatar(&self, id: i32, avatar: &str) -> Result<(), AuthError>;
    /// Delete every user whose username is listed, returning the usernames removed
    async fn delete_by_usernames(&self, usernames: &[String]) -> Result<Vec<String>, AuthError>;
}

/// Postgres-backed user repository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by(&self, column: &str, value: &str) -> Result<Option<User>, AuthError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}

/// Translate a unique violation into the field it concerns
fn map_write_error(e: sqlx::Error) -> AuthError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            let constraint = db_err.constraint().unwrap_or_default();
            let field = if constraint.contains("username") {
                "username"
            } else if constraint.contains("phone") {
                "phone"
            } else {
                "email"
            };
            return AuthError::Conflict { field };
        }
    }
    AuthError::DatabaseError(e.to_string())
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AuthError> {
        self.find_by("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        self.find_by("email", email).await
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<User>, AuthError> {
        self.find_by("phone", phone).await
    }

    async fn create(&self, user: NewUser) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, phone, password_hash, full_name, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(user.role)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)
    }

    async fn update_password(&self, id: i32, password_hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET password_hash = $1 WHERE id = $2")
            .bind(password_hash)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn update_profile(&self, id: i32, changes: UserChanges) -> Result<User, AuthError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users
            SET username = COALESCE($2, username),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                full_name = COALESCE($5, full_name),
                password_hash = COALESCE($6, password_hash)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.phone)
        .bind(changes.full_name)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?
        .ok_or_else(|| AuthError::NotFound("User".to_string()))
    }

    async fn set_avatar(&self, id: i32, avatar: &str) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
            .bind(avatar)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotFound("User".to_string()));
        }
        Ok(())
    }

    async fn delete_by_usernames(&self, usernames: &[String]) -> Result<Vec<String>, AuthError> {
        let mut tx = self.pool.begin().await?;

        let deleted: Vec<String> =
            sqlx::query_scalar("DELETE FROM users WHERE username = ANY($1) RETURNING username")
                .bind(usernames)
                .fetch_all(&mut *tx)
                .await?;

        tx.commit().await?;

        // Report in request order
        Ok(usernames
            .iter()
            .filter(|name| deleted.contains(name))
            .cloned()
            .collect())
    }
}
