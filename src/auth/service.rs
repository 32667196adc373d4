// Authentication service - business logic layer

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use crate::auth::{
    email::OtpPurpose,
    error::AuthError,
    models::{
        NewUser, RegisterRequest, ResetPasswordRequest, Role, UpdateProfileRequest, User,
        UserChanges, UserResponse,
    },
    otp::{OtpIssuer, ProvisionalUser},
    password::PasswordService,
    repository::UserRepository,
    token::{Claims, TokenService},
};
use crate::validation;

/// Lowercased, trimmed form used for every email lookup and store key
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Authentication service coordinating registration, login and password reset
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    otp: OtpIssuer,
    tokens: TokenService,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, otp: OtpIssuer, tokens: TokenService) -> Self {
        Self { users, otp, tokens }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Start a registration: validate, hold the unique fields and email a code
    ///
    /// Checks run in a fixed order (username, email, password policy, phone
    /// format, phone uniqueness) and the first failure is reported. Nothing is
    /// persisted until the code is confirmed. Returns the issued code.
    pub async fn register(&self, request: RegisterRequest) -> Result<String, AuthError> {
        request.validate()?;

        let username = request.username.trim().to_string();
        let email = normalize_email(&request.email);
        let phone = request.phone.trim().to_string();

        if self.users.find_by_username(&username).await?.is_some()
            || self.otp.reservation_holder("username", &username).await?.is_some()
        {
            return Err(AuthError::Conflict { field: "username" });
        }

        if self.users.find_by_email(&email).await?.is_some() || self.has_live_registration(&email).await? {
            return Err(AuthError::Conflict { field: "email" });
        }

        PasswordService::validate_password_strength(&request.password)?;

        if !validation::is_valid_phone(&phone) {
            return Err(AuthError::InvalidPhone);
        }

        if self.users.find_by_phone(&phone).await?.is_some()
            || self.otp.reservation_holder("phone", &phone).await?.is_some()
        {
            return Err(AuthError::Conflict { field: "phone" });
        }

        let registration = ProvisionalUser {
            username: username.clone(),
            password_hash: PasswordService::hash_password(&request.password)?,
            full_name: request
                .full_name
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty()),
            phone: phone.clone(),
        };

        // Reservations only count while the pending entry below is live and
        // still names these values, so a failed send leaves nothing effective
        self.otp.reserve("username", &username, &email).await?;
        self.otp.reserve("phone", &phone, &email).await?;
        let code = self
            .otp
            .issue(OtpPurpose::VerifyAccount, &email, Some(registration))
            .await?;

        info!(%username, "registration pending email confirmation");
        Ok(code)
    }

    /// Confirm a pending registration and create the account
    ///
    /// On success the pending entry is consumed and an access token for the
    /// new user is returned.
    pub async fn confirm_registration(&self, email: &str, code: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        let entry = self.otp.check(OtpPurpose::VerifyAccount, &email, code).await?;
        let registration = entry
            .registration
            .ok_or_else(|| AuthError::NotFound("Pending registration".to_string()))?;

        let user = self
            .users
            .create(NewUser {
                username: registration.username.clone(),
                email: email.clone(),
                phone: registration.phone.clone(),
                password_hash: registration.password_hash,
                full_name: registration.full_name,
                role: Role::Member,
            })
            .await?;

        self.otp.consume(OtpPurpose::VerifyAccount, &email).await?;
        self.otp
            .release("username", &registration.username, &email)
            .await?;
        self.otp.release("phone", &registration.phone, &email).await?;

        info!(username = %user.username, user_id = user.id, "account created");
        self.tokens.generate_access_token(&user.username, user.role)
    }

    /// Send a new registration code, keeping the provisional fields
    ///
    /// Once the previous code has expired its username and phone may have been
    /// taken by someone else, so the unique fields are checked and held again
    /// before the new code goes out.
    pub async fn resend_registration_otp(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        let entry = self
            .otp
            .pending(OtpPurpose::VerifyAccount, &email)
            .await?
            .ok_or_else(|| AuthError::NotFound("Pending OTP for this email".to_string()))?;

        if let Some(registration) = &entry.registration {
            self.ensure_still_available(&email, registration).await?;
            self.otp
                .reserve("username", &registration.username, &email)
                .await?;
            self.otp.reserve("phone", &registration.phone, &email).await?;
        }

        self.otp
            .issue(OtpPurpose::VerifyAccount, &email, entry.registration)
            .await
    }

    /// Exchange username and password for an access token
    ///
    /// An unknown username and a wrong password are indistinguishable.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AuthError> {
        let user = match self.users.find_by_username(username.trim()).await? {
            Some(user) => user,
            None => {
                PasswordService::verify_against_dummy(password);
                warn!("login attempt for unknown username");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !PasswordService::verify_password(password, &user.password_hash) {
            warn!(username = %user.username, "login attempt with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        self.tokens.generate_access_token(&user.username, user.role)
    }

    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        self.tokens.refresh(token)
    }

    pub async fn get_user(&self, username: &str) -> Result<UserResponse, AuthError> {
        self.users
            .find_by_username(username)
            .await?
            .map(UserResponse::from)
            .ok_or_else(|| AuthError::NotFound("User".to_string()))
    }

    /// Email a password reset code to an existing account
    pub async fn forgot_password(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        self.require_user_by_email(&email).await?;
        self.otp.issue(OtpPurpose::ResetPassword, &email, None).await
    }

    /// Send a new reset code; a reset must already be in progress
    pub async fn resend_forgot_password_otp(&self, email: &str) -> Result<String, AuthError> {
        let email = normalize_email(email);
        self.require_user_by_email(&email).await?;
        self.otp.resend(OtpPurpose::ResetPassword, &email).await
    }

    /// Replace the password once the reset code checks out
    ///
    /// A weak new password leaves the code unconsumed so it can be retried.
    pub async fn reset_password(&self, request: ResetPasswordRequest) -> Result<(), AuthError> {
        request.validate()?;
        let email = normalize_email(&request.email);

        self.otp
            .check(OtpPurpose::ResetPassword, &email, &request.otp)
            .await?;
        PasswordService::validate_password_strength(&request.new_password)?;

        let user = self.require_user_by_email(&email).await?;
        let hash = PasswordService::hash_password(&request.new_password)?;
        self.users.update_password(user.id, &hash).await?;
        self.otp.consume(OtpPurpose::ResetPassword, &email).await?;

        info!(username = %user.username, "password reset");
        Ok(())
    }

    /// Remove every listed account in one transaction
    pub async fn delete_by_usernames(&self, usernames: Vec<String>) -> Result<Vec<String>, AuthError> {
        let mut names: Vec<String> = Vec::with_capacity(usernames.len());
        for name in usernames {
            let name = name.trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
        if names.is_empty() {
            return Err(AuthError::BadRequest(
                "At least one username is required".to_string(),
            ));
        }

        let deleted = self.users.delete_by_usernames(&names).await?;
        if deleted.is_empty() {
            return Err(AuthError::NotFound(
                "Users matching the given usernames".to_string(),
            ));
        }

        info!(count = deleted.len(), "users deleted");
        Ok(deleted)
    }

    /// Update the whitelisted profile fields of `username`
    ///
    /// Only the user themselves or an admin may do this. Changing the password
    /// requires the current one. Returns the updated user and a token for the
    /// caller, re-issued under the new username when callers rename themselves.
    pub async fn update_profile(
        &self,
        caller: &Claims,
        username: &str,
        request: UpdateProfileRequest,
    ) -> Result<(User, String), AuthError> {
        let is_self = caller.sub == username;
        if !is_self && caller.role != Role::Admin {
            return Err(AuthError::Forbidden(
                "You can only update your own profile".to_string(),
            ));
        }
        request.validate()?;

        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AuthError::NotFound("User".to_string()))?;

        let mut changes = UserChanges::default();

        if let Some(new_username) = request.username.map(|u| u.trim().to_string()) {
            if new_username != user.username {
                if self.users.find_by_username(&new_username).await?.is_some()
                    || self.otp.reservation_holder("username", &new_username).await?.is_some()
                {
                    return Err(AuthError::Conflict { field: "username" });
                }
                changes.username = Some(new_username);
            }
        }

        if let Some(email) = request.email.map(|e| normalize_email(&e)) {
            if email != user.email {
                if self.users.find_by_email(&email).await?.is_some()
                    || self.has_live_registration(&email).await?
                {
                    return Err(AuthError::Conflict { field: "email" });
                }
                changes.email = Some(email);
            }
        }

        if let Some(phone) = request.phone.map(|p| p.trim().to_string()) {
            if !validation::is_valid_phone(&phone) {
                return Err(AuthError::InvalidPhone);
            }
            if phone != user.phone {
                if self.users.find_by_phone(&phone).await?.is_some()
                    || self.otp.reservation_holder("phone", &phone).await?.is_some()
                {
                    return Err(AuthError::Conflict { field: "phone" });
                }
                changes.phone = Some(phone);
            }
        }

        if let Some(full_name) = request.full_name {
            changes.full_name = Some(full_name.trim().to_string());
        }

        if let Some(new_password) = request.new_password {
            let old_password = request.old_password.ok_or_else(|| {
                AuthError::BadRequest("old_password is required to change the password".to_string())
            })?;
            if !PasswordService::verify_password(&old_password, &user.password_hash) {
                return Err(AuthError::InvalidCredentials);
            }
            PasswordService::validate_password_strength(&new_password)?;
            changes.password_hash = Some(PasswordService::hash_password(&new_password)?);
        }

        let updated = self.users.update_profile(user.id, changes).await?;

        let token = if is_self {
            self.tokens
                .generate_profile_token(&updated.username, updated.role)?
        } else {
            self.tokens.generate_profile_token(&caller.sub, caller.role)?
        };

        info!(username = %updated.username, by = %caller.sub, "profile updated");
        Ok((updated, token))
    }

    pub(crate) async fn require_user_by_email(&self, email: &str) -> Result<User, AuthError> {
        self.users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AuthError::NotFound("User with this email".to_string()))
    }

    /// The provisional fields of `email`'s registration are not owned by an
    /// account or held by another live registration
    async fn ensure_still_available(
        &self,
        email: &str,
        registration: &ProvisionalUser,
    ) -> Result<(), AuthError> {
        let held_elsewhere = |holder: Option<String>| holder.is_some_and(|holder| holder != email);

        if self.users.find_by_username(&registration.username).await?.is_some()
            || held_elsewhere(
                self.otp
                    .reservation_holder("username", &registration.username)
                    .await?,
            )
        {
            return Err(AuthError::Conflict { field: "username" });
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AuthError::Conflict { field: "email" });
        }
        if self.users.find_by_phone(&registration.phone).await?.is_some()
            || held_elsewhere(self.otp.reservation_holder("phone", &registration.phone).await?)
        {
            return Err(AuthError::Conflict { field: "phone" });
        }
        Ok(())
    }

    /// A registration for this email is waiting on an unexpired code
    async fn has_live_registration(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self
            .otp
            .pending(OtpPurpose::VerifyAccount, email)
            .await?
            .is_some_and(|entry| {
                entry.registration.is_some() && !self.otp.is_expired(&entry, chrono::Utc::now())
            }))
    }
}
