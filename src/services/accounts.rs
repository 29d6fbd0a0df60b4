//! Accounts: sign-up, password login, token refresh and revocation, and
//! profile maintenance.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{info, warn};
use validator::{Validate, ValidationError};

use crate::error::AppError;
use crate::middleware::{
    decode_token, encode_refresh_token, encode_token, AuthSession, AuthUser, TokenKind,
};
use crate::models::{
    user::{Gender, NewUser, Role},
    User,
};
use crate::AppState;

const SPECIAL_CHARACTERS: &str = "@$!%*#?&^._-";

fn validate_name(value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c == ' ' || c == '\'' || c == '-')
    {
        Ok(())
    } else {
        Err(ValidationError::new("pattern").with_message(Cow::Borrowed(
            "Name may contain only letters, spaces, apostrophes, and dashes",
        )))
    }
}

fn validate_password(value: &str) -> Result<(), ValidationError> {
    let strong = value.chars().count() >= 8
        && value.chars().any(|c| c.is_ascii_alphabetic())
        && value.chars().any(|c| c.is_ascii_digit())
        && value.chars().any(|c| SPECIAL_CHARACTERS.contains(c));
    if strong {
        Ok(())
    } else {
        Err(ValidationError::new("pattern").with_message(Cow::Borrowed(
            "Password must contain at least 8 characters, including one letter, one number, and one special character",
        )))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignUp {
    #[validate(
        length(min = 2, max = 25, message = "First name must be 2-25 characters"),
        custom(function = "validate_name")
    )]
    pub first_name: String,
    #[validate(
        length(min = 2, max = 25, message = "Last name must be 2-25 characters"),
        custom(function = "validate_name")
    )]
    pub last_name: String,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(custom(function = "validate_password"))]
    pub password: String,
    pub gender: Gender,
    #[validate(range(min = 18, max = 100, message = "Age must be between 18 and 100"))]
    pub age: i32,
    /// Only honored when an admin creates the account.
    #[serde(default)]
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Login {
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters long"))]
    pub password: String,
}

/// Partial profile change; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[validate(
        length(min = 2, max = 25, message = "First name must be 2-25 characters"),
        custom(function = "validate_name")
    )]
    pub first_name: Option<String>,
    #[validate(
        length(min = 2, max = 25, message = "Last name must be 2-25 characters"),
        custom(function = "validate_name")
    )]
    pub last_name: Option<String>,
    #[validate(email(message = "Email must be a valid email address"))]
    pub email: Option<String>,
    #[validate(custom(function = "validate_password"))]
    pub password: Option<String>,
    pub gender: Option<Gender>,
    #[validate(range(min = 18, max = 100, message = "Age must be between 18 and 100"))]
    pub age: Option<i32>,
    pub role: Option<Role>,
}

impl UpdateProfile {
    fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.password.is_none()
            && self.gender.is_none()
            && self.age.is_none()
            && self.role.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoggedIn {
    pub accesstoken: String,
    pub refreshtoken: String,
    pub user: User,
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// bcrypt runs on the blocking pool.
pub async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

pub async fn verify_password(password: String, hash: String) -> Result<bool, AppError> {
    let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password check task failed: {}", e)))?;
    match verified {
        Ok(matches) => Ok(matches),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            Ok(false)
        }
    }
}

pub struct AccountService {
    state: Arc<AppState>,
}

impl AccountService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn access_ttl(&self) -> Duration {
        Duration::hours(self.state.config.jwt.expires_in_hours)
    }

    /// Creates an account. `role` is applied only for admin-created accounts;
    /// public sign-ups are always regular users.
    pub async fn sign_up(&self, req: SignUp, allow_role: bool) -> Result<User, AppError> {
        req.validate()?;
        let role = if allow_role {
            req.role.unwrap_or(Role::User)
        } else {
            Role::User
        };
        let email = normalize_email(&req.email);
        if self.state.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already exists".to_string()));
        }

        let password_hash = hash_password(req.password, self.state.config.jwt.bcrypt_cost).await?;
        let user = self
            .state
            .users
            .create(
                NewUser {
                    first_name: req.first_name.trim().to_string(),
                    last_name: req.last_name.trim().to_string(),
                    email,
                    password_hash,
                    gender: req.gender,
                    age: req.age,
                    role,
                },
                self.state.now(),
            )
            .await?;
        info!("User {} signed up as {:?}", user.id, user.role);
        Ok(user)
    }

    pub async fn login(&self, req: Login) -> Result<LoggedIn, AppError> {
        req.validate()?;
        let invalid = || AppError::Unauthorized("Invalid email or password".to_string());
        let user = self
            .state
            .users
            .find_by_email(&normalize_email(&req.email))
            .await?
            .ok_or_else(invalid)?;
        if !user.is_active {
            return Err(AppError::Forbidden("Account is deactivated".to_string()));
        }
        if !verify_password(req.password, user.password_hash.clone()).await? {
            return Err(invalid());
        }

        let now = self.state.now();
        self.state.users.record_login(user.id, now).await?;
        let secret = &self.state.config.jwt.secret;
        let accesstoken = encode_token(user.id, user.role, secret, self.access_ttl())?;
        let refreshtoken = encode_refresh_token(
            user.id,
            user.role,
            secret,
            Duration::hours(self.state.config.jwt.refresh_expires_in_hours),
        )?;
        info!("User {} logged in", user.id);

        Ok(LoggedIn {
            accesstoken,
            refreshtoken,
            user: User {
                last_login: Some(now),
                ..user
            },
        })
    }

    /// Issues a new access token, re-reading the user's current role.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, AppError> {
        let claims = decode_token(refresh_token, &self.state.config.jwt.secret, TokenKind::Refresh)?;
        let user = self
            .state
            .users
            .find_by_id(claims.sub)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;
        encode_token(user.id, user.role, &self.state.config.jwt.secret, self.access_ttl())
    }

    pub async fn logout(&self, session: &AuthSession) -> Result<(), AppError> {
        self.state
            .users
            .revoke_token(session.claims.jti, session.user.user_id, session.claims.expires_at())
            .await?;
        info!("User {} logged out", session.user.user_id);
        Ok(())
    }

    pub async fn profile(&self, user_id: uuid::Uuid) -> Result<User, AppError> {
        self.state
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User not found"))
    }

    pub async fn update_profile(&self, actor: &AuthUser, req: UpdateProfile) -> Result<User, AppError> {
        req.validate()?;
        if req.is_empty() {
            return Err(AppError::validation("body", "At least one field must be provided"));
        }
        if req.role.is_some() && actor.role != Role::Admin {
            return Err(AppError::Forbidden("Only admins can change user roles".to_string()));
        }

        let mut user = self.profile(actor.user_id).await?;
        if let Some(email) = req.email {
            let email = normalize_email(&email);
            if email != user.email && self.state.users.find_by_email(&email).await?.is_some() {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
            user.email = email;
        }
        if let Some(first_name) = req.first_name {
            user.first_name = first_name.trim().to_string();
        }
        if let Some(last_name) = req.last_name {
            user.last_name = last_name.trim().to_string();
        }
        if let Some(gender) = req.gender {
            user.gender = gender;
        }
        if let Some(age) = req.age {
            user.age = age;
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(password) = req.password {
            user.password_hash = hash_password(password, self.state.config.jwt.bcrypt_cost).await?;
        }

        let updated = self.state.users.update(&user).await?;
        info!("User {} updated their profile", updated.id);
        Ok(updated)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.state.users.list_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Fixture;

    fn sign_up(email: &str) -> SignUp {
        SignUp {
            first_name: "Grace".to_string(),
            last_name: "O'Neil".to_string(),
            email: email.to_string(),
            password: "Secur3!pass".to_string(),
            gender: Gender::Female,
            age: 34,
            role: Some(Role::Admin),
        }
    }

    fn login(email: &str, password: &str) -> Login {
        Login {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn public_sign_up_ignores_requested_role() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());

        let user = service.sign_up(sign_up("Grace@Example.com"), false).await.unwrap();
        assert_eq!(user.role, Role::User);
        assert_eq!(user.email, "grace@example.com");
        assert_ne!(user.password_hash, "Secur3!pass");

        let admin = service.sign_up(sign_up("root@example.com"), true).await.unwrap();
        assert_eq!(admin.role, Role::Admin);
    }

    #[tokio::test]
    async fn duplicate_email_and_weak_password_are_rejected() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());
        service.sign_up(sign_up("dup@example.com"), false).await.unwrap();

        let err = service.sign_up(sign_up("DUP@example.com"), false).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let mut weak = sign_up("weak@example.com");
        weak.password = "password".to_string();
        weak.age = 12;
        match service.sign_up(weak, false).await.unwrap_err() {
            AppError::Validation { errors, .. } => {
                let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
                assert_eq!(fields, vec!["age", "password"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn login_checks_password_and_records_last_login() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());
        service.sign_up(sign_up("login@example.com"), false).await.unwrap();

        let err = service.login(login("login@example.com", "Wrong!pass1")).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        let err = service.login(login("nobody@example.com", "Secur3!pass")).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");

        let session = service.login(login("LOGIN@example.com", "Secur3!pass")).await.unwrap();
        assert_eq!(session.user.last_login, Some(fx.state.now()));
        let claims = decode_token(&session.accesstoken, "test-secret", TokenKind::Access).unwrap();
        assert_eq!(claims.sub, session.user.id);

        let refreshed = service.refresh(&session.refreshtoken).await.unwrap();
        assert!(decode_token(&refreshed, "test-secret", TokenKind::Access).is_ok());
        assert!(service.refresh(&session.accesstoken).await.is_err());
    }

    #[tokio::test]
    async fn deactivated_accounts_cannot_log_in() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());
        let mut user = service.sign_up(sign_up("off@example.com"), false).await.unwrap();
        user.is_active = false;
        fx.state.users.update(&user).await.unwrap();

        let err = service.login(login("off@example.com", "Secur3!pass")).await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn logout_revokes_the_presented_token() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());
        let session = AuthSession {
            user: Fixture::auth(&fx.user),
            claims: crate::middleware::Claims {
                sub: fx.user.id,
                role: Role::User,
                jti: uuid::Uuid::new_v4(),
                exp: (fx.state.now() + Duration::hours(1)).timestamp(),
                typ: TokenKind::Access,
            },
        };

        service.logout(&session).await.unwrap();
        assert!(fx.state.users.is_token_revoked(session.claims.jti).await.unwrap());

        let purged = fx
            .state
            .users
            .purge_revoked_tokens(fx.state.now() + Duration::hours(2))
            .await
            .unwrap();
        assert_eq!(purged, 1);
    }

    #[tokio::test]
    async fn profile_updates_respect_roles_and_unique_email() {
        let fx = Fixture::new().await;
        let service = AccountService::new(fx.state.clone());
        let me = Fixture::auth(&fx.user);

        let err = service
            .update_profile(
                &me,
                UpdateProfile {
                    role: Some(Role::Admin),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = service
            .update_profile(
                &me,
                UpdateProfile {
                    email: Some(fx.other.email.clone()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = service.update_profile(&me, UpdateProfile::default()).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let updated = service
            .update_profile(
                &me,
                UpdateProfile {
                    first_name: Some("Una".to_string()),
                    age: Some(41),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.first_name, "Una");
        assert_eq!(updated.age, 41);
        assert_eq!(updated.email, fx.user.email);
    }
}
