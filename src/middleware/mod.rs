use axum::{
    extract::{FromRequest, FromRequestParts},
    http::{header, request::Parts},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::user::{Permission, Role};
use crate::AppState;

/// Alternate header some clients send the bare token in.
pub const ACCESS_TOKEN_HEADER: &str = "accesstoken";

/// Header the refresh token is sent in.
pub const REFRESH_TOKEN_HEADER: &str = "refreshtoken";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub jti: Uuid,
    pub exp: i64,
    #[serde(default)]
    pub typ: TokenKind,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

fn sign(user_id: Uuid, role: Role, typ: TokenKind, secret: &str, ttl: Duration) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        role,
        jti: Uuid::new_v4(),
        exp: (Utc::now() + ttl).timestamp(),
        typ,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::Internal(format!("Token signing failed: {}", e)))
}

/// Signs an HS256 access token for `user_id`.
pub fn encode_token(user_id: Uuid, role: Role, secret: &str, ttl: Duration) -> Result<String, AppError> {
    sign(user_id, role, TokenKind::Access, secret, ttl)
}

pub fn encode_refresh_token(user_id: Uuid, role: Role, secret: &str, ttl: Duration) -> Result<String, AppError> {
    sign(user_id, role, TokenKind::Refresh, secret, ttl)
}

/// Verifies signature and expiry, and that the token is of the `expected` kind.
pub fn decode_token(token: &str, secret: &str, expected: TokenKind) -> Result<Claims, AppError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        debug!("Rejected token: {}", e);
        AppError::Unauthorized("Invalid or expired token".to_string())
    })?;
    if claims.typ != expected {
        return Err(AppError::Unauthorized("Invalid or expired token".to_string()));
    }
    Ok(claims)
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        return value.to_str().ok()?.strip_prefix("Bearer ").map(str::trim);
    }
    parts
        .headers
        .get(ACCESS_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

/// Authenticated caller, resolved from the access token and the user store.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "Access denied. Missing permission: {}",
                permission.as_str()
            )))
        }
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("Access denied. Admins only.".to_string()))
        }
    }
}

/// The caller together with the claims of the token it presented.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthUser,
    pub claims: Claims,
}

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized("Access token is required".to_string()))?;
        let claims = decode_token(token, &state.config.jwt.secret, TokenKind::Access)?;
        if state.users.is_token_revoked(claims.jti).await? {
            return Err(AppError::Unauthorized("Token has been revoked".to_string()));
        }

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AppError::Unauthorized("User not found".to_string()))?;
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is deactivated".to_string()));
        }

        Ok(AuthSession {
            user: AuthUser {
                user_id: user.id,
                email: user.email,
                role: user.role,
            },
            claims,
        })
    }
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        AuthSession::from_request_parts(parts, state)
            .await
            .map(|session| session.user)
    }
}

/// `Json` whose rejection renders as a validation error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct AppQuery<T>(pub T);
