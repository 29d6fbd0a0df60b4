//! Account endpoints. Sign-up, login and refresh are public; the rest need
//! an access token, and `/users` plus `/users/add` are admin-only.

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{AppJson, AuthSession, AuthUser, REFRESH_TOKEN_HEADER};
use crate::services::accounts::{AccountService, Login, SignUp, UpdateProfile};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/signup", post(sign_up))
        .route("/users/login", post(login))
        .route("/users/refresh-token", post(refresh_token))
        .route("/users/logout", post(logout))
        .route("/users/profile", get(profile))
        .route("/users/update", put(update_profile))
        .route("/users/add", post(add_user))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<SignUp>,
) -> Result<impl IntoResponse, AppError> {
    let user = AccountService::new(state).sign_up(req, false).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully", "user": user })),
    ))
}

async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<Login>,
) -> Result<impl IntoResponse, AppError> {
    let session = AccountService::new(state).login(req).await?;
    Ok(Json(json!({
        "message": "User signed in successfully",
        "accesstoken": session.accesstoken,
        "refreshtoken": session.refreshtoken,
        "user": session.user,
    })))
}

/// POST /users/refresh-token
///
/// Reads the refresh token from the `refreshtoken` header.
async fn refresh_token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Refresh token is required".to_string()))?;
    let accesstoken = AccountService::new(state).refresh(token).await?;
    Ok(Json(json!({
        "message": "Access token refreshed successfully",
        "accesstoken": accesstoken,
    })))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    session: AuthSession,
) -> Result<impl IntoResponse, AppError> {
    AccountService::new(state).logout(&session).await?;
    Ok(Json(json!({ "message": "User logged out successfully" })))
}

async fn profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let user = AccountService::new(state).profile(user.user_id).await?;
    Ok(Json(json!({ "user": user })))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<UpdateProfile>,
) -> Result<impl IntoResponse, AppError> {
    let user = AccountService::new(state).update_profile(&user, req).await?;
    Ok(Json(json!({ "message": "User updated successfully", "user": user })))
}

async fn add_user(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<SignUp>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let created = AccountService::new(state).sign_up(req, true).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User added successfully", "user": created })),
    ))
}

async fn list_users(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let users = AccountService::new(state).list_users().await?;
    Ok(Json(json!({ "message": "Users fetched successfully", "users": users })))
}
