use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, patch},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{AppPath, AuthUser};
use crate::services::notifications;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/mark-all-read", patch(mark_all_read))
        .route("/notifications/{id}/read", patch(mark_read))
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let list = notifications::list_for_user(state.notifications.as_ref(), user.user_id).await?;
    Ok(Json(json!({
        "message": "Notifications fetched successfully",
        "notifications": list,
    })))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let notification = notifications::mark_read(state.notifications.as_ref(), id, user.user_id).await?;
    Ok(Json(json!({ "message": "Notification marked as read", "notification": notification })))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let updated = notifications::mark_all_read(state.notifications.as_ref(), user.user_id).await?;
    Ok(Json(json!({ "message": "All notifications marked as read", "updated": updated })))
}

async fn unread_count(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let count = notifications::unread_count(state.notifications.as_ref(), user.user_id).await?;
    Ok(Json(json!({
        "message": "Unread notifications counted successfully",
        "unreadCount": count,
    })))
}
