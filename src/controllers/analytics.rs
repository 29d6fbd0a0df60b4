//! Admin reporting over purchases, users and the catalog.

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::middleware::{AppQuery, AuthUser};
use crate::services::analytics::{self, ExportQuery};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/analytics/summary", get(summary))
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/demographics", get(demographics))
        .route("/analytics/export", get(export))
}

/// GET /analytics/summary
async fn summary(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(analytics::summary(&state).await?))
}

async fn dashboard(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(analytics::dashboard(&state).await?))
}

async fn demographics(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    Ok(Json(analytics::demographics(&state).await?))
}

/// GET /analytics/export?type=tickets&startDate=..&endDate=..
async fn export(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppQuery(query): AppQuery<ExportQuery>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let body = analytics::export_tickets_csv(&state, &query).await?;
    let filename = format!(
        "attachment; filename=\"tickets-report-{}.csv\"",
        state.now().format("%Y%m%d%H%M%S")
    );
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, filename),
        ],
        body,
    ))
}
