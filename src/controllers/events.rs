//! Event catalog endpoints: browsing is public, writes need the organizer
//! permissions and only touch events the caller created.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{AppJson, AppPath, AppQuery, AuthUser};
use crate::models::user::Permission;
use crate::services::catalog::{BrowseQuery, CatalogService, CreateEvent, UpdateEvent};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/browse", get(list_events))
        .route("/events/admin/all", get(list_own_events))
        .route("/events/{id}/details", get(event_details))
        .route(
            "/events/{id}",
            get(get_event).put(update_event).delete(delete_event),
        )
}

/// GET /events
///
/// Published, active events. Accepts `search`, `category`, `startDate`,
/// `endDate`, `minPrice`, `maxPrice`, `location`, `page` and `limit`.
async fn list_events(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<BrowseQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = CatalogService::new(state).browse(&query).await?;
    Ok(Json(page))
}

async fn get_event(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let event = CatalogService::new(state).get(id).await?;
    Ok(Json(json!({ "event": event })))
}

/// GET /events/{id}/details
///
/// Event with its bookable seats and catalog-wide day grouping.
async fn event_details(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let details = CatalogService::new(state).details(id).await?;
    Ok(Json(json!({
        "message": "Event details fetched successfully",
        "event": details.event,
        "availableSeats": details.available_seats,
        "totalAvailableSeats": details.total_available_seats,
        "popularity": details.popularity,
        "groupedEvents": details.grouped_events,
    })))
}

/// GET /events/admin/all
async fn list_own_events(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let events = CatalogService::new(state).created_by(&user).await?;
    Ok(Json(json!({
        "message": "Events fetched successfully",
        "count": events.len(),
        "events": events,
    })))
}

async fn create_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<CreateEvent>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CreateEvent)?;
    let created = CatalogService::new(state).create(&user, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Event created successfully with automatic seat generation",
            "event": created.event,
            "seatsGenerated": created.seats_generated,
        })),
    ))
}

async fn update_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateEvent>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::UpdateEvent)?;
    let event = CatalogService::new(state).update(id, &user, req).await?;
    Ok(Json(json!({ "message": "Event updated successfully", "event": event })))
}

async fn delete_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::DeleteEvent)?;
    let deleted = CatalogService::new(state).delete(id, &user).await?;
    Ok(Json(json!({
        "message": "Event deleted successfully",
        "cancelledBookings": deleted.cancelled_bookings,
        "deletedSeats": deleted.deleted_seats,
    })))
}
