//! Seat maps, seat administration and the standalone hold/release endpoints.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::bookings::{seat_ids, SeatRef};
use crate::error::AppError;
use crate::middleware::{AppJson, AppPath, AuthUser};
use crate::models::{
    seat::{SeatCategory, SeatStatus},
    user::Permission,
};
use crate::services::{
    inventory::{GenerateSeats, InventoryService, NewSeatRequest, PricingMode, SeatChanges},
    reservation::ReservationService,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/{id}/seats", get(seat_map).post(create_seat))
        .route("/events/{id}/seats/generate", post(generate_flat))
        .route("/seats/event/{event_id}", get(seat_map).post(create_seat))
        .route("/seats/event/{event_id}/generate", post(generate_tiered))
        .route("/seats/select", post(select_seats))
        .route("/seats/release", post(release_seats))
        .route("/seats/{seat_id}", put(update_seat).delete(delete_seat))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub rows: i32,
    pub seats_per_row: i32,
    pub base_price: Option<f64>,
    pub final_price: Option<f64>,
    pub category: Option<SeatCategory>,
}

impl GenerateRequest {
    fn with_mode(self, mode: PricingMode) -> GenerateSeats {
        GenerateSeats {
            rows: self.rows,
            seats_per_row: self.seats_per_row,
            base_price: self.base_price,
            final_price: self.final_price,
            category: self.category,
            mode,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSeatRequest {
    pub row_number: i32,
    pub seat_number: i32,
    pub base_price: Option<f64>,
    pub category: Option<SeatCategory>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub is_accessible: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSeatRequest {
    pub row_number: Option<i32>,
    pub seat_number: Option<i32>,
    pub status: Option<SeatStatus>,
    pub base_price: Option<f64>,
    pub category: Option<SeatCategory>,
    pub features: Option<Vec<String>>,
    pub is_accessible: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    pub event_id: Uuid,
    pub selected_seats: Vec<SeatRef>,
    pub number_of_tickets: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseRequest {
    #[serde(default)]
    pub seat_ids: Vec<Uuid>,
}

/// GET /events/{id}/seats and GET /seats/event/{event_id}
async fn seat_map(
    State(state): State<Arc<AppState>>,
    AppPath(event_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let body = InventoryService::new(state).seat_map_json(event_id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

async fn create_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(event_id): AppPath<Uuid>,
    AppJson(req): AppJson<CreateSeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CreateEvent)?;
    let seat = InventoryService::new(state)
        .create_seat(
            event_id,
            NewSeatRequest {
                row_number: req.row_number,
                seat_number: req.seat_number,
                base_price: req.base_price,
                category: req.category,
                features: req.features,
                is_accessible: req.is_accessible,
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Seat created successfully", "seat": seat })),
    ))
}

async fn generate(
    state: Arc<AppState>,
    user: AuthUser,
    event_id: Uuid,
    req: GenerateRequest,
    mode: PricingMode,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CreateEvent)?;
    let summary = InventoryService::new(state)
        .generate(event_id, req.with_mode(mode))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": format!("{} seats generated successfully", summary.seats_generated),
            "eventId": summary.event_id,
            "seatsGenerated": summary.seats_generated,
            "rows": summary.rows,
            "seatsPerRow": summary.seats_per_row,
        })),
    ))
}

/// POST /events/{id}/seats/generate: one price for every seat.
async fn generate_flat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(event_id): AppPath<Uuid>,
    AppJson(req): AppJson<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    generate(state, user, event_id, req, PricingMode::Flat).await
}

/// POST /seats/event/{event_id}/generate: premium and vip front rows.
async fn generate_tiered(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(event_id): AppPath<Uuid>,
    AppJson(req): AppJson<GenerateRequest>,
) -> Result<impl IntoResponse, AppError> {
    generate(state, user, event_id, req, PricingMode::Tiered).await
}

async fn update_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(seat_id): AppPath<Uuid>,
    AppJson(req): AppJson<UpdateSeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::UpdateEvent)?;
    let changes = SeatChanges {
        row_number: req.row_number,
        seat_number: req.seat_number,
        status: req.status,
        base_price: req.base_price,
        category: req.category,
        features: req.features,
        is_accessible: req.is_accessible,
        is_active: req.is_active,
    };
    let seat = InventoryService::new(state).update_seat(seat_id, &user, changes).await?;
    Ok(Json(json!({ "message": "Seat updated successfully", "seat": seat })))
}

async fn delete_seat(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(seat_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::DeleteEvent)?;
    InventoryService::new(state).delete_seat(seat_id, &user).await?;
    Ok(Json(json!({ "message": "Seat deleted successfully" })))
}

async fn select_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<SelectRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::BookEvent)?;
    let reservation = ReservationService::new(state)
        .reserve(
            req.event_id,
            user.user_id,
            &seat_ids(&req.selected_seats),
            req.number_of_tickets,
        )
        .await?;
    Ok(Json(json!({
        "message": "Seats reserved successfully",
        "reservedSeats": reservation.reserved_seats,
        "totalPrice": reservation.total_price,
        "reservationExpiry": reservation.reservation_expiry,
    })))
}

async fn release_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppJson(req): AppJson<ReleaseRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::BookEvent)?;
    let released = ReservationService::new(state)
        .release(user.user_id, &req.seat_ids)
        .await?;
    Ok(Json(json!({
        "message": format!("{} seats released successfully", released),
        "releasedSeats": released,
    })))
}
