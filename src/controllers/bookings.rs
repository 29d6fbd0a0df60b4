//! Seat holds, bookings and cancellations for an event, plus the booking
//! listings for users and admins.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::{AppJson, AppPath, AuthUser};
use crate::models::{booking::PaymentMethod, user::Permission};
use crate::services::{
    booking::{BookEvent, BookingService},
    cancellation::CancellationService,
    reservation::ReservationService,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events/my-bookings", get(my_bookings))
        .route("/events/admin/all-bookings", get(all_bookings))
        .route("/events/admin/{id}/bookings", get(event_bookings))
        .route("/events/{id}/seats/reserve", post(reserve_seats))
        .route("/events/{id}/book", post(book_event))
        .route("/events/{id}/cancel-booking", post(cancel_booking))
}

/// A selected seat, sent either as a bare id or as `{"seatId": ...}`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum SeatRef {
    Id(Uuid),
    Object {
        #[serde(rename = "seatId")]
        seat_id: Uuid,
    },
}

impl SeatRef {
    pub fn id(&self) -> Uuid {
        match self {
            SeatRef::Id(id) | SeatRef::Object { seat_id: id } => *id,
        }
    }
}

pub fn seat_ids(refs: &[SeatRef]) -> Vec<Uuid> {
    refs.iter().map(SeatRef::id).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveRequest {
    pub selected_seats: Vec<SeatRef>,
    pub number_of_tickets: i32,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub number_of_tickets: i32,
    pub payment_method: PaymentMethod,
    #[validate(length(max = 500, message = "Special requests cannot exceed 500 characters"))]
    pub special_requests: Option<String>,
    pub selected_seats: Option<Vec<SeatRef>>,
}

/// POST /events/{id}/seats/reserve
///
/// Holds the selected seats for the caller for the configured window.
async fn reserve_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<ReserveRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::BookEvent)?;
    let minutes = state.config.booking.reservation_minutes;
    let reservation = ReservationService::new(state)
        .reserve(id, user.user_id, &seat_ids(&req.selected_seats), req.number_of_tickets)
        .await?;
    Ok(Json(json!({
        "message": format!("Seats reserved successfully for {} minutes", minutes),
        "reservedSeats": reservation.reserved_seats,
        "totalPrice": reservation.total_price,
        "reservationExpiry": reservation.reservation_expiry,
        "nextStep": format!("Complete your booking within {} minutes", minutes),
    })))
}

async fn book_event(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<BookRequest>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::BookEvent)?;
    req.validate()?;
    let confirmation = BookingService::new(state)
        .book(
            id,
            user.user_id,
            BookEvent {
                number_of_tickets: req.number_of_tickets,
                payment_method: req.payment_method,
                special_requests: req.special_requests,
                selected_seats: req.selected_seats.as_deref().map(seat_ids),
            },
        )
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Event booked successfully",
            "booking": confirmation.booking,
            "selectedSeats": confirmation.selected_seats,
            "event": confirmation.event,
        })),
    ))
}

async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::CancelBooking)?;
    let booking = CancellationService::new(state).cancel(id, user.user_id).await?;
    Ok(Json(json!({ "message": "Booking cancelled successfully", "booking": booking })))
}

async fn my_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require(Permission::ViewBookings)?;
    let bookings = BookingService::new(state).my_bookings(user.user_id).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

async fn event_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let bookings = BookingService::new(state).event_bookings(id).await?;
    Ok(Json(json!({ "bookings": bookings })))
}

async fn all_bookings(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    user.require_admin()?;
    let bookings = BookingService::new(state).all_bookings().await?;
    Ok(Json(json!({ "bookings": bookings })))
}
