//! Seat-level purchase path: ticket, simulated payment, QR payload.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::{AppJson, AppPath, AuthUser};
use crate::services::{payment::PaymentDetails, tickets::TicketService};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tickets/my-tickets", get(my_tickets))
        .route("/tickets/event/{event_id}/seat/{seat_id}", post(create_ticket))
        .route("/tickets/{ticket_id}/pay", post(pay_ticket))
        .route("/tickets/{ticket_id}/qr", get(ticket_qr))
}

async fn create_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath((event_id, seat_id)): AppPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = TicketService::new(state)
        .create(event_id, seat_id, user.user_id)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Ticket created successfully", "ticket": ticket })),
    ))
}

async fn pay_ticket(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(ticket_id): AppPath<Uuid>,
    AppJson(details): AppJson<PaymentDetails>,
) -> Result<impl IntoResponse, AppError> {
    let paid = TicketService::new(state)
        .pay(ticket_id, user.user_id, details)
        .await?;
    Ok(Json(json!({
        "message": "Payment processed successfully",
        "payment": paid.payment,
        "ticket": paid.ticket,
    })))
}

async fn ticket_qr(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    AppPath(ticket_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let qr_code = TicketService::new(state).qr_code(ticket_id, user.user_id).await?;
    Ok(Json(json!({ "message": "QR code generated successfully", "qrCode": qr_code })))
}

async fn my_tickets(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
) -> Result<impl IntoResponse, AppError> {
    let tickets = TicketService::new(state).my_tickets(user.user_id).await?;
    Ok(Json(json!({ "tickets": tickets })))
}
