use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    seat::{SeatCategory, SeatStatus},
    ticket::{booking_reference, NewPayment, NewTicket, TicketStatus, TransactionStatus},
    Payment, Seat, Ticket,
};
use crate::repository::TicketInsert;
use crate::services::payment::{PaymentDetails, SimulatedGateway};
use crate::AppState;

const REFERENCE_ATTEMPTS: usize = 5;
const SEAT_TICKETED: &str = "A ticket has already been issued for this seat";
const QR_PREFIX: &str = "data:application/json;base64,";

#[derive(Debug, Clone, Serialize)]
pub struct PaidTicket {
    pub payment: Payment,
    pub ticket: Ticket,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketEvent {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSeat {
    pub id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub category: SeatCategory,
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketDetails {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub event: Option<TicketEvent>,
    pub seat: Option<TicketSeat>,
}

/// QR payload identifying a ticket at the door.
pub fn qr_payload(ticket: &Ticket, seat: &Seat) -> String {
    let body = json!({
        "ticketId": ticket.id,
        "bookingReference": ticket.booking_reference,
        "eventId": ticket.event_id,
        "seatInfo": format!("Row {}, Seat {}", seat.row_number, seat.seat_number),
    });
    format!("{}{}", QR_PREFIX, general_purpose::STANDARD.encode(body.to_string()))
}

pub struct TicketService {
    state: Arc<AppState>,
    gateway: SimulatedGateway,
}

impl TicketService {
    pub fn new(state: Arc<AppState>) -> Self {
        let gateway = SimulatedGateway::new(&state.config.payment);
        Self { state, gateway }
    }

    async fn owned_ticket(&self, ticket_id: Uuid, user_id: Uuid) -> Result<Ticket, AppError> {
        let ticket = self
            .state
            .tickets
            .find_by_id(ticket_id)
            .await?
            .ok_or_else(|| AppError::not_found("Ticket not found"))?;
        if ticket.user_id != user_id {
            return Err(AppError::Forbidden(
                "Access denied. This ticket belongs to another user.".to_string(),
            ));
        }
        Ok(ticket)
    }

    /// Holds the seat for the buyer and issues an unpaid ticket at the seat's price.
    pub async fn create(&self, event_id: Uuid, seat_id: Uuid, user_id: Uuid) -> Result<Ticket, AppError> {
        self.state
            .events
            .find_by_id(event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| AppError::not_found("Event not found or inactive"))?;

        let now = self.state.now();
        let seat = self
            .state
            .seats
            .find_by_id(seat_id)
            .await?
            .filter(|s| s.event_id == event_id && s.is_active)
            .ok_or_else(|| AppError::not_found("Seat not found"))?;

        if let Some(existing) = self.state.tickets.find_live_by_seat(seat_id).await? {
            let claimed = seat.is_reserved_by(existing.user_id, now)
                || seat.effective_status(now) == SeatStatus::Paid;
            if claimed && existing.user_id == user_id {
                return Err(AppError::Conflict(SEAT_TICKETED.to_string()));
            }
            if claimed {
                return Err(AppError::state("Seat not available"));
            }
            // Unpaid ticket whose hold lapsed
            self.state.tickets.set_status(existing.id, TicketStatus::Cancelled).await?;
            info!("Voided lapsed ticket {} for seat {}", existing.id, seat_id);
        }

        // A hold the buyer already owns is reused and kept if issuing fails
        let (held, grabbed) = if seat.is_reserved_by(user_id, now) {
            (seat, false)
        } else {
            let expiry = now + Duration::minutes(self.state.config.booking.reservation_minutes);
            let held = self
                .state
                .seats
                .try_reserve(seat_id, user_id, now, expiry)
                .await?
                .ok_or_else(|| AppError::state("Seat not available"))?;
            (held, true)
        };

        let issued = self.issue(event_id, user_id, &held, now).await;
        let ticket = match issued {
            Ok(ticket) => ticket,
            Err(e) => {
                if grabbed {
                    if let Err(release_err) = self.state.seats.release_hold(seat_id, user_id).await {
                        error!("Failed to release seat {}: {}", seat_id, release_err);
                    }
                }
                return Err(e);
            }
        };

        self.state.cache.invalidate(event_id).await;
        info!(
            "Ticket {} ({}) issued to {} for seat {}",
            ticket.id, ticket.booking_reference, user_id, seat_id
        );
        Ok(ticket)
    }

    /// Inserts the ticket, drawing a fresh reference on collision.
    async fn issue(&self, event_id: Uuid, user_id: Uuid, seat: &Seat, now: DateTime<Utc>) -> Result<Ticket, AppError> {
        for attempt in 1..=REFERENCE_ATTEMPTS {
            let inserted = self
                .state
                .tickets
                .create(
                    NewTicket {
                        event_id,
                        user_id,
                        seat_id: seat.id,
                        purchase_price: seat.final_price,
                        booking_reference: booking_reference(),
                    },
                    now,
                )
                .await?;
            match inserted {
                TicketInsert::Created(ticket) => return Ok(ticket),
                TicketInsert::SeatTaken => return Err(AppError::Conflict(SEAT_TICKETED.to_string())),
                TicketInsert::ReferenceTaken => {
                    warn!("Booking reference collision, retrying ({})", attempt);
                }
            }
        }
        Err(AppError::Internal("Could not allocate a unique booking reference".to_string()))
    }

    /// Charges the card and converts the seat hold into a paid seat.
    pub async fn pay(&self, ticket_id: Uuid, user_id: Uuid, details: PaymentDetails) -> Result<PaidTicket, AppError> {
        let ticket = self.owned_ticket(ticket_id, user_id).await?;
        if ticket.status != TicketStatus::Active {
            return Err(AppError::state("Ticket is not active"));
        }
        if self.state.tickets.find_completed_payment(ticket_id).await?.is_some() {
            return Err(AppError::Conflict("Ticket is already paid".to_string()));
        }

        let now = self.state.now();
        if self.state.seats.held_by(ticket.event_id, &[ticket.seat_id], user_id, now).await?.is_empty() {
            return Err(AppError::state("Seat reservation has expired"));
        }

        let charge = self.gateway.charge(ticket.purchase_price, &details).await?;

        let finalized = self
            .state
            .seats
            .finalize(&[ticket.seat_id], user_id, self.state.now(), None)
            .await?;
        if finalized != 1 {
            warn!("Seat {} hold lapsed during payment of ticket {}", ticket.seat_id, ticket_id);
            return Err(AppError::state("Seat reservation has expired"));
        }
        self.state.cache.invalidate(ticket.event_id).await;

        let payment = self
            .state
            .tickets
            .record_payment(
                NewPayment {
                    ticket_id,
                    user_id,
                    amount: ticket.purchase_price,
                    status: TransactionStatus::Completed,
                    payment_method: charge.method,
                    transaction_id: charge.transaction_id,
                },
                now,
            )
            .await?;
        info!("Ticket {} paid ({})", ticket_id, payment.transaction_id);
        Ok(PaidTicket { payment, ticket })
    }

    /// Returns the ticket's QR payload, storing it on first request.
    pub async fn qr_code(&self, ticket_id: Uuid, user_id: Uuid) -> Result<String, AppError> {
        let ticket = self.owned_ticket(ticket_id, user_id).await?;
        if let Some(existing) = ticket.qr_code {
            return Ok(existing);
        }
        let seat = self
            .state
            .seats
            .find_by_id(ticket.seat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Seat not found"))?;
        self.state.tickets.set_qr_code(ticket_id, &qr_payload(&ticket, &seat)).await
    }

    /// The user's tickets, newest first, with event and seat summaries.
    pub async fn my_tickets(&self, user_id: Uuid) -> Result<Vec<TicketDetails>, AppError> {
        let tickets = self.state.tickets.list_by_user(user_id).await?;

        let mut event_ids: Vec<Uuid> = tickets.iter().map(|t| t.event_id).collect();
        event_ids.sort();
        event_ids.dedup();
        let events: HashMap<Uuid, TicketEvent> = self
            .state
            .events
            .find_many(&event_ids)
            .await?
            .into_iter()
            .map(|e| {
                (
                    e.id,
                    TicketEvent {
                        id: e.id,
                        title: e.title,
                        date: e.date,
                        location: e.location,
                    },
                )
            })
            .collect();

        let mut details = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let seat = self
                .state
                .seats
                .find_by_id(ticket.seat_id)
                .await?
                .map(|s| TicketSeat {
                    id: s.id,
                    row_number: s.row_number,
                    seat_number: s.seat_number,
                    category: s.category,
                });
            details.push(TicketDetails {
                event: events.get(&ticket.event_id).cloned(),
                seat,
                ticket,
            });
        }
        Ok(details)
    }
}
