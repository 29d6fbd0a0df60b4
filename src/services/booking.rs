use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::{NewBooking, PaymentMethod},
    event::EventStatus,
    notification::{NotificationDraft, NotificationType},
    seat::SeatCategory,
    EventBooking, Seat,
};
use crate::services::reservation::check_selection;
use crate::AppState;

const CANNOT_BOOK: &str =
    "Cannot book tickets. Event may be sold out, inactive, or past booking deadline.";

#[derive(Debug, Clone)]
pub struct BookEvent {
    pub number_of_tickets: i32,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
    pub selected_seats: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedSeat {
    pub row_number: i32,
    pub seat_number: i32,
    pub category: SeatCategory,
    pub price: f64,
}

impl From<&Seat> for BookedSeat {
    fn from(seat: &Seat) -> Self {
        Self {
            row_number: seat.row_number,
            seat_number: seat.seat_number,
            category: seat.category,
            price: seat.final_price,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookedEvent {
    pub id: Uuid,
    pub title: String,
    pub available_seats: i32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingConfirmation {
    pub booking: EventBooking,
    pub selected_seats: Vec<BookedSeat>,
    pub event: BookedEvent,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummary {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub price: f64,
    pub status: EventStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingWithEvent {
    #[serde(flatten)]
    pub booking: EventBooking,
    /// `None` once the event has been deleted.
    pub event: Option<EventSummary>,
}

pub struct BookingService {
    state: Arc<AppState>,
}

impl BookingService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Confirms a booking of `number_of_tickets` for `user_id`, converting any
    /// seats the user holds into paid seats.
    pub async fn book(&self, event_id: Uuid, user_id: Uuid, req: BookEvent) -> Result<BookingConfirmation, AppError> {
        let max = self.state.config.booking.max_tickets_per_booking;
        if !(1..=max).contains(&req.number_of_tickets) {
            return Err(AppError::validation(
                "numberOfTickets",
                format!("Number of tickets must be between 1 and {}", max),
            ));
        }

        let now = self.state.now();
        let event = self
            .state
            .events
            .find_by_id(event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| AppError::not_found("Event not found"))?;

        let mut held: Vec<Seat> = Vec::new();
        if let Some(seat_ids) = &req.selected_seats {
            check_selection(seat_ids, req.number_of_tickets)?;
            held = self
                .state
                .seats
                .held_by(event_id, seat_ids, user_id, now)
                .await?;
            if held.len() != seat_ids.len() {
                return Err(AppError::state(
                    "Some selected seats are not reserved by you or have expired",
                ));
            }
        }

        if !event.can_book(req.number_of_tickets, now) {
            return Err(AppError::state(CANNOT_BOOK));
        }

        if self
            .state
            .bookings
            .find_by_event_and_user(event_id, user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "You already have a booking for this event".to_string(),
            ));
        }

        let booking = self
            .state
            .bookings
            .create(
                NewBooking {
                    event_id,
                    user_id,
                    number_of_tickets: req.number_of_tickets,
                    total_amount: event.price * req.number_of_tickets as f64,
                    payment_method: req.payment_method,
                    special_requests: req.special_requests,
                },
                now,
            )
            .await?;

        let event = match self
            .state
            .events
            .adjust_bookings(event_id, req.number_of_tickets)
            .await
        {
            Ok(Some(event)) => event,
            outcome => {
                // Counter update lost the capacity race: undo the booking
                if let Err(e) = &outcome {
                    error!("Booking counter update failed for event {}: {}", event_id, e);
                }
                if let Err(e) = self.state.bookings.discard(booking.id).await {
                    error!("Failed to discard booking {}: {}", booking.id, e);
                }
                outcome?;
                warn!("Event {} filled up while booking {} was created", event_id, booking.id);
                return Err(AppError::state(CANNOT_BOOK));
            }
        };

        if !held.is_empty() {
            let ids: Vec<Uuid> = held.iter().map(|s| s.id).collect();
            match self
                .state
                .seats
                .finalize(&ids, user_id, now, Some(booking.id))
                .await
            {
                Ok(n) if n as usize == ids.len() => {}
                Ok(n) => warn!(
                    "Only {} of {} seats finalized for booking {}",
                    n,
                    ids.len(),
                    booking.id
                ),
                Err(e) => error!("Failed to finalize seats for booking {}: {}", booking.id, e),
            }
            self.state.cache.invalidate(event_id).await;
        }

        info!(
            "User {} booked {} ticket(s) for event {} (booking {})",
            user_id, booking.number_of_tickets, event_id, booking.id
        );
        self.state.notifier.notify(
            user_id,
            NotificationDraft::new(
                NotificationType::BookingConfirmed,
                "Booking confirmed",
                format!(
                    "Your booking of {} ticket(s) for \"{}\" has been received.",
                    booking.number_of_tickets, event.title
                ),
            )
            .for_event(event.id, &event.title)
            .action_url(format!("/events/{}", event.id)),
        );

        Ok(BookingConfirmation {
            selected_seats: held.iter().map(BookedSeat::from).collect(),
            event: BookedEvent {
                id: event.id,
                title: event.title.clone(),
                available_seats: event.available_seats(),
            },
            booking,
        })
    }

    async fn attach_events(&self, bookings: Vec<EventBooking>) -> Result<Vec<BookingWithEvent>, AppError> {
        let mut ids: Vec<Uuid> = bookings.iter().map(|b| b.event_id).collect();
        ids.sort();
        ids.dedup();
        let events: HashMap<Uuid, EventSummary> = self
            .state
            .events
            .find_many(&ids)
            .await?
            .into_iter()
            .map(|e| {
                (
                    e.id,
                    EventSummary {
                        id: e.id,
                        title: e.title,
                        date: e.date,
                        location: e.location,
                        price: e.price,
                        status: e.status,
                    },
                )
            })
            .collect();

        Ok(bookings
            .into_iter()
            .map(|booking| BookingWithEvent {
                event: events.get(&booking.event_id).cloned(),
                booking,
            })
            .collect())
    }

    pub async fn my_bookings(&self, user_id: Uuid) -> Result<Vec<BookingWithEvent>, AppError> {
        let bookings = self.state.bookings.list_by_user(user_id).await?;
        self.attach_events(bookings).await
    }

    pub async fn event_bookings(&self, event_id: Uuid) -> Result<Vec<EventBooking>, AppError> {
        if self.state.events.find_by_id(event_id).await?.is_none() {
            return Err(AppError::not_found("Event not found"));
        }
        self.state.bookings.list_by_event(event_id).await
    }

    pub async fn all_bookings(&self) -> Result<Vec<BookingWithEvent>, AppError> {
        let bookings = self.state.bookings.list_all().await?;
        self.attach_events(bookings).await
    }
}
