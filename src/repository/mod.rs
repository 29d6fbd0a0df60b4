//! Storage ports. Every method is a single atomic write or read; no
//! operation spans more than one record kind.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    event::{NewEvent, SeatingLayout},
    notification::NotificationDraft,
    seat::NewSeat,
    booking::NewBooking,
    ticket::{NewPayment, NewTicket, TicketStatus},
    user::NewUser,
    Event, EventBooking, Notification, Payment, Seat, Ticket, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait EventRepository: Send + Sync {
    async fn create(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError>;
    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>, AppError>;
    /// Active, published events ordered by date.
    async fn list_published(&self) -> Result<Vec<Event>, AppError>;
    /// Every stored event regardless of status, ordered by date.
    async fn list_all(&self) -> Result<Vec<Event>, AppError>;
    /// Writes the editable fields. `current_bookings` and `status` are left
    /// to [`EventRepository::adjust_bookings`].
    async fn update(&self, event: &Event) -> Result<Event, AppError>;
    async fn set_seating_layout(&self, id: Uuid, layout: SeatingLayout) -> Result<(), AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
    /// Applies `delta` to `current_bookings` in one conditional update.
    ///
    /// A positive delta only applies while the result stays within capacity;
    /// a negative one floors at zero. Reaching capacity flips the status to
    /// `sold_out`. Returns `None` when the event is missing or the increment
    /// would overflow capacity.
    async fn adjust_bookings(&self, id: Uuid, delta: i32) -> Result<Option<Event>, AppError>;
}

#[async_trait]
pub trait SeatRepository: Send + Sync {
    /// Inserts every seat or none of them. A duplicate position is a Conflict.
    async fn insert_many(&self, seats: Vec<NewSeat>, now: DateTime<Utc>) -> Result<u64, AppError>;
    async fn insert(&self, seat: NewSeat, now: DateTime<Utc>) -> Result<Seat, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Seat>, AppError>;
    async fn find_in_event(&self, event_id: Uuid, ids: &[Uuid]) -> Result<Vec<Seat>, AppError>;
    /// Active seats ordered by row, then seat.
    async fn list_active_by_event(&self, event_id: Uuid) -> Result<Vec<Seat>, AppError>;
    async fn count_by_event(&self, event_id: Uuid) -> Result<i64, AppError>;
    /// Compare-and-swap hold. Succeeds only if the seat is active and either
    /// available or holding an elapsed reservation at write time.
    async fn try_reserve(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<Option<Seat>, AppError>;
    /// Clears a hold owned by `user_id`. Returns the released seat.
    async fn release_hold(&self, seat_id: Uuid, user_id: Uuid) -> Result<Option<Seat>, AppError>;
    /// Seats among `ids` held by `user_id` with an unexpired hold.
    async fn held_by(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Seat>, AppError>;
    /// Moves unexpired holds of `user_id` to `paid`, clearing hold fields.
    async fn finalize(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
        booking_id: Option<Uuid>,
    ) -> Result<u64, AppError>;
    /// Reverts seats finalized into a booking back to `available`.
    async fn release_booking_seats(&self, booking_id: Uuid) -> Result<u64, AppError>;
    /// Reverts every elapsed hold. Returns the events touched.
    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AppError>;
    async fn update(&self, seat: &Seat) -> Result<Seat, AppError>;
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
    async fn delete_by_event(&self, event_id: Uuid) -> Result<u64, AppError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// A second booking for the same (event, user) is a Conflict.
    async fn create(&self, booking: NewBooking, now: DateTime<Utc>) -> Result<EventBooking, AppError>;
    async fn find_by_event_and_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventBooking>, AppError>;
    /// Conditional transition to `cancelled`; `None` if no longer cancellable.
    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EventBooking>, AppError>;
    /// Cancels every pending or confirmed booking of an event.
    async fn cancel_active_for_event(
        &self,
        event_id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventBooking>, AppError>;
    /// Removes a booking whose counter increment lost the capacity race.
    async fn discard(&self, id: Uuid) -> Result<(), AppError>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>, AppError>;
    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>, AppError>;
    async fn list_all(&self) -> Result<Vec<EventBooking>, AppError>;
}

/// Outcome of a ticket insert.
#[derive(Debug)]
pub enum TicketInsert {
    Created(Ticket),
    /// The booking reference is already used by another ticket.
    ReferenceTaken,
    /// The seat already has an active or used ticket.
    SeatTaken,
}

#[async_trait]
pub trait TicketRepository: Send + Sync {
    /// Inserts the ticket unless its reference or its seat is already taken.
    async fn create(&self, ticket: NewTicket, now: DateTime<Utc>) -> Result<TicketInsert, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError>;
    /// The active or used ticket issued for a seat, if any.
    async fn find_live_by_seat(&self, seat_id: Uuid) -> Result<Option<Ticket>, AppError>;
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError>;
    async fn list_all(&self) -> Result<Vec<Ticket>, AppError>;
    async fn set_status(&self, id: Uuid, status: TicketStatus) -> Result<Option<Ticket>, AppError>;
    /// Tickets created within the optional bounds, oldest first.
    async fn list_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, AppError>;
    /// Stores the QR payload unless one is already set; returns the stored one.
    async fn set_qr_code(&self, id: Uuid, qr_code: &str) -> Result<String, AppError>;
    async fn record_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment, AppError>;
    async fn find_completed_payment(&self, ticket_id: Uuid) -> Result<Option<Payment>, AppError>;
    async fn list_completed_payments(&self) -> Result<Vec<Payment>, AppError>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(
        &self,
        user_id: Uuid,
        draft: &NotificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Notification, AppError>;
    /// Newest first.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError>;
    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError>;
    /// Returns how many notifications were flipped to read.
    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError>;
    async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// A taken email is a Conflict.
    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, AppError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError>;
    /// Emails are stored lower-cased; callers pass them normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;
    async fn list_all(&self) -> Result<Vec<User>, AppError>;
    async fn list_active_ids(&self) -> Result<Vec<Uuid>, AppError>;
    /// Writes the profile fields, role and password hash. A taken email is a Conflict.
    async fn update(&self, user: &User) -> Result<User, AppError>;
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
    /// Blacklists an access token id until it would have expired anyway.
    async fn revoke_token(&self, jti: Uuid, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, AppError>;
    /// Drops blacklist entries whose tokens have expired.
    async fn purge_revoked_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError>;
}
