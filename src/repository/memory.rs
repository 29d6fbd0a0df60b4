//! Process-local store. One mutex guards every table, so each method is
//! atomic the same way a single-row SQL statement is.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    BookingRepository, EventRepository, NotificationRepository, SeatRepository, TicketInsert,
    TicketRepository, UserRepository,
};
use crate::error::AppError;
use crate::models::{
    booking::{BookingStatus, NewBooking},
    event::{EventStatus, NewEvent, SeatingLayout},
    notification::NotificationDraft,
    seat::{NewSeat, SeatStatus},
    ticket::{NewPayment, NewTicket, TicketStatus, TransactionStatus},
    user::NewUser,
    Event, EventBooking, Notification, Payment, Seat, Ticket, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    events: HashMap<Uuid, Event>,
    seats: HashMap<Uuid, Seat>,
    bookings: HashMap<Uuid, EventBooking>,
    tickets: HashMap<Uuid, Ticket>,
    payments: HashMap<Uuid, Payment>,
    notifications: Vec<Notification>,
    revoked_tokens: HashMap<Uuid, DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        self.tables
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }

    pub fn insert_user(&self, user: User) -> Result<(), AppError> {
        self.lock()?.users.insert(user.id, user);
        Ok(())
    }
}

const EMAIL_TAKEN: &str = "Email already exists";

fn clear_hold(seat: &mut Seat) {
    seat.reserved_by = None;
    seat.reserved_at = None;
    seat.reservation_expiry = None;
}

#[async_trait]
impl EventRepository for MemoryStore {
    async fn create(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event, AppError> {
        let event = event.into_event(now);
        self.lock()?.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.lock()?.events.get(&id).cloned())
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>, AppError> {
        let t = self.lock()?;
        Ok(ids.iter().filter_map(|id| t.events.get(id).cloned()).collect())
    }

    async fn list_all(&self) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self.lock()?.events.values().cloned().collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn list_published(&self) -> Result<Vec<Event>, AppError> {
        let mut events: Vec<Event> = self
            .lock()?
            .events
            .values()
            .filter(|e| e.is_active && e.status == EventStatus::Published)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }

    async fn update(&self, event: &Event) -> Result<Event, AppError> {
        let mut t = self.lock()?;
        let stored = t
            .events
            .get_mut(&event.id)
            .ok_or_else(|| AppError::not_found("Event not found"))?;
        // Counter and status are owned by adjust_bookings
        let (current_bookings, status) = (stored.current_bookings, stored.status);
        *stored = event.clone();
        stored.current_bookings = current_bookings;
        stored.status = status;
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn set_seating_layout(&self, id: Uuid, layout: SeatingLayout) -> Result<(), AppError> {
        if let Some(event) = self.lock()?.events.get_mut(&id) {
            event.seating_layout = layout;
            event.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut t = self.lock()?;
        let existed = t.events.remove(&id).is_some();
        t.seats.retain(|_, seat| seat.event_id != id);
        Ok(existed)
    }

    async fn adjust_bookings(&self, id: Uuid, delta: i32) -> Result<Option<Event>, AppError> {
        let mut t = self.lock()?;
        let Some(event) = t.events.get_mut(&id) else {
            return Ok(None);
        };
        if delta > 0 && event.current_bookings + delta > event.capacity {
            return Ok(None);
        }
        event.current_bookings = (event.current_bookings + delta).max(0);
        if event.current_bookings >= event.capacity {
            event.status = EventStatus::SoldOut;
        }
        event.updated_at = Utc::now();
        Ok(Some(event.clone()))
    }
}

#[async_trait]
impl SeatRepository for MemoryStore {
    async fn insert_many(&self, seats: Vec<NewSeat>, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let mut taken: BTreeSet<(Uuid, i32, i32)> = t
            .seats
            .values()
            .map(|s| (s.event_id, s.row_number, s.seat_number))
            .collect();
        for seat in &seats {
            if !taken.insert((seat.event_id, seat.row_number, seat.seat_number)) {
                return Err(AppError::Conflict(
                    "Seat already exists for this event".to_string(),
                ));
            }
        }
        let count = seats.len() as u64;
        for seat in seats {
            let seat = seat.into_seat(now);
            t.seats.insert(seat.id, seat);
        }
        Ok(count)
    }

    async fn insert(&self, seat: NewSeat, now: DateTime<Utc>) -> Result<Seat, AppError> {
        let mut t = self.lock()?;
        let duplicate = t.seats.values().any(|s| {
            s.event_id == seat.event_id
                && s.row_number == seat.row_number
                && s.seat_number == seat.seat_number
        });
        if duplicate {
            return Err(AppError::Conflict(
                "Seat already exists for this event".to_string(),
            ));
        }
        let seat = seat.into_seat(now);
        t.seats.insert(seat.id, seat.clone());
        Ok(seat)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Seat>, AppError> {
        Ok(self.lock()?.seats.get(&id).cloned())
    }

    async fn find_in_event(&self, event_id: Uuid, ids: &[Uuid]) -> Result<Vec<Seat>, AppError> {
        let t = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| t.seats.get(id))
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn list_active_by_event(&self, event_id: Uuid) -> Result<Vec<Seat>, AppError> {
        let mut seats: Vec<Seat> = self
            .lock()?
            .seats
            .values()
            .filter(|s| s.event_id == event_id && s.is_active)
            .cloned()
            .collect();
        seats.sort_by_key(|s| (s.row_number, s.seat_number));
        Ok(seats)
    }

    async fn count_by_event(&self, event_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .lock()?
            .seats
            .values()
            .filter(|s| s.event_id == event_id)
            .count() as i64)
    }

    async fn try_reserve(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<Option<Seat>, AppError> {
        let mut t = self.lock()?;
        let Some(seat) = t.seats.get_mut(&seat_id) else {
            return Ok(None);
        };
        if !seat.is_available_for_booking(now) {
            return Ok(None);
        }
        seat.status = SeatStatus::Reserved;
        seat.reserved_by = Some(user_id);
        seat.reserved_at = Some(now);
        seat.reservation_expiry = Some(expiry);
        seat.updated_at = now;
        Ok(Some(seat.clone()))
    }

    async fn release_hold(&self, seat_id: Uuid, user_id: Uuid) -> Result<Option<Seat>, AppError> {
        let mut t = self.lock()?;
        let Some(seat) = t.seats.get_mut(&seat_id) else {
            return Ok(None);
        };
        if seat.status != SeatStatus::Reserved || seat.reserved_by != Some(user_id) {
            return Ok(None);
        }
        seat.status = SeatStatus::Available;
        clear_hold(seat);
        seat.updated_at = Utc::now();
        Ok(Some(seat.clone()))
    }

    async fn held_by(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Seat>, AppError> {
        let t = self.lock()?;
        Ok(ids
            .iter()
            .filter_map(|id| t.seats.get(id))
            .filter(|s| s.event_id == event_id && s.is_reserved_by(user_id, now))
            .cloned()
            .collect())
    }

    async fn finalize(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
        booking_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let mut finalized = 0;
        for id in ids {
            if let Some(seat) = t.seats.get_mut(id) {
                if seat.is_reserved_by(user_id, now) {
                    seat.status = SeatStatus::Paid;
                    clear_hold(seat);
                    seat.booking_id = booking_id;
                    seat.updated_at = now;
                    finalized += 1;
                }
            }
        }
        Ok(finalized)
    }

    async fn release_booking_seats(&self, booking_id: Uuid) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let mut released = 0;
        for seat in t.seats.values_mut() {
            if seat.booking_id == Some(booking_id) && seat.status == SeatStatus::Paid {
                seat.status = SeatStatus::Available;
                seat.booking_id = None;
                seat.updated_at = Utc::now();
                released += 1;
            }
        }
        Ok(released)
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AppError> {
        let mut t = self.lock()?;
        let mut events = BTreeSet::new();
        for seat in t.seats.values_mut() {
            let elapsed = seat.status == SeatStatus::Reserved
                && seat.reservation_expiry.map(|exp| exp <= now).unwrap_or(true);
            if elapsed {
                seat.status = SeatStatus::Available;
                clear_hold(seat);
                seat.updated_at = now;
                events.insert(seat.event_id);
            }
        }
        Ok(events.into_iter().collect())
    }

    async fn update(&self, seat: &Seat) -> Result<Seat, AppError> {
        let mut t = self.lock()?;
        let conflict = t.seats.values().any(|s| {
            s.id != seat.id
                && s.event_id == seat.event_id
                && s.row_number == seat.row_number
                && s.seat_number == seat.seat_number
        });
        if conflict {
            return Err(AppError::Conflict(
                "Seat already exists for this event".to_string(),
            ));
        }
        let stored = t
            .seats
            .get_mut(&seat.id)
            .ok_or_else(|| AppError::not_found("Seat not found"))?;
        *stored = seat.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.seats.remove(&id).is_some())
    }

    async fn delete_by_event(&self, event_id: Uuid) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let before = t.seats.len();
        t.seats.retain(|_, seat| seat.event_id != event_id);
        Ok((before - t.seats.len()) as u64)
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create(&self, booking: NewBooking, now: DateTime<Utc>) -> Result<EventBooking, AppError> {
        let mut t = self.lock()?;
        let duplicate = t
            .bookings
            .values()
            .any(|b| b.event_id == booking.event_id && b.user_id == booking.user_id);
        if duplicate {
            return Err(AppError::Conflict(
                "You already have a booking for this event".to_string(),
            ));
        }
        let booking = booking.into_booking(now);
        t.bookings.insert(booking.id, booking.clone());
        Ok(booking)
    }

    async fn find_by_event_and_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventBooking>, AppError> {
        Ok(self
            .lock()?
            .bookings
            .values()
            .find(|b| b.event_id == event_id && b.user_id == user_id)
            .cloned())
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EventBooking>, AppError> {
        let mut t = self.lock()?;
        let Some(booking) = t.bookings.get_mut(&id) else {
            return Ok(None);
        };
        if !booking.is_cancellable() {
            return Ok(None);
        }
        booking.status = BookingStatus::Cancelled;
        booking.cancelled_at = Some(now);
        booking.cancelled_by = Some(cancelled_by);
        booking.updated_at = now;
        Ok(Some(booking.clone()))
    }

    async fn cancel_active_for_event(
        &self,
        event_id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventBooking>, AppError> {
        let mut t = self.lock()?;
        let mut cancelled = Vec::new();
        for booking in t.bookings.values_mut() {
            let active = matches!(
                booking.status,
                BookingStatus::Pending | BookingStatus::Confirmed
            );
            if booking.event_id == event_id && active {
                booking.status = BookingStatus::Cancelled;
                booking.cancelled_at = Some(now);
                booking.cancelled_by = Some(cancelled_by);
                booking.updated_at = now;
                cancelled.push(booking.clone());
            }
        }
        Ok(cancelled)
    }

    async fn discard(&self, id: Uuid) -> Result<(), AppError> {
        self.lock()?.bookings.remove(&id);
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>, AppError> {
        let mut bookings: Vec<EventBooking> = self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>, AppError> {
        let mut bookings: Vec<EventBooking> = self
            .lock()?
            .bookings
            .values()
            .filter(|b| b.event_id == event_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_all(&self) -> Result<Vec<EventBooking>, AppError> {
        let mut bookings: Vec<EventBooking> = self.lock()?.bookings.values().cloned().collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }
}

#[async_trait]
impl TicketRepository for MemoryStore {
    async fn create(&self, ticket: NewTicket, now: DateTime<Utc>) -> Result<TicketInsert, AppError> {
        let mut t = self.lock()?;
        if t
            .tickets
            .values()
            .any(|existing| existing.booking_reference == ticket.booking_reference)
        {
            return Ok(TicketInsert::ReferenceTaken);
        }
        if t
            .tickets
            .values()
            .any(|existing| existing.seat_id == ticket.seat_id && existing.status.is_live())
        {
            return Ok(TicketInsert::SeatTaken);
        }
        let ticket = ticket.into_ticket(now);
        t.tickets.insert(ticket.id, ticket.clone());
        Ok(TicketInsert::Created(ticket))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self.lock()?.tickets.get(&id).cloned())
    }

    async fn find_live_by_seat(&self, seat_id: Uuid) -> Result<Option<Ticket>, AppError> {
        Ok(self
            .lock()?
            .tickets
            .values()
            .find(|t| t.seat_id == seat_id && t.status.is_live())
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        let mut tickets: Vec<Ticket> = self
            .lock()?
            .tickets
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tickets)
    }

    async fn list_all(&self) -> Result<Vec<Ticket>, AppError> {
        Ok(self.lock()?.tickets.values().cloned().collect())
    }

    async fn set_status(&self, id: Uuid, status: TicketStatus) -> Result<Option<Ticket>, AppError> {
        let mut t = self.lock()?;
        Ok(t.tickets.get_mut(&id).map(|ticket| {
            ticket.status = status;
            ticket.updated_at = Utc::now();
            ticket.clone()
        }))
    }

    async fn list_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, AppError> {
        let mut tickets: Vec<Ticket> = self
            .lock()?
            .tickets
            .values()
            .filter(|t| from.map_or(true, |f| t.created_at >= f) && to.map_or(true, |e| t.created_at <= e))
            .cloned()
            .collect();
        tickets.sort_by_key(|t| t.created_at);
        Ok(tickets)
    }

    async fn set_qr_code(&self, id: Uuid, qr_code: &str) -> Result<String, AppError> {
        let mut t = self.lock()?;
        let ticket = t
            .tickets
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("Ticket not found"))?;
        Ok(ticket
            .qr_code
            .get_or_insert_with(|| qr_code.to_string())
            .clone())
    }

    async fn record_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment, AppError> {
        let mut t = self.lock()?;
        if t
            .payments
            .values()
            .any(|p| p.transaction_id == payment.transaction_id)
        {
            return Err(AppError::Conflict(
                "Transaction id already in use".to_string(),
            ));
        }
        let payment = payment.into_payment(now);
        t.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn find_completed_payment(&self, ticket_id: Uuid) -> Result<Option<Payment>, AppError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .find(|p| p.ticket_id == ticket_id && p.status == TransactionStatus::Completed)
            .cloned())
    }

    async fn list_completed_payments(&self) -> Result<Vec<Payment>, AppError> {
        Ok(self
            .lock()?
            .payments
            .values()
            .filter(|p| p.status == TransactionStatus::Completed)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(
        &self,
        user_id: Uuid,
        draft: &NotificationDraft,
        now: DateTime<Utc>,
    ) -> Result<Notification, AppError> {
        let notification = draft.address(user_id, now);
        self.lock()?.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Notification>, AppError> {
        let t = self.lock()?;
        Ok(t.notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: Uuid, user_id: Uuid) -> Result<Option<Notification>, AppError> {
        let mut t = self.lock()?;
        Ok(t.notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == user_id)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let mut flipped = 0;
        for n in t.notifications.iter_mut().filter(|n| n.user_id == user_id && !n.is_read) {
            n.is_read = true;
            flipped += 1;
        }
        Ok(flipped)
    }

    async fn count_unread(&self, user_id: Uuid) -> Result<i64, AppError> {
        Ok(self
            .lock()?
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as i64)
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn create(&self, user: NewUser, now: DateTime<Utc>) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.email == user.email) {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }
        let user = user.into_user(now);
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, AppError> {
        let mut users: Vec<User> = self.lock()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn list_active_ids(&self) -> Result<Vec<Uuid>, AppError> {
        Ok(self
            .lock()?
            .users
            .values()
            .filter(|u| u.is_active)
            .map(|u| u.id)
            .collect())
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let mut t = self.lock()?;
        if t.users.values().any(|u| u.id != user.id && u.email == user.email) {
            return Err(AppError::Conflict(EMAIL_TAKEN.to_string()));
        }
        let stored = t
            .users
            .get_mut(&user.id)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        *stored = user.clone();
        Ok(stored.clone())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(user) = self.lock()?.users.get_mut(&id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn revoke_token(&self, jti: Uuid, _user_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        self.lock()?.revoked_tokens.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, AppError> {
        Ok(self.lock()?.revoked_tokens.contains_key(&jti))
    }

    async fn purge_revoked_tokens(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut t = self.lock()?;
        let before = t.revoked_tokens.len();
        t.revoked_tokens.retain(|_, expires_at| *expires_at > now);
        Ok((before - t.revoked_tokens.len()) as u64)
    }
}
