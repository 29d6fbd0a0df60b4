use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Conference,
    Workshop,
    Seminar,
    Concert,
    Sports,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Draft,
    Published,
    Cancelled,
    Completed,
    SoldOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "layout_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LayoutType {
    Theater,
    Stadium,
    Banquet,
    Conference,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct SeatingLayout {
    #[serde(rename = "type")]
    pub layout_type: LayoutType,
    #[sqlx(rename = "layout_rows")]
    pub rows: i32,
    #[sqlx(rename = "layout_seats_per_row")]
    pub seats_per_row: i32,
}

impl SeatingLayout {
    pub fn grid_size(&self) -> i64 {
        self.rows as i64 * self.seats_per_row as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub current_bookings: i32,
    pub price: f64,
    pub category: EventCategory,
    pub status: EventStatus,
    pub booking_deadline: DateTime<Utc>,
    pub refund_policy: Option<String>,
    #[sqlx(flatten)]
    pub seating_layout: SeatingLayout,
    pub created_by: Uuid,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Event plus its derived, read-only counters.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventView {
    #[serde(flatten)]
    pub event: Event,
    pub available_seats: i32,
    pub is_sold_out: bool,
    pub booking_percentage: i32,
}

impl Event {
    pub fn available_seats(&self) -> i32 {
        (self.capacity - self.current_bookings).max(0)
    }

    pub fn is_sold_out(&self) -> bool {
        self.current_bookings >= self.capacity
    }

    pub fn booking_percentage(&self) -> i32 {
        if self.capacity <= 0 {
            return 0;
        }
        ((self.current_bookings as f64 / self.capacity as f64) * 100.0).round() as i32
    }

    /// Whether `tickets` more seats can be sold right now.
    pub fn can_book(&self, tickets: i32, now: DateTime<Utc>) -> bool {
        self.is_active
            && self.status == EventStatus::Published
            && self.current_bookings + tickets <= self.capacity
            && now < self.booking_deadline
    }

    pub fn view(&self) -> EventView {
        EventView {
            event: self.clone(),
            available_seats: self.available_seats(),
            is_sold_out: self.is_sold_out(),
            booking_percentage: self.booking_percentage(),
        }
    }
}

/// Fields supplied when an event is first stored.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub capacity: i32,
    pub price: f64,
    pub category: EventCategory,
    pub booking_deadline: DateTime<Utc>,
    pub refund_policy: Option<String>,
    pub seating_layout: SeatingLayout,
    pub created_by: Uuid,
}

impl NewEvent {
    pub fn into_event(self, now: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            date: self.date,
            location: self.location,
            capacity: self.capacity,
            current_bookings: 0,
            price: self.price,
            category: self.category,
            status: EventStatus::Published,
            booking_deadline: self.booking_deadline,
            refund_policy: self.refund_policy,
            seating_layout: self.seating_layout,
            created_by: self.created_by,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
