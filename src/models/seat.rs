use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::round_cents;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    Available,
    Reserved,
    Paid,
    Blocked,
}

impl SeatStatus {
    pub fn color(&self) -> &'static str {
        match self {
            SeatStatus::Available => "#D3D3D3",
            SeatStatus::Reserved => "#9370DB",
            SeatStatus::Paid => "#4B0082",
            SeatStatus::Blocked => "#FF0000",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "seat_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SeatCategory {
    Standard,
    Premium,
    Vip,
    Accessible,
}

impl SeatCategory {
    /// Multiplier applied when a single seat is created or re-categorized.
    pub fn multiplier(&self) -> f64 {
        match self {
            SeatCategory::Premium => 1.5,
            SeatCategory::Vip => 2.0,
            SeatCategory::Standard | SeatCategory::Accessible => 1.0,
        }
    }
}

pub const SEAT_FEATURES: &[&str] = &[
    "near_stage",
    "aisle",
    "window",
    "center",
    "back_row",
    "front_row",
    "balcony",
];

pub const MIN_PRICE_MULTIPLIER: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: Uuid,
    pub event_id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub status: SeatStatus,
    pub base_price: f64,
    pub price_multiplier: f64,
    pub final_price: f64,
    pub category: SeatCategory,
    pub is_active: bool,
    pub is_accessible: bool,
    pub features: Vec<String>,
    pub reserved_by: Option<Uuid>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub reservation_expiry: Option<DateTime<Utc>>,
    pub booking_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Seat {
    fn hold_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Reserved
            && self.reservation_expiry.map(|exp| exp <= now).unwrap_or(true)
    }

    /// Status as a reader should see it: an elapsed hold counts as available.
    pub fn effective_status(&self, now: DateTime<Utc>) -> SeatStatus {
        if self.hold_elapsed(now) {
            SeatStatus::Available
        } else {
            self.status
        }
    }

    pub fn is_available_for_booking(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.effective_status(now) == SeatStatus::Available
    }

    pub fn is_reserved_by(&self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        self.status == SeatStatus::Reserved
            && self.reserved_by == Some(user_id)
            && self.reservation_expiry.map(|exp| exp > now).unwrap_or(false)
    }

    /// Row letter plus seat number: row 1 seat 1 is `A1`, row 27 is `AA`.
    pub fn identifier(&self) -> String {
        format!("{}{}", row_label(self.row_number), self.seat_number)
    }

    pub fn unavailable_reason(&self, now: DateTime<Utc>) -> UnavailableReason {
        if self.effective_status(now) == SeatStatus::Reserved {
            UnavailableReason::AlreadyReserved
        } else {
            UnavailableReason::NotAvailable
        }
    }

    /// Copy for display, with elapsed hold fields cleared.
    pub fn presented(&self, now: DateTime<Utc>) -> Seat {
        let mut seat = self.clone();
        if seat.hold_elapsed(now) {
            seat.status = SeatStatus::Available;
            seat.reserved_by = None;
            seat.reserved_at = None;
            seat.reservation_expiry = None;
        }
        seat
    }

    pub fn set_category(&mut self, category: SeatCategory) {
        self.category = category;
        self.price_multiplier = category.multiplier();
        self.final_price = round_cents(self.base_price * self.price_multiplier);
    }
}

pub fn row_label(row: i32) -> String {
    let mut n = row.max(1) as u32;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    label.iter().rev().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnavailableReason {
    #[serde(rename = "Already reserved")]
    AlreadyReserved,
    #[serde(rename = "Not available")]
    NotAvailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableSeat {
    pub seat_id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub reason: UnavailableReason,
}

impl UnavailableSeat {
    pub fn from_seat(seat: &Seat, now: DateTime<Utc>) -> Self {
        Self {
            seat_id: seat.id,
            row_number: seat.row_number,
            seat_number: seat.seat_number,
            reason: seat.unavailable_reason(now),
        }
    }
}

/// Seat as produced by generation or single-seat creation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSeat {
    pub event_id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub base_price: f64,
    pub price_multiplier: f64,
    pub final_price: f64,
    pub category: SeatCategory,
    pub is_accessible: bool,
    pub features: Vec<String>,
}

impl NewSeat {
    pub fn into_seat(self, now: DateTime<Utc>) -> Seat {
        Seat {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            row_number: self.row_number,
            seat_number: self.seat_number,
            status: SeatStatus::Available,
            base_price: self.base_price,
            price_multiplier: self.price_multiplier,
            final_price: self.final_price,
            category: self.category,
            is_active: true,
            is_accessible: self.is_accessible,
            features: self.features,
            reserved_by: None,
            reserved_at: None,
            reservation_expiry: None,
            booking_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
