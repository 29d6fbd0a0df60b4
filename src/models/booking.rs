use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    DebitCard,
    Paypal,
    Cash,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct EventBooking {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub number_of_tickets: i32,
    pub total_amount: f64,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
    pub booking_date: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EventBooking {
    pub fn is_cancellable(&self) -> bool {
        !matches!(self.status, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub number_of_tickets: i32,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub special_requests: Option<String>,
}

impl NewBooking {
    pub fn into_booking(self, now: DateTime<Utc>) -> EventBooking {
        EventBooking {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            user_id: self.user_id,
            number_of_tickets: self.number_of_tickets,
            total_amount: self.total_amount,
            status: BookingStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: self.payment_method,
            special_requests: self.special_requests,
            booking_date: now,
            cancelled_at: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}
