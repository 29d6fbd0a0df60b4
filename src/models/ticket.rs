use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
}

impl TicketStatus {
    /// Active and used tickets hold their seat.
    pub fn is_live(&self) -> bool {
        matches!(self, TicketStatus::Active | TicketStatus::Used)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "transaction_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "charge_method", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChargeMethod {
    Card,
    BankTransfer,
    Wallet,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub seat_id: Uuid,
    pub status: TicketStatus,
    pub purchase_price: f64,
    pub qr_code: Option<String>,
    pub booking_reference: String,
    pub issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub seat_id: Uuid,
    pub purchase_price: f64,
    pub booking_reference: String,
}

impl NewTicket {
    pub fn into_ticket(self, now: DateTime<Utc>) -> Ticket {
        Ticket {
            id: Uuid::new_v4(),
            event_id: self.event_id,
            user_id: self.user_id,
            seat_id: self.seat_id,
            status: TicketStatus::Active,
            purchase_price: self.purchase_price,
            qr_code: None,
            booking_reference: self.booking_reference,
            issued_at: now,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub status: TransactionStatus,
    pub payment_method: ChargeMethod,
    pub transaction_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub ticket_id: Uuid,
    pub user_id: Uuid,
    pub amount: f64,
    pub status: TransactionStatus,
    pub payment_method: ChargeMethod,
    pub transaction_id: String,
}

impl NewPayment {
    pub fn into_payment(self, now: DateTime<Utc>) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            ticket_id: self.ticket_id,
            user_id: self.user_id,
            amount: self.amount,
            status: self.status,
            payment_method: self.payment_method,
            transaction_id: self.transaction_id,
            created_at: now,
        }
    }
}

/// `PREFIX-` followed by `len` upper-case alphanumerics.
pub fn generate_reference(prefix: &str, len: usize) -> String {
    let mut body = String::with_capacity(len);
    while body.len() < len {
        body.push_str(&Uuid::new_v4().simple().to_string().to_uppercase());
    }
    body.truncate(len);
    format!("{}-{}", prefix, body)
}

pub fn booking_reference() -> String {
    generate_reference("TKT", 6)
}

pub fn transaction_id() -> String {
    generate_reference("TXN", 9)
}
