use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{conflict_on_unique, violated_constraint, PgStore};
use crate::error::{is_unique_violation, AppError};
use crate::models::ticket::{NewPayment, NewTicket, Payment, Ticket, TicketStatus};
use crate::repository::{TicketInsert, TicketRepository};

const LIVE_SEAT_INDEX: &str = "tickets_live_seat_idx";

#[async_trait]
impl TicketRepository for PgStore {
    async fn create(&self, ticket: NewTicket, now: DateTime<Utc>) -> Result<TicketInsert, AppError> {
        let ticket = ticket.into_ticket(now);
        let created = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (
                id, event_id, user_id, seat_id, status, purchase_price,
                booking_reference, issued_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8, $8)
            RETURNING *
            "#,
        )
        .bind(ticket.id)
        .bind(ticket.event_id)
        .bind(ticket.user_id)
        .bind(ticket.seat_id)
        .bind(ticket.status)
        .bind(ticket.purchase_price)
        .bind(&ticket.booking_reference)
        .bind(now)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(ticket) => Ok(TicketInsert::Created(ticket)),
            Err(err) if is_unique_violation(&err) => {
                if violated_constraint(&err) == Some(LIVE_SEAT_INDEX) {
                    Ok(TicketInsert::SeatTaken)
                } else {
                    Ok(TicketInsert::ReferenceTaken)
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(ticket)
    }

    async fn find_live_by_seat(&self, seat_id: Uuid) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE seat_id = $1 AND status IN ('active', 'used') LIMIT 1",
        )
        .bind(seat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            "SELECT * FROM tickets WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn list_all(&self) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>("SELECT * FROM tickets")
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    async fn set_status(&self, id: Uuid, status: TicketStatus) -> Result<Option<Ticket>, AppError> {
        let ticket = sqlx::query_as::<_, Ticket>(
            "UPDATE tickets SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?;
        Ok(ticket)
    }

    async fn list_created_between(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Ticket>, AppError> {
        let tickets = sqlx::query_as::<_, Ticket>(
            r#"
            SELECT * FROM tickets
            WHERE ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at <= $2)
            ORDER BY created_at
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(tickets)
    }

    async fn set_qr_code(&self, id: Uuid, qr_code: &str) -> Result<String, AppError> {
        let stored = sqlx::query_scalar::<_, Option<String>>(
            r#"
            UPDATE tickets
            SET qr_code = COALESCE(qr_code, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING qr_code
            "#,
        )
        .bind(id)
        .bind(qr_code)
        .fetch_optional(&self.pool)
        .await?;

        match stored {
            Some(Some(code)) => Ok(code),
            Some(None) => Err(AppError::Internal(format!("QR code not stored for ticket {}", id))),
            None => Err(AppError::not_found("Ticket not found")),
        }
    }

    async fn record_payment(&self, payment: NewPayment, now: DateTime<Utc>) -> Result<Payment, AppError> {
        let payment = payment.into_payment(now);
        let created = sqlx::query_as::<_, Payment>(
            r#"
            INSERT INTO payments (
                id, ticket_id, user_id, amount, status, payment_method, transaction_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(payment.id)
        .bind(payment.ticket_id)
        .bind(payment.user_id)
        .bind(payment.amount)
        .bind(payment.status)
        .bind(payment.payment_method)
        .bind(&payment.transaction_id)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("Transaction id already in use"))?;

        Ok(created)
    }

    async fn find_completed_payment(&self, ticket_id: Uuid) -> Result<Option<Payment>, AppError> {
        let payment = sqlx::query_as::<_, Payment>(
            "SELECT * FROM payments WHERE ticket_id = $1 AND status = 'completed' LIMIT 1",
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(payment)
    }

    async fn list_completed_payments(&self) -> Result<Vec<Payment>, AppError> {
        let payments = sqlx::query_as::<_, Payment>("SELECT * FROM payments WHERE status = 'completed'")
            .fetch_all(&self.pool)
            .await?;
        Ok(payments)
    }
}
