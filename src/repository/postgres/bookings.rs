use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{conflict_on_unique, PgStore};
use crate::error::AppError;
use crate::models::booking::{EventBooking, NewBooking};
use crate::repository::BookingRepository;

#[async_trait]
impl BookingRepository for PgStore {
    async fn create(&self, booking: NewBooking, now: DateTime<Utc>) -> Result<EventBooking, AppError> {
        let booking = booking.into_booking(now);
        let created = sqlx::query_as::<_, EventBooking>(
            r#"
            INSERT INTO event_bookings (
                id, event_id, user_id, number_of_tickets, total_amount, status,
                payment_status, payment_method, special_requests, booking_date,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10, $10)
            RETURNING *
            "#,
        )
        .bind(booking.id)
        .bind(booking.event_id)
        .bind(booking.user_id)
        .bind(booking.number_of_tickets)
        .bind(booking.total_amount)
        .bind(booking.status)
        .bind(booking.payment_status)
        .bind(booking.payment_method)
        .bind(&booking.special_requests)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("You already have a booking for this event"))?;

        Ok(created)
    }

    async fn find_by_event_and_user(
        &self,
        event_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<EventBooking>, AppError> {
        let booking = sqlx::query_as::<_, EventBooking>(
            "SELECT * FROM event_bookings WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn cancel(
        &self,
        id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<EventBooking>, AppError> {
        let booking = sqlx::query_as::<_, EventBooking>(
            r#"
            UPDATE event_bookings
            SET status = 'cancelled', cancelled_at = $3, cancelled_by = $2, updated_at = $3
            WHERE id = $1 AND status NOT IN ('cancelled', 'completed')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(cancelled_by)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        Ok(booking)
    }

    async fn cancel_active_for_event(
        &self,
        event_id: Uuid,
        cancelled_by: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<EventBooking>, AppError> {
        let bookings = sqlx::query_as::<_, EventBooking>(
            r#"
            UPDATE event_bookings
            SET status = 'cancelled', cancelled_at = $3, cancelled_by = $2, updated_at = $3
            WHERE event_id = $1 AND status IN ('pending', 'confirmed')
            RETURNING *
            "#,
        )
        .bind(event_id)
        .bind(cancelled_by)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn discard(&self, id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM event_bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<EventBooking>, AppError> {
        let bookings = sqlx::query_as::<_, EventBooking>(
            "SELECT * FROM event_bookings WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn list_by_event(&self, event_id: Uuid) -> Result<Vec<EventBooking>, AppError> {
        let bookings = sqlx::query_as::<_, EventBooking>(
            "SELECT * FROM event_bookings WHERE event_id = $1 ORDER BY created_at DESC",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }

    async fn list_all(&self) -> Result<Vec<EventBooking>, AppError> {
        let bookings = sqlx::query_as::<_, EventBooking>(
            "SELECT * FROM event_bookings ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(bookings)
    }
}
