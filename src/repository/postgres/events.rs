use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::error::AppError;
use crate::models::event::{Event, NewEvent, SeatingLayout};
use crate::repository::EventRepository;

#[async_trait]
impl EventRepository for PgStore {
    async fn create(&self, event: NewEvent, now: DateTime<Utc>) -> Result<Event, AppError> {
        let event = event.into_event(now);
        let created = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, title, description, date, location, capacity, current_bookings, price,
                category, status, booking_deadline, refund_policy,
                layout_type, layout_rows, layout_seats_per_row,
                created_by, is_active, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, 0, $7, $8, $9, $10, $11, $12, $13, $14, $15, TRUE, $16, $16)
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.capacity)
        .bind(event.price)
        .bind(event.category)
        .bind(event.booking_deadline)
        .bind(&event.refund_policy)
        .bind(event.seating_layout.layout_type)
        .bind(event.seating_layout.rows)
        .bind(event.seating_layout.seats_per_row)
        .bind(event.created_by)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_many(&self, ids: &[Uuid]) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn list_all(&self) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date")
            .fetch_all(&self.pool)
            .await?;
        Ok(events)
    }

    async fn list_published(&self) -> Result<Vec<Event>, AppError> {
        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE is_active AND status = 'published' ORDER BY date",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn update(&self, event: &Event) -> Result<Event, AppError> {
        let updated = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET title = $2, description = $3, date = $4, location = $5, capacity = $6,
                price = $7, category = $8, booking_deadline = $9,
                refund_policy = $10, layout_type = $11, layout_rows = $12,
                layout_seats_per_row = $13, is_active = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(event.id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(&event.location)
        .bind(event.capacity)
        .bind(event.price)
        .bind(event.category)
        .bind(event.booking_deadline)
        .bind(&event.refund_policy)
        .bind(event.seating_layout.layout_type)
        .bind(event.seating_layout.rows)
        .bind(event.seating_layout.seats_per_row)
        .bind(event.is_active)
        .fetch_optional(&self.pool)
        .await?;

        updated.ok_or_else(|| AppError::not_found("Event not found"))
    }

    async fn set_seating_layout(&self, id: Uuid, layout: SeatingLayout) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE events SET layout_type = $2, layout_rows = $3, layout_seats_per_row = $4, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(layout.layout_type)
        .bind(layout.rows)
        .bind(layout.seats_per_row)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn adjust_bookings(&self, id: Uuid, delta: i32) -> Result<Option<Event>, AppError> {
        let event = sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET current_bookings = GREATEST(0, current_bookings + $2),
                status = CASE
                    WHEN GREATEST(0, current_bookings + $2) >= capacity THEN 'sold_out'::event_status
                    ELSE status
                END,
                updated_at = NOW()
            WHERE id = $1 AND ($2 <= 0 OR current_bookings + $2 <= capacity)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(delta)
        .fetch_optional(&self.pool)
        .await?;
        Ok(event)
    }
}
