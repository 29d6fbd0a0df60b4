use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{conflict_on_unique, PgStore};
use crate::error::AppError;
use crate::models::seat::{NewSeat, Seat};
use crate::repository::SeatRepository;

const DUPLICATE_SEAT: &str = "Seat already exists for this event";

const INSERT_SEAT: &str = r#"
    INSERT INTO seats (
        id, event_id, row_number, seat_number, status, base_price, price_multiplier,
        final_price, category, is_active, is_accessible, features, created_at, updated_at
    )
    VALUES ($1, $2, $3, $4, 'available', $5, $6, $7, $8, TRUE, $9, $10, $11, $11)
    RETURNING *
"#;

#[async_trait]
impl SeatRepository for PgStore {
    async fn insert_many(&self, seats: Vec<NewSeat>, now: DateTime<Utc>) -> Result<u64, AppError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for seat in seats {
            sqlx::query(INSERT_SEAT)
                .bind(Uuid::new_v4())
                .bind(seat.event_id)
                .bind(seat.row_number)
                .bind(seat.seat_number)
                .bind(seat.base_price)
                .bind(seat.price_multiplier)
                .bind(seat.final_price)
                .bind(seat.category)
                .bind(seat.is_accessible)
                .bind(seat.features)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(conflict_on_unique(DUPLICATE_SEAT))?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn insert(&self, seat: NewSeat, now: DateTime<Utc>) -> Result<Seat, AppError> {
        let seat = sqlx::query_as::<_, Seat>(INSERT_SEAT)
            .bind(Uuid::new_v4())
            .bind(seat.event_id)
            .bind(seat.row_number)
            .bind(seat.seat_number)
            .bind(seat.base_price)
            .bind(seat.price_multiplier)
            .bind(seat.final_price)
            .bind(seat.category)
            .bind(seat.is_accessible)
            .bind(seat.features)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(conflict_on_unique(DUPLICATE_SEAT))?;
        Ok(seat)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Seat>, AppError> {
        let seat = sqlx::query_as::<_, Seat>("SELECT * FROM seats WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(seat)
    }

    async fn find_in_event(&self, event_id: Uuid, ids: &[Uuid]) -> Result<Vec<Seat>, AppError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT * FROM seats WHERE event_id = $1 AND id = ANY($2)",
        )
        .bind(event_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn list_active_by_event(&self, event_id: Uuid) -> Result<Vec<Seat>, AppError> {
        let seats = sqlx::query_as::<_, Seat>(
            "SELECT * FROM seats WHERE event_id = $1 AND is_active ORDER BY row_number, seat_number",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn count_by_event(&self, event_id: Uuid) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM seats WHERE event_id = $1")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn try_reserve(
        &self,
        seat_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
        expiry: DateTime<Utc>,
    ) -> Result<Option<Seat>, AppError> {
        let seat = sqlx::query_as::<_, Seat>(
            r#"
            UPDATE seats
            SET status = 'reserved', reserved_by = $2, reserved_at = $3,
                reservation_expiry = $4, updated_at = $3
            WHERE id = $1
              AND is_active
              AND (status = 'available'
                   OR (status = 'reserved'
                       AND (reservation_expiry IS NULL OR reservation_expiry <= $3)))
            RETURNING *
            "#,
        )
        .bind(seat_id)
        .bind(user_id)
        .bind(now)
        .bind(expiry)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn release_hold(&self, seat_id: Uuid, user_id: Uuid) -> Result<Option<Seat>, AppError> {
        let seat = sqlx::query_as::<_, Seat>(
            r#"
            UPDATE seats
            SET status = 'available', reserved_by = NULL, reserved_at = NULL,
                reservation_expiry = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'reserved' AND reserved_by = $2
            RETURNING *
            "#,
        )
        .bind(seat_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(seat)
    }

    async fn held_by(
        &self,
        event_id: Uuid,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<Seat>, AppError> {
        let seats = sqlx::query_as::<_, Seat>(
            r#"
            SELECT * FROM seats
            WHERE event_id = $1 AND id = ANY($2)
              AND status = 'reserved' AND reserved_by = $3 AND reservation_expiry > $4
            "#,
        )
        .bind(event_id)
        .bind(ids)
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        Ok(seats)
    }

    async fn finalize(
        &self,
        ids: &[Uuid],
        user_id: Uuid,
        now: DateTime<Utc>,
        booking_id: Option<Uuid>,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'paid', reserved_by = NULL, reserved_at = NULL,
                reservation_expiry = NULL, booking_id = $4, updated_at = $3
            WHERE id = ANY($1)
              AND status = 'reserved' AND reserved_by = $2 AND reservation_expiry > $3
            "#,
        )
        .bind(ids)
        .bind(user_id)
        .bind(now)
        .bind(booking_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn release_booking_seats(&self, booking_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE seats
            SET status = 'available', booking_id = NULL, updated_at = NOW()
            WHERE booking_id = $1 AND status = 'paid'
            "#,
        )
        .bind(booking_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn release_expired(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, AppError> {
        let mut events = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE seats
            SET status = 'available', reserved_by = NULL, reserved_at = NULL,
                reservation_expiry = NULL, updated_at = $1
            WHERE status = 'reserved'
              AND (reservation_expiry IS NULL OR reservation_expiry <= $1)
            RETURNING event_id
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        events.sort();
        events.dedup();
        Ok(events)
    }

    async fn update(&self, seat: &Seat) -> Result<Seat, AppError> {
        let updated = sqlx::query_as::<_, Seat>(
            r#"
            UPDATE seats
            SET row_number = $2, seat_number = $3, status = $4, base_price = $5,
                price_multiplier = $6, final_price = $7, category = $8, is_active = $9,
                is_accessible = $10, features = $11, reserved_by = $12, reserved_at = $13,
                reservation_expiry = $14, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(seat.id)
        .bind(seat.row_number)
        .bind(seat.seat_number)
        .bind(seat.status)
        .bind(seat.base_price)
        .bind(seat.price_multiplier)
        .bind(seat.final_price)
        .bind(seat.category)
        .bind(seat.is_active)
        .bind(seat.is_accessible)
        .bind(&seat.features)
        .bind(seat.reserved_by)
        .bind(seat.reserved_at)
        .bind(seat.reservation_expiry)
        .fetch_optional(&self.pool)
        .await
        .map_err(conflict_on_unique(DUPLICATE_SEAT))?;

        updated.ok_or_else(|| AppError::not_found("Seat not found"))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM seats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_event(&self, event_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM seats WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
