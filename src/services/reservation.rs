use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    round_cents,
    seat::{SeatCategory, UnavailableReason, UnavailableSeat},
    Seat,
};
use crate::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldSeat {
    pub id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub category: SeatCategory,
    pub price: f64,
    pub features: Vec<String>,
}

impl From<&Seat> for HeldSeat {
    fn from(seat: &Seat) -> Self {
        Self {
            id: seat.id,
            row_number: seat.row_number,
            seat_number: seat.seat_number,
            category: seat.category,
            price: seat.final_price,
            features: seat.features.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub event_id: Uuid,
    pub reserved_seats: Vec<HeldSeat>,
    pub total_price: f64,
    pub reservation_expiry: DateTime<Utc>,
}

/// Rejects empty or repeated seat lists and lists that disagree with the ticket count.
pub fn check_selection(seat_ids: &[Uuid], number_of_tickets: i32) -> Result<(), AppError> {
    if seat_ids.is_empty() || seat_ids.len() != number_of_tickets.max(0) as usize {
        return Err(AppError::validation(
            "selectedSeats",
            "Number of selected seats must match number of tickets",
        ));
    }
    let unique: HashSet<&Uuid> = seat_ids.iter().collect();
    if unique.len() != seat_ids.len() {
        return Err(AppError::validation(
            "selectedSeats",
            "The same seat was selected more than once",
        ));
    }
    Ok(())
}

pub struct ReservationService {
    state: Arc<AppState>,
}

impl ReservationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    fn hold_duration(&self) -> Duration {
        Duration::minutes(self.state.config.booking.reservation_minutes)
    }

    /// Holds every requested seat for `user_id`, or none of them.
    pub async fn reserve(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        seat_ids: &[Uuid],
        number_of_tickets: i32,
    ) -> Result<Reservation, AppError> {
        check_selection(seat_ids, number_of_tickets)?;

        let event = self
            .state
            .events
            .find_by_id(event_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| AppError::not_found("Event not found or inactive"))?;

        let mut seats = self.state.seats.find_in_event(event.id, seat_ids).await?;
        if seats.len() != seat_ids.len() {
            return Err(AppError::validation(
                "selectedSeats",
                "Some selected seats not found",
            ));
        }
        seats.sort_by_key(|s| (s.row_number, s.seat_number));

        let now = self.state.now();
        let expiry = now + self.hold_duration();
        let mut reserved: Vec<Seat> = Vec::with_capacity(seats.len());
        let mut unavailable: Vec<UnavailableSeat> = Vec::new();

        for seat in &seats {
            if !seat.is_available_for_booking(now) {
                unavailable.push(UnavailableSeat::from_seat(seat, now));
                continue;
            }
            // Once one seat failed the batch is lost; keep scanning only to report
            if !unavailable.is_empty() {
                continue;
            }
            match self.state.seats.try_reserve(seat.id, user_id, now, expiry).await {
                Ok(Some(held)) => reserved.push(held),
                Ok(None) => {
                    // Lost the race between read and write
                    let reason = match self.state.seats.find_by_id(seat.id).await {
                        Ok(Some(current)) => current.unavailable_reason(now),
                        _ => UnavailableReason::NotAvailable,
                    };
                    unavailable.push(UnavailableSeat {
                        reason,
                        ..UnavailableSeat::from_seat(seat, now)
                    });
                }
                Err(e) => {
                    self.rollback(&reserved, user_id).await;
                    return Err(e);
                }
            }
        }

        if !unavailable.is_empty() {
            self.rollback(&reserved, user_id).await;
            warn!(
                "Reservation for user {} on event {} failed: {} seat(s) unavailable",
                user_id,
                event_id,
                unavailable.len()
            );
            return Err(AppError::SeatsUnavailable(unavailable));
        }

        self.state.cache.invalidate(event_id).await;
        info!(
            "User {} reserved {} seat(s) on event {} until {}",
            user_id,
            reserved.len(),
            event_id,
            expiry
        );

        let total_price = round_cents(reserved.iter().map(|s| s.final_price).sum());
        Ok(Reservation {
            event_id,
            reserved_seats: reserved.iter().map(HeldSeat::from).collect(),
            total_price,
            reservation_expiry: expiry,
        })
    }

    async fn rollback(&self, reserved: &[Seat], user_id: Uuid) {
        for seat in reserved {
            if let Err(e) = self.state.seats.release_hold(seat.id, user_id).await {
                error!("Failed to roll back hold on seat {}: {}", seat.id, e);
            }
        }
    }

    /// Releases the caller's own holds among `seat_ids`; other seats are skipped.
    pub async fn release(&self, user_id: Uuid, seat_ids: &[Uuid]) -> Result<u64, AppError> {
        if seat_ids.is_empty() {
            return Err(AppError::validation("seatIds", "No seats specified for release"));
        }

        let mut released = 0;
        let mut events = BTreeSet::new();
        for seat_id in seat_ids {
            if let Some(seat) = self.state.seats.release_hold(*seat_id, user_id).await? {
                released += 1;
                events.insert(seat.event_id);
            }
        }

        if released == 0 {
            return Err(AppError::not_found("No reserved seats found for this user"));
        }
        for event_id in events {
            self.state.cache.invalidate(event_id).await;
        }
        info!("User {} released {} seat(s)", user_id, released);
        Ok(released)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::SeatStatus;
    use crate::services::fixtures::Fixture;

    fn ids(seats: &[Seat]) -> Vec<Uuid> {
        seats.iter().map(|s| s.id).collect()
    }

    #[tokio::test]
    async fn reserve_stamps_hold_fields() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(2, 5, 20.0).await;
        let service = ReservationService::new(fx.state.clone());

        let reservation = service
            .reserve(event.id, fx.user.id, &ids(&seats[..2]), 2)
            .await
            .unwrap();
        assert_eq!(reservation.reserved_seats.len(), 2);
        assert_eq!(reservation.total_price, 40.0);
        assert_eq!(reservation.reservation_expiry, fx.state.now() + Duration::minutes(15));

        let seat = fx.reload_seat(seats[0].id).await;
        assert_eq!(seat.status, SeatStatus::Reserved);
        assert_eq!(seat.reserved_by, Some(fx.user.id));
        assert!(seat.reserved_at.is_some());
        assert_eq!(seat.reservation_expiry, Some(reservation.reservation_expiry));
    }

    #[tokio::test]
    async fn count_mismatch_and_foreign_seats_are_rejected() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 3, 20.0).await;
        let (_, foreign) = fx.event_with_seats(1, 1, 20.0).await;
        let service = ReservationService::new(fx.state.clone());

        let err = service
            .reserve(event.id, fx.user.id, &ids(&seats[..2]), 3)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));

        let err = service
            .reserve(event.id, fx.user.id, &[seats[0].id, foreign[0].id], 2)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Some selected seats not found");

        let err = service
            .reserve(Uuid::new_v4(), fx.user.id, &ids(&seats[..1]), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn partial_failure_leaves_no_new_holds() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 4, 20.0).await;
        let service = ReservationService::new(fx.state.clone());

        // Other user holds the third seat
        service
            .reserve(event.id, fx.other.id, &[seats[2].id], 1)
            .await
            .unwrap();

        let err = service
            .reserve(event.id, fx.user.id, &ids(&seats[..3]), 3)
            .await
            .unwrap_err();
        match err {
            AppError::SeatsUnavailable(unavailable) => {
                assert_eq!(unavailable.len(), 1);
                assert_eq!(unavailable[0].seat_id, seats[2].id);
                assert_eq!(unavailable[0].reason, UnavailableReason::AlreadyReserved);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        for seat in &seats[..2] {
            let seat = fx.reload_seat(seat.id).await;
            assert_eq!(seat.status, SeatStatus::Available);
            assert!(seat.reserved_by.is_none());
        }
        assert_eq!(fx.reload_seat(seats[2].id).await.reserved_by, Some(fx.other.id));
    }

    #[tokio::test]
    async fn competing_reservation_reports_already_reserved() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 2, 20.0).await;
        let service = ReservationService::new(fx.state.clone());

        service.reserve(event.id, fx.user.id, &[seats[0].id], 1).await.unwrap();
        let err = service
            .reserve(event.id, fx.other.id, &[seats[0].id], 1)
            .await
            .unwrap_err();
        let body = match err {
            AppError::SeatsUnavailable(seats) => serde_json::to_value(seats).unwrap(),
            other => panic!("unexpected error: {other:?}"),
        };
        assert_eq!(body[0]["reason"], "Already reserved");
        assert_eq!(body[0]["rowNumber"], 1);
    }

    #[tokio::test]
    async fn paid_seat_reports_not_available() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 1, 20.0).await;
        let mut seat = seats[0].clone();
        seat.status = SeatStatus::Paid;
        fx.state.seats.update(&seat).await.unwrap();

        let err = ReservationService::new(fx.state.clone())
            .reserve(event.id, fx.user.id, &[seat.id], 1)
            .await
            .unwrap_err();
        match err {
            AppError::SeatsUnavailable(unavailable) => {
                assert_eq!(unavailable[0].reason, UnavailableReason::NotAvailable)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn elapsed_hold_can_be_taken_over() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 1, 20.0).await;
        let service = ReservationService::new(fx.state.clone());

        service.reserve(event.id, fx.user.id, &[seats[0].id], 1).await.unwrap();
        fx.clock.advance(Duration::minutes(15));
        service.reserve(event.id, fx.other.id, &[seats[0].id], 1).await.unwrap();

        assert_eq!(fx.reload_seat(seats[0].id).await.reserved_by, Some(fx.other.id));
    }

    #[tokio::test]
    async fn concurrent_reservations_have_one_winner() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 1, 20.0).await;
        let (event_id, seat_id) = (event.id, seats[0].id);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let state = fx.state.clone();
            handles.push(tokio::spawn(async move {
                ReservationService::new(state)
                    .reserve(event_id, Uuid::new_v4(), &[seat_id], 1)
                    .await
                    .is_ok()
            }));
        }
        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn release_only_touches_own_holds() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 3, 20.0).await;
        let service = ReservationService::new(fx.state.clone());
        service.reserve(event.id, fx.user.id, &ids(&seats[..2]), 2).await.unwrap();
        service.reserve(event.id, fx.other.id, &[seats[2].id], 1).await.unwrap();

        let released = service.release(fx.user.id, &ids(&seats)).await.unwrap();
        assert_eq!(released, 2);
        assert_eq!(fx.reload_seat(seats[0].id).await.status, SeatStatus::Available);
        assert_eq!(fx.reload_seat(seats[2].id).await.status, SeatStatus::Reserved);

        let err = service.release(fx.user.id, &ids(&seats)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = service.release(fx.user.id, &[]).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }
}
