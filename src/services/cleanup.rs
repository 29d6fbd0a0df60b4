use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::AppState;

pub struct CleanupService {
    state: Arc<AppState>,
}

impl CleanupService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Reverts every elapsed seat hold to available. Returns the number of
    /// events whose seat maps changed.
    pub async fn run_reservation_sweep(&self) -> usize {
        let touched = match self.state.seats.release_expired(self.state.now()).await {
            Ok(events) => events,
            Err(e) => {
                error!("Reservation sweep failed: {}", e);
                return 0;
            }
        };

        if touched.is_empty() {
            debug!("No expired seat holds");
            return 0;
        }
        for event_id in &touched {
            self.state.cache.invalidate(*event_id).await;
        }
        info!("Released expired seat holds in {} event(s)", touched.len());
        touched.len()
    }

    /// Drops revoked-token entries whose tokens have expired anyway.
    pub async fn purge_revoked_tokens(&self) -> u64 {
        match self.state.users.purge_revoked_tokens(self.state.now()).await {
            Ok(0) => 0,
            Ok(purged) => {
                debug!("Purged {} expired revoked token(s)", purged);
                purged
            }
            Err(e) => {
                error!("Revoked token purge failed: {}", e);
                0
            }
        }
    }

    /// Runs both sweeps every `booking.sweep_interval_seconds` until aborted.
    pub fn spawn(state: Arc<AppState>) -> JoinHandle<()> {
        let period = Duration::from_secs(state.config.booking.sweep_interval_seconds.max(1));
        let service = Self::new(state);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                service.run_reservation_sweep().await;
                service.purge_revoked_tokens().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::seat::SeatStatus;
    use crate::services::fixtures::Fixture;
    use crate::services::reservation::ReservationService;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn sweep_releases_only_elapsed_holds() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(1, 3, 10.0).await;
        let reservations = ReservationService::new(fx.state.clone());
        reservations
            .reserve(event.id, fx.user.id, &[seats[0].id], 1)
            .await
            .unwrap();
        fx.clock.advance(ChronoDuration::minutes(10));
        reservations
            .reserve(event.id, fx.other.id, &[seats[1].id], 1)
            .await
            .unwrap();
        fx.clock.advance(ChronoDuration::minutes(6));

        let service = CleanupService::new(fx.state.clone());
        assert_eq!(service.run_reservation_sweep().await, 1);

        let expired = fx.reload_seat(seats[0].id).await;
        assert_eq!(expired.status, SeatStatus::Available);
        assert!(expired.reserved_by.is_none());
        assert!(expired.reservation_expiry.is_none());
        assert_eq!(fx.reload_seat(seats[1].id).await.status, SeatStatus::Reserved);

        assert_eq!(service.run_reservation_sweep().await, 0);
    }

    #[tokio::test]
    async fn purge_drops_only_expired_revocations() {
        let fx = Fixture::new().await;
        let now = fx.state.now();
        let users = &fx.state.users;
        let (old, fresh) = (uuid::Uuid::new_v4(), uuid::Uuid::new_v4());
        users.revoke_token(old, fx.user.id, now + ChronoDuration::minutes(5)).await.unwrap();
        users.revoke_token(fresh, fx.user.id, now + ChronoDuration::hours(2)).await.unwrap();

        let service = CleanupService::new(fx.state.clone());
        assert_eq!(service.purge_revoked_tokens().await, 0);
        fx.clock.advance(ChronoDuration::minutes(30));
        assert_eq!(service.purge_revoked_tokens().await, 1);

        assert!(!users.is_token_revoked(old).await.unwrap());
        assert!(users.is_token_revoked(fresh).await.unwrap());
    }
}
