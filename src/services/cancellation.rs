use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::BookingStatus,
    notification::{NotificationDraft, NotificationType},
    EventBooking,
};
use crate::AppState;

pub struct CancellationService {
    state: Arc<AppState>,
}

impl CancellationService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Cancels the caller's booking for `event_id` and gives its tickets back
    /// to the event counter. Paid seats stay paid unless
    /// `booking.release_seats_on_cancel` is set.
    pub async fn cancel(&self, event_id: Uuid, user_id: Uuid) -> Result<EventBooking, AppError> {
        let booking = self
            .state
            .bookings
            .find_by_event_and_user(event_id, user_id)
            .await?
            .ok_or_else(|| AppError::not_found("No booking found for this event"))?;

        match booking.status {
            BookingStatus::Cancelled => return Err(AppError::state("Booking is already cancelled")),
            BookingStatus::Completed => return Err(AppError::state("Cannot cancel completed booking")),
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let now = self.state.now();
        let cancelled = self
            .state
            .bookings
            .cancel(booking.id, user_id, now)
            .await?
            .ok_or_else(|| AppError::state("Booking is already cancelled"))?;

        let event = match self
            .state
            .events
            .adjust_bookings(event_id, -cancelled.number_of_tickets)
            .await
        {
            Ok(event) => event,
            Err(e) => {
                error!("Failed to restore counter for event {}: {}", event_id, e);
                None
            }
        };

        if self.state.config.booking.release_seats_on_cancel {
            match self.state.seats.release_booking_seats(cancelled.id).await {
                Ok(released) => {
                    if released > 0 {
                        info!("Released {} seat(s) of booking {}", released, cancelled.id);
                    }
                    self.state.cache.invalidate(event_id).await;
                }
                Err(e) => error!("Failed to release seats of booking {}: {}", cancelled.id, e),
            }
        }

        info!("User {} cancelled booking {} for event {}", user_id, cancelled.id, event_id);

        let mut draft = NotificationDraft::new(
            NotificationType::BookingCancelled,
            "Booking cancelled",
            format!("Your booking of {} ticket(s) has been cancelled.", cancelled.number_of_tickets),
        );
        match &event {
            Some(event) => draft = draft.for_event(event.id, &event.title),
            None => warn!("Event {} missing while cancelling booking {}", event_id, cancelled.id),
        }
        self.state.notifier.notify(user_id, draft);

        Ok(cancelled)
    }
}
