pub mod analytics;
pub mod bookings;
pub mod events;
pub mod notifications;
pub mod seats;
pub mod tickets;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(events::routes())
        .merge(bookings::routes())
        .merge(seats::routes())
        .merge(tickets::routes())
        .merge(notifications::routes())
        .merge(analytics::routes())
        .merge(users::routes())
}
