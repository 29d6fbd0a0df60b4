pub mod booking;
pub mod event;
pub mod notification;
pub mod seat;
pub mod ticket;
pub mod user;

pub use booking::EventBooking;
pub use event::Event;
pub use notification::Notification;
pub use seat::Seat;
pub use ticket::{Payment, Ticket};
pub use user::User;

/// Rounds a money amount to whole cents.
pub fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
