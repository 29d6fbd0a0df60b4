pub mod accounts;
pub mod analytics;
pub mod booking;
pub mod cancellation;
pub mod catalog;
pub mod cleanup;
pub mod inventory;
pub mod notifications;
pub mod payment;
pub mod reservation;
pub mod tickets;

#[cfg(test)]
pub(crate) mod fixtures;
