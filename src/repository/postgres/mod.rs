mod bookings;
mod events;
mod notifications;
mod seats;
mod tickets;
mod users;

use sqlx::PgPool;

use crate::error::{is_unique_violation, AppError};

/// Postgres-backed implementation of every repository port.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a unique violation to a Conflict carrying `message`.
fn conflict_on_unique(message: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |err| {
        if is_unique_violation(&err) {
            AppError::Conflict(message.to_string())
        } else {
            AppError::from(err)
        }
    }
}

/// Name of the constraint or index a database error was raised for.
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    err.as_database_error().and_then(|db_err| db_err.constraint())
}
