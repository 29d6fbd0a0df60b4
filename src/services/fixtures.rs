//! Shared setup for service tests: an in-memory state on a manual clock
//! with an admin and two regular users.

use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::clock::ManualClock;
use crate::config::Config;
use crate::middleware::AuthUser;
use crate::models::{
    event::{EventCategory, LayoutType, NewEvent, SeatingLayout},
    user::{Gender, Role},
    Event, Seat, User,
};
use crate::services::inventory::{GenerateSeats, InventoryService, PricingMode};
use crate::AppState;

pub struct Fixture {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub admin: User,
    pub user: User,
    pub other: User,
}

pub fn user(role: Role, first_name: &str) -> User {
    User {
        id: Uuid::new_v4(),
        first_name: first_name.to_string(),
        last_name: "Tester".to_string(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        password_hash: "not-a-bcrypt-hash".to_string(),
        gender: Gender::Male,
        age: 30,
        role,
        is_active: true,
        last_login: None,
        created_at: Utc::now(),
    }
}

impl Fixture {
    pub async fn new() -> Self {
        Self::with_config(Config::in_memory("test-secret")).await
    }

    pub async fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (state, store) = AppState::in_memory(config, clock.clone());
        let admin = user(Role::Admin, "Ada");
        let regular = user(Role::User, "Uma");
        let other = user(Role::User, "Vic");
        for u in [&admin, &regular, &other] {
            store.insert_user(u.clone()).unwrap();
        }
        Self {
            state,
            clock,
            admin,
            user: regular,
            other,
        }
    }

    pub fn auth(user: &User) -> AuthUser {
        AuthUser {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    /// Published event owned by the admin, without seats.
    pub async fn event(&self, rows: i32, seats_per_row: i32, price: f64) -> Event {
        let now = self.state.now();
        self.state
            .events
            .create(
                NewEvent {
                    title: "Rust Conf".to_string(),
                    description: "A conference about Rust".to_string(),
                    date: now + Duration::days(30),
                    location: "Main Hall".to_string(),
                    capacity: rows * seats_per_row,
                    price,
                    category: EventCategory::Conference,
                    booking_deadline: now + Duration::days(29),
                    refund_policy: None,
                    seating_layout: SeatingLayout {
                        layout_type: LayoutType::Theater,
                        rows,
                        seats_per_row,
                    },
                    created_by: self.admin.id,
                },
                now,
            )
            .await
            .unwrap()
    }

    /// Event with a flat-priced generated grid; seats ordered by (row, seat).
    pub async fn event_with_seats(&self, rows: i32, seats_per_row: i32, price: f64) -> (Event, Vec<Seat>) {
        let event = self.event(rows, seats_per_row, price).await;
        InventoryService::new(self.state.clone())
            .generate(
                event.id,
                GenerateSeats {
                    rows,
                    seats_per_row,
                    base_price: None,
                    final_price: None,
                    category: None,
                    mode: PricingMode::Flat,
                },
            )
            .await
            .unwrap();
        let seats = self.state.seats.list_active_by_event(event.id).await.unwrap();
        (event, seats)
    }

    pub async fn reload_event(&self, id: Uuid) -> Event {
        self.state.events.find_by_id(id).await.unwrap().unwrap()
    }

    pub async fn reload_seat(&self, id: Uuid) -> Seat {
        self.state.seats.find_by_id(id).await.unwrap().unwrap()
    }
}
