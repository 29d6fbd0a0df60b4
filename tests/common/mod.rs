#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use event_booking::{
    app,
    clock::ManualClock,
    config::Config,
    middleware::encode_token,
    models::{
        user::{Gender, Role},
        User,
    },
    repository::MemoryStore,
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const SECRET: &str = "integration-secret";

pub struct TestUser {
    pub user: User,
    pub token: String,
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub admin: TestUser,
    pub alice: TestUser,
    pub bob: TestUser,
}

/// Password every seeded user signs in with.
pub const PASSWORD: &str = "Passw0rd!";

fn seed(store: &MemoryStore, role: Role, name: &str) -> TestUser {
    let user = User {
        id: Uuid::new_v4(),
        first_name: name.to_string(),
        last_name: "Test".to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        password_hash: bcrypt::hash(PASSWORD, 4).unwrap(),
        gender: Gender::Female,
        age: 28,
        role,
        is_active: true,
        last_login: None,
        created_at: Utc::now(),
    };
    store.insert_user(user.clone()).unwrap();
    let token = encode_token(user.id, role, SECRET, Duration::hours(1)).unwrap();
    TestUser { user, token }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(Config::in_memory(SECRET)).await
    }

    pub async fn with_config(config: Config) -> Self {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let (state, store) = AppState::in_memory(config, clock.clone());
        let admin = seed(&store, Role::Admin, "Admin");
        let alice = seed(&store, Role::User, "Alice");
        let bob = seed(&store, Role::User, "Bob");
        Self {
            router: app(state.clone()),
            state,
            store,
            clock,
            admin,
            alice,
            bob,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        (status, parse_body(response).await)
    }

    /// Sends a request with arbitrary headers and hands back the raw response.
    pub async fn send(&self, method: Method, uri: &str, headers: &[(&str, &str)]) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.router
            .clone()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    /// Creates an event through the API; seats are generated with it.
    pub async fn create_event(&self, rows: i32, seats_per_row: i32, price: f64) -> String {
        let now = self.state.now();
        let (status, body) = self
            .post(
                "/events",
                &self.admin.token,
                json!({
                    "title": "Integration Night",
                    "description": "An evening of tests",
                    "date": (now + Duration::days(20)).to_rfc3339(),
                    "location": "Hall 1",
                    "capacity": rows * seats_per_row,
                    "price": price,
                    "category": "concert",
                    "bookingDeadline": (now + Duration::days(19)).to_rfc3339(),
                    "seatingLayout": { "type": "theater", "rows": rows, "seatsPerRow": seats_per_row }
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["event"]["id"].as_str().unwrap().to_string()
    }

    /// Seat ids of an event keyed by identifier (`A1`, `A2`, ...).
    pub async fn seat_ids(&self, event_id: &str) -> Vec<(String, String)> {
        let (status, body) = self.get(&format!("/events/{}/seats", event_id), None).await;
        assert_eq!(status, StatusCode::OK);
        let mut seats = Vec::new();
        for row in body["seats"].as_object().unwrap().values() {
            for seat in row.as_array().unwrap() {
                seats.push((
                    seat["seatIdentifier"].as_str().unwrap().to_string(),
                    seat["id"].as_str().unwrap().to_string(),
                ));
            }
        }
        seats.sort();
        seats
    }
}

pub async fn parse_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
}
