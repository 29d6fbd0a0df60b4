pub mod cache;
pub mod clock;
pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod middleware;
pub mod models;
pub mod redis_client;
pub mod repository;
pub mod services;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::cache::SeatMapCache;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageBackend};
use crate::database::Database;
use crate::middleware::encode_token;
use crate::models::user::{Gender, NewUser, Role};
use crate::redis_client::RedisClient;
use crate::repository::{
    BookingRepository, EventRepository, MemoryStore, NotificationRepository, SeatRepository,
    TicketRepository, UserRepository,
};
use crate::services::notifications::NotificationDispatcher;

// Shared state for the whole application
pub struct AppState {
    pub config: Config,
    pub db: Option<Database>,
    pub events: Arc<dyn EventRepository>,
    pub seats: Arc<dyn SeatRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub tickets: Arc<dyn TicketRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub users: Arc<dyn UserRepository>,
    pub cache: SeatMapCache,
    pub notifier: NotificationDispatcher,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Connects the configured storage backend and optional seat map cache.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let cache = match &config.redis.url {
            Some(url) => match RedisClient::new(url).await {
                Ok(redis) => {
                    info!("Redis connected, seat map cache enabled");
                    SeatMapCache::new(redis, config.redis.seat_map_ttl_seconds)
                }
                Err(e) => {
                    warn!("Redis unavailable, seat map cache disabled: {}", e);
                    SeatMapCache::disabled()
                }
            },
            None => SeatMapCache::disabled(),
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        match config.database.storage {
            StorageBackend::Postgres => {
                let db = Database::new(&config.database.url, config.database.pool_size).await?;
                db.run_migrations().await?;
                let store = Arc::new(db.store());
                Ok(Self::from_store(config, store, Some(db), cache, clock))
            }
            StorageBackend::Memory => {
                warn!("Using in-memory storage; data is lost on restart");
                let store = Arc::new(MemoryStore::new());
                seed_demo_users(&store, &config)?;
                Ok(Self::from_store(config, store, None, cache, clock))
            }
        }
    }

    pub fn from_store<S>(
        config: Config,
        store: Arc<S>,
        db: Option<Database>,
        cache: SeatMapCache,
        clock: Arc<dyn Clock>,
    ) -> Arc<Self>
    where
        S: EventRepository
            + SeatRepository
            + BookingRepository
            + TicketRepository
            + NotificationRepository
            + UserRepository
            + 'static,
    {
        let notifications: Arc<dyn NotificationRepository> = store.clone();
        let users: Arc<dyn UserRepository> = store.clone();
        let notifier = NotificationDispatcher::spawn(
            config.booking.notification_queue_size,
            notifications.clone(),
            users.clone(),
            clock.clone(),
        );

        Arc::new(Self {
            config,
            db,
            events: store.clone(),
            seats: store.clone(),
            bookings: store.clone(),
            tickets: store.clone(),
            notifications,
            users,
            cache,
            notifier,
            clock,
        })
    }

    /// In-process instance backed by [`MemoryStore`], returning the store for seeding.
    pub fn in_memory(config: Config, clock: Arc<dyn Clock>) -> (Arc<Self>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Self::from_store(config, store.clone(), None, SeatMapCache::disabled(), clock);
        (state, store)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

pub const DEMO_PASSWORD: &str = "Passw0rd!";

/// Seeds an admin and a regular user into a fresh in-memory store and logs
/// their access tokens. Both sign in with [`DEMO_PASSWORD`].
fn seed_demo_users(store: &MemoryStore, config: &Config) -> anyhow::Result<()> {
    let ttl = chrono::Duration::hours(config.jwt.expires_in_hours);
    let password_hash = bcrypt::hash(DEMO_PASSWORD, config.jwt.bcrypt_cost)?;
    for (role, first_name) in [(Role::Admin, "Admin"), (Role::User, "Demo")] {
        let user = NewUser {
            first_name: first_name.to_string(),
            last_name: "User".to_string(),
            email: format!("{}@example.com", first_name.to_lowercase()),
            password_hash: password_hash.clone(),
            gender: Gender::Female,
            age: 30,
            role,
        }
        .into_user(Utc::now());
        let token = encode_token(user.id, role, &config.jwt.secret, ttl)?;
        info!("Seeded {:?} {} <{}>: token {}", role, user.id, user.email, token);
        store.insert_user(user)?;
    }
    Ok(())
}

async fn health(axum::extract::State(state): axum::extract::State<Arc<AppState>>) -> impl IntoResponse {
    let database = match &state.db {
        Some(db) => {
            if db.ping().await {
                "up"
            } else {
                "down"
            }
        }
        None => "memory",
    };
    let status = if database == "down" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (
        status,
        Json(json!({
            "status": if status == StatusCode::OK { "ok" } else { "degraded" },
            "database": database,
            "cache": state.cache.is_enabled(),
        })),
    )
}

/// Full HTTP surface with tracing and CORS layers.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(controllers::routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
