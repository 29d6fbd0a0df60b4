use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{
    event::{EventCategory, EventView, LayoutType, NewEvent, SeatingLayout},
    notification::{NotificationDraft, NotificationType, Priority},
    seat::SeatCategory,
    Event,
};
use crate::services::inventory::{GenerateSeats, InventoryService, PricingMode};
use crate::AppState;

const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInput {
    #[serde(rename = "type", default)]
    pub layout_type: Option<LayoutType>,
    pub rows: i32,
    pub seats_per_row: i32,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEvent {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: String,
    pub date: DateTime<Utc>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: i32,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: f64,
    pub category: EventCategory,
    pub booking_deadline: DateTime<Utc>,
    #[validate(length(max = 500, message = "Refund policy cannot exceed 500 characters"))]
    pub refund_policy: Option<String>,
    pub seating_layout: LayoutInput,
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEvent {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: Option<String>,
    #[validate(range(min = 1, message = "Capacity must be at least 1"))]
    pub capacity: Option<i32>,
    #[validate(range(min = 0.0, message = "Price cannot be negative"))]
    pub price: Option<f64>,
    pub category: Option<EventCategory>,
    pub booking_deadline: Option<DateTime<Utc>>,
    #[validate(length(max = 500, message = "Refund policy cannot exceed 500 characters"))]
    pub refund_policy: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseQuery {
    pub search: Option<String>,
    pub category: Option<EventCategory>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub location: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl BrowseQuery {
    fn matches(&self, event: &Event) -> bool {
        let contains = |haystack: &str, needle: &str| haystack.to_lowercase().contains(&needle.to_lowercase());

        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            if !contains(&event.title, search) && !contains(&event.description, search) {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref().filter(|s| !s.is_empty()) {
            if !contains(&event.location, location) {
                return false;
            }
        }
        self.category.map_or(true, |c| event.category == c)
            && self.start_date.map_or(true, |d| event.date >= d)
            && self.end_date.map_or(true, |d| event.date <= d)
            && self.min_price.map_or(true, |p| event.price >= p)
            && self.max_price.map_or(true, |p| event.price <= p)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_events: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventPage {
    pub events: Vec<EventView>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedEvent {
    pub event: EventView,
    pub seats_generated: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedEvent {
    pub cancelled_bookings: usize,
    pub deleted_seats: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSeat {
    pub id: Uuid,
    pub row_number: i32,
    pub seat_number: i32,
    pub seat_identifier: String,
    pub category: SeatCategory,
    pub final_price: f64,
}

/// Catalog-wide event counts by calendar day relative to today.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedEvents {
    pub active: usize,
    pub upcoming: usize,
    pub closed: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub event: EventView,
    pub available_seats: Vec<AvailableSeat>,
    pub total_available_seats: usize,
    pub popularity: i32,
    pub grouped_events: GroupedEvents,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorSummary {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminEvent {
    #[serde(flatten)]
    pub event: EventView,
    pub creator: Option<CreatorSummary>,
}

fn check_schedule(date: DateTime<Utc>, deadline: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), AppError> {
    if date <= now {
        return Err(AppError::validation("date", "Event date must be in the future"));
    }
    if deadline <= now {
        return Err(AppError::validation(
            "bookingDeadline",
            "Booking deadline must be in the future",
        ));
    }
    if deadline > date {
        return Err(AppError::validation(
            "bookingDeadline",
            "Booking deadline must be before the event date",
        ));
    }
    Ok(())
}

pub struct CatalogService {
    state: Arc<AppState>,
}

impl CatalogService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn owned_event(&self, event_id: Uuid, actor: &AuthUser, action: &str) -> Result<Event, AppError> {
        let event = self
            .state
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event not found"))?;
        if event.created_by != actor.user_id {
            return Err(AppError::Forbidden(format!(
                "Access denied. You can only {} events you created.",
                action
            )));
        }
        Ok(event)
    }

    /// Stores a published event and lays out its seat grid at the event price.
    pub async fn create(&self, actor: &AuthUser, req: CreateEvent) -> Result<CreatedEvent, AppError> {
        req.validate()?;
        let now = self.state.now();
        check_schedule(req.date, req.booking_deadline, now)?;

        let layout = &req.seating_layout;
        if layout.rows < 1 || layout.seats_per_row < 1 {
            return Err(AppError::validation(
                "seatingLayout",
                "Seating layout must include rows and seatsPerRow",
            ));
        }
        let expected = layout.rows as i64 * layout.seats_per_row as i64;
        if expected != req.capacity as i64 {
            return Err(AppError::validation(
                "seatingLayout",
                format!(
                    "Seating layout ({} x {} = {}) does not match capacity ({})",
                    layout.rows, layout.seats_per_row, expected, req.capacity
                ),
            ));
        }

        let event = self
            .state
            .events
            .create(
                NewEvent {
                    title: req.title,
                    description: req.description,
                    date: req.date,
                    location: req.location,
                    capacity: req.capacity,
                    price: req.price,
                    category: req.category,
                    booking_deadline: req.booking_deadline,
                    refund_policy: req.refund_policy,
                    seating_layout: SeatingLayout {
                        layout_type: layout.layout_type.unwrap_or(LayoutType::Theater),
                        rows: layout.rows,
                        seats_per_row: layout.seats_per_row,
                    },
                    created_by: actor.user_id,
                },
                now,
            )
            .await?;
        info!("Event {} created by {}", event.id, actor.user_id);

        let seats_generated = match InventoryService::new(self.state.clone())
            .generate(
                event.id,
                GenerateSeats {
                    rows: event.seating_layout.rows,
                    seats_per_row: event.seating_layout.seats_per_row,
                    base_price: None,
                    final_price: None,
                    category: None,
                    mode: PricingMode::Flat,
                },
            )
            .await
        {
            Ok(summary) => summary.seats_generated,
            Err(e) => {
                error!("Seat generation failed for event {}: {}", event.id, e);
                0
            }
        };

        self.state.notifier.broadcast(
            NotificationDraft::new(
                NotificationType::EventCreated,
                "New Event Available!",
                format!("A new event titled \"{}\" has been created.", event.title),
            )
            .for_event(event.id, &event.title)
            .priority(Priority::High)
            .action_url(format!("/events/{}", event.id)),
        );

        Ok(CreatedEvent {
            event: event.view(),
            seats_generated,
        })
    }

    pub async fn get(&self, event_id: Uuid) -> Result<EventView, AppError> {
        self.state
            .events
            .find_by_id(event_id)
            .await?
            .map(|e| e.view())
            .ok_or_else(|| AppError::not_found("Event not found"))
    }

    /// Event with its bookable seats and catalog-wide day grouping.
    pub async fn details(&self, event_id: Uuid) -> Result<EventDetails, AppError> {
        let event = self
            .state
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event not found"))?;
        let now = self.state.now();
        let available_seats: Vec<AvailableSeat> = self
            .state
            .seats
            .list_active_by_event(event_id)
            .await?
            .into_iter()
            .filter(|seat| seat.is_available_for_booking(now))
            .map(|seat| AvailableSeat {
                id: seat.id,
                row_number: seat.row_number,
                seat_number: seat.seat_number,
                seat_identifier: seat.identifier(),
                category: seat.category,
                final_price: seat.final_price,
            })
            .collect();

        let today = now.date_naive();
        let mut grouped_events = GroupedEvents::default();
        for other in self.state.events.list_all().await?.iter().filter(|e| e.is_active) {
            match other.date.date_naive().cmp(&today) {
                Ordering::Equal => grouped_events.active += 1,
                Ordering::Greater => grouped_events.upcoming += 1,
                Ordering::Less => grouped_events.closed += 1,
            }
        }

        Ok(EventDetails {
            total_available_seats: available_seats.len(),
            available_seats,
            popularity: event.current_bookings,
            event: event.view(),
            grouped_events,
        })
    }

    /// Every event the caller created, drafts and inactive ones included.
    pub async fn created_by(&self, actor: &AuthUser) -> Result<Vec<AdminEvent>, AppError> {
        let creator = self
            .state
            .users
            .find_by_id(actor.user_id)
            .await?
            .map(|u| CreatorSummary {
                id: u.id,
                first_name: u.first_name,
                last_name: u.last_name,
                email: u.email,
            });
        Ok(self
            .state
            .events
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.created_by == actor.user_id)
            .map(|e| AdminEvent {
                event: e.view(),
                creator: creator.clone(),
            })
            .collect())
    }

    /// Published, active events ordered by date, filtered and paginated.
    pub async fn browse(&self, query: &BrowseQuery) -> Result<EventPage, AppError> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);

        let matching: Vec<Event> = self
            .state
            .events
            .list_published()
            .await?
            .into_iter()
            .filter(|e| query.matches(e))
            .collect();
        let total = matching.len();
        let offset = (page as usize - 1).saturating_mul(limit as usize);
        let events = matching
            .iter()
            .skip(offset)
            .take(limit as usize)
            .map(Event::view)
            .collect();

        Ok(EventPage {
            events,
            pagination: Pagination {
                current_page: page,
                total_pages: total.div_ceil(limit as usize) as u32,
                total_events: total,
            },
        })
    }

    pub async fn update(&self, event_id: Uuid, actor: &AuthUser, req: UpdateEvent) -> Result<EventView, AppError> {
        req.validate()?;
        let mut event = self.owned_event(event_id, actor, "update").await?;

        if let Some(capacity) = req.capacity {
            if capacity < event.current_bookings {
                return Err(AppError::validation(
                    "capacity",
                    format!(
                        "Capacity cannot be lower than current bookings ({})",
                        event.current_bookings
                    ),
                ));
            }
            event.capacity = capacity;
        }
        if req.date.is_some() || req.booking_deadline.is_some() {
            let date = req.date.unwrap_or(event.date);
            let deadline = req.booking_deadline.unwrap_or(event.booking_deadline);
            check_schedule(date, deadline, self.state.now())?;
            event.date = date;
            event.booking_deadline = deadline;
        }
        if let Some(title) = req.title {
            event.title = title;
        }
        if let Some(description) = req.description {
            event.description = description;
        }
        if let Some(location) = req.location {
            event.location = location;
        }
        if let Some(price) = req.price {
            event.price = price;
        }
        if let Some(category) = req.category {
            event.category = category;
        }
        if let Some(policy) = req.refund_policy {
            event.refund_policy = Some(policy);
        }
        if let Some(active) = req.is_active {
            event.is_active = active;
        }
        event.updated_at = self.state.now();

        let updated = self.state.events.update(&event).await?;
        self.state.cache.invalidate(event_id).await;
        info!("Event {} updated by {}", event_id, actor.user_id);

        self.state.notifier.broadcast(
            NotificationDraft::new(
                NotificationType::EventUpdated,
                "Event Updated",
                format!("Event \"{}\" has been updated.", updated.title),
            )
            .for_event(updated.id, &updated.title)
            .action_url(format!("/events/{}", updated.id)),
        );

        Ok(updated.view())
    }

    /// Cancels the event's active bookings, drops its seats and the event itself.
    pub async fn delete(&self, event_id: Uuid, actor: &AuthUser) -> Result<DeletedEvent, AppError> {
        let event = self.owned_event(event_id, actor, "delete").await?;
        let now = self.state.now();

        let cancelled = self
            .state
            .bookings
            .cancel_active_for_event(event_id, actor.user_id, now)
            .await?;
        if !cancelled.is_empty() {
            let affected: BTreeSet<Uuid> = cancelled.iter().map(|b| b.user_id).collect();
            self.state.notifier.notify_many(
                affected,
                &NotificationDraft::new(
                    NotificationType::BookingCancelled,
                    "Booking Cancelled",
                    format!(
                        "Your booking for \"{}\" has been cancelled because the event was deleted.",
                        event.title
                    ),
                )
                .for_event(event.id, &event.title)
                .priority(Priority::High)
                .action_url("/events"),
            );
        }

        let deleted_seats = self.state.seats.delete_by_event(event_id).await?;
        self.state.events.delete(event_id).await?;
        self.state.cache.invalidate(event_id).await;

        info!(
            "Event {} deleted by {}: {} booking(s) cancelled, {} seat(s) removed",
            event_id,
            actor.user_id,
            cancelled.len(),
            deleted_seats
        );

        self.state.notifier.broadcast(
            NotificationDraft::new(
                NotificationType::EventDeleted,
                "Event Cancelled",
                format!("Event \"{}\" has been cancelled/deleted.", event.title),
            )
            .for_event(event.id, &event.title)
            .priority(Priority::High)
            .action_url("/events"),
        );

        Ok(DeletedEvent {
            cancelled_bookings: cancelled.len(),
            deleted_seats,
        })
    }
}
