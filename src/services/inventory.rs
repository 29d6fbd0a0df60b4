use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::AuthUser;
use crate::models::{
    event::SeatingLayout,
    round_cents,
    seat::{NewSeat, SeatCategory, SeatStatus, SEAT_FEATURES},
    Event, Seat,
};
use crate::AppState;

pub const MAX_ROWS: i32 = 500;
pub const MAX_SEATS_PER_ROW: i32 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PricingMode {
    /// One price for the whole grid.
    Flat,
    /// Front rows premium, next rows vip, the rest standard.
    Tiered,
}

#[derive(Debug, Clone)]
pub struct GenerateSeats {
    pub rows: i32,
    pub seats_per_row: i32,
    pub base_price: Option<f64>,
    pub final_price: Option<f64>,
    pub category: Option<SeatCategory>,
    pub mode: PricingMode,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSummary {
    pub event_id: Uuid,
    pub seats_generated: u64,
    pub rows: i32,
    pub seats_per_row: i32,
}

/// Category and multiplier of a row under tiered pricing.
pub fn tier_for_row(row: i32, rows: i32) -> (SeatCategory, f64) {
    // ceil(0.2 * rows) and ceil(0.4 * rows) in integer arithmetic
    let premium_rows = (rows * 2 + 9) / 10;
    let vip_rows = (rows * 4 + 9) / 10;
    if row <= premium_rows {
        (SeatCategory::Premium, 1.5)
    } else if row <= vip_rows {
        (SeatCategory::Vip, 1.2)
    } else {
        (SeatCategory::Standard, 1.0)
    }
}

/// Seats for a full `rows x seats_per_row` grid, row-major.
pub fn plan_seats(event_id: Uuid, request: &GenerateSeats, event_price: f64) -> Vec<NewSeat> {
    let capacity = (request.rows.max(0) * request.seats_per_row.max(0)) as usize;
    let mut seats = Vec::with_capacity(capacity);

    for row in 1..=request.rows {
        let (category, base_price, multiplier, final_price) = match request.mode {
            PricingMode::Flat => {
                let price = request.final_price.or(request.base_price).unwrap_or(event_price);
                let category = request.category.unwrap_or(SeatCategory::Standard);
                (category, price, 1.0, round_cents(price))
            }
            PricingMode::Tiered => {
                let base = request.final_price.or(request.base_price).unwrap_or(event_price);
                let (tier, multiplier) = tier_for_row(row, request.rows);
                let category = request.category.unwrap_or(tier);
                (category, base, multiplier, round_cents(base * multiplier))
            }
        };

        for seat_number in 1..=request.seats_per_row {
            seats.push(NewSeat {
                event_id,
                row_number: row,
                seat_number,
                base_price,
                price_multiplier: multiplier,
                final_price,
                category,
                is_accessible: category == SeatCategory::Accessible,
                features: Vec::new(),
            });
        }
    }
    seats
}

#[derive(Debug, Clone, Default)]
pub struct NewSeatRequest {
    pub row_number: i32,
    pub seat_number: i32,
    pub base_price: Option<f64>,
    pub category: Option<SeatCategory>,
    pub features: Vec<String>,
    pub is_accessible: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SeatChanges {
    pub row_number: Option<i32>,
    pub seat_number: Option<i32>,
    pub status: Option<SeatStatus>,
    pub base_price: Option<f64>,
    pub category: Option<SeatCategory>,
    pub features: Option<Vec<String>>,
    pub is_accessible: Option<bool>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    #[serde(flatten)]
    pub seat: Seat,
    pub seat_identifier: String,
    pub status_color: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatMapEvent {
    pub id: Uuid,
    pub title: String,
    pub seating_layout: SeatingLayout,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeatStatistics {
    pub total: usize,
    pub available: usize,
    pub reserved: usize,
    pub paid: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatMap {
    pub event: SeatMapEvent,
    pub seats: BTreeMap<i32, Vec<SeatView>>,
    pub statistics: SeatStatistics,
}

fn validate_features(features: &[String]) -> Result<(), AppError> {
    match features.iter().find(|f| !SEAT_FEATURES.contains(&f.as_str())) {
        Some(bad) => Err(AppError::validation(
            "features",
            format!("Unknown seat feature '{}'", bad),
        )),
        None => Ok(()),
    }
}

fn validate_position(row_number: i32, seat_number: i32) -> Result<(), AppError> {
    if row_number < 1 {
        return Err(AppError::validation("rowNumber", "Row number must be at least 1"));
    }
    if seat_number < 1 {
        return Err(AppError::validation("seatNumber", "Seat number must be at least 1"));
    }
    Ok(())
}

pub struct InventoryService {
    state: Arc<AppState>,
}

impl InventoryService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    async fn load_event(&self, event_id: Uuid) -> Result<Event, AppError> {
        self.state
            .events
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| AppError::not_found("Event not found"))
    }

    async fn owned_event(&self, event_id: Uuid, actor: &AuthUser, action: &str) -> Result<Event, AppError> {
        let event = self.load_event(event_id).await?;
        if event.created_by != actor.user_id {
            return Err(AppError::Forbidden(format!(
                "Access denied. You can only {} seats for events you created.",
                action
            )));
        }
        Ok(event)
    }

    /// Bulk-creates the seat grid of an event that has no seats yet.
    pub async fn generate(&self, event_id: Uuid, request: GenerateSeats) -> Result<GenerationSummary, AppError> {
        if !(1..=MAX_ROWS).contains(&request.rows) {
            return Err(AppError::validation(
                "rows",
                format!("Rows must be between 1 and {}", MAX_ROWS),
            ));
        }
        if !(1..=MAX_SEATS_PER_ROW).contains(&request.seats_per_row) {
            return Err(AppError::validation(
                "seatsPerRow",
                format!("Seats per row must be between 1 and {}", MAX_SEATS_PER_ROW),
            ));
        }
        for (field, price) in [("basePrice", request.base_price), ("finalPrice", request.final_price)] {
            if price.map(|p| p < 0.0).unwrap_or(false) {
                return Err(AppError::validation(field, "Price cannot be negative"));
            }
        }

        let event = self.load_event(event_id).await?;
        if self.state.seats.count_by_event(event_id).await? > 0 {
            return Err(AppError::Conflict(
                "Seats already exist for this event. Delete existing seats first.".to_string(),
            ));
        }

        let seats = plan_seats(event_id, &request, event.price);
        let generated = self.state.seats.insert_many(seats, self.state.now()).await?;

        if request.mode == PricingMode::Flat {
            let layout = SeatingLayout {
                layout_type: event.seating_layout.layout_type,
                rows: request.rows,
                seats_per_row: request.seats_per_row,
            };
            self.state.events.set_seating_layout(event_id, layout).await?;
        }
        self.state.cache.invalidate(event_id).await;

        info!(
            "Generated {} seats ({}x{}, {:?}) for event {}",
            generated, request.rows, request.seats_per_row, request.mode, event_id
        );
        Ok(GenerationSummary {
            event_id,
            seats_generated: generated,
            rows: request.rows,
            seats_per_row: request.seats_per_row,
        })
    }

    pub async fn create_seat(&self, event_id: Uuid, req: NewSeatRequest) -> Result<Seat, AppError> {
        validate_position(req.row_number, req.seat_number)?;
        validate_features(&req.features)?;
        if req.base_price.map(|p| p < 0.0).unwrap_or(false) {
            return Err(AppError::validation("basePrice", "Price cannot be negative"));
        }

        let event = self.load_event(event_id).await?;
        let category = req.category.unwrap_or(SeatCategory::Standard);
        let base_price = req.base_price.unwrap_or(event.price);
        let multiplier = category.multiplier();

        let seat = self
            .state
            .seats
            .insert(
                NewSeat {
                    event_id,
                    row_number: req.row_number,
                    seat_number: req.seat_number,
                    base_price,
                    price_multiplier: multiplier,
                    final_price: round_cents(base_price * multiplier),
                    category,
                    is_accessible: req.is_accessible || category == SeatCategory::Accessible,
                    features: req.features,
                },
                self.state.now(),
            )
            .await?;

        self.state.cache.invalidate(event_id).await;
        Ok(seat)
    }

    pub async fn update_seat(&self, seat_id: Uuid, actor: &AuthUser, changes: SeatChanges) -> Result<Seat, AppError> {
        let mut seat = self
            .state
            .seats
            .find_by_id(seat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Seat not found"))?;
        self.owned_event(seat.event_id, actor, "update").await?;

        if let Some(row) = changes.row_number {
            seat.row_number = row;
        }
        if let Some(number) = changes.seat_number {
            seat.seat_number = number;
        }
        validate_position(seat.row_number, seat.seat_number)?;

        if let Some(status) = changes.status {
            if !matches!(status, SeatStatus::Available | SeatStatus::Blocked) {
                return Err(AppError::validation(
                    "status",
                    "Seat status can only be set to available or blocked",
                ));
            }
            let now = self.state.now();
            if matches!(seat.effective_status(now), SeatStatus::Reserved | SeatStatus::Paid) {
                return Err(AppError::state("Cannot change status of a reserved or paid seat"));
            }
            seat = seat.presented(now);
            seat.status = status;
        }
        if let Some(base_price) = changes.base_price {
            if base_price < 0.0 {
                return Err(AppError::validation("basePrice", "Price cannot be negative"));
            }
            seat.base_price = base_price;
            seat.final_price = round_cents(base_price * seat.price_multiplier);
        }
        if let Some(category) = changes.category {
            if category != seat.category {
                seat.set_category(category);
            }
        }
        if let Some(features) = changes.features {
            validate_features(&features)?;
            seat.features = features;
        }
        if let Some(accessible) = changes.is_accessible {
            seat.is_accessible = accessible;
        }
        if let Some(active) = changes.is_active {
            seat.is_active = active;
        }

        let updated = self.state.seats.update(&seat).await?;
        self.state.cache.invalidate(updated.event_id).await;
        Ok(updated)
    }

    pub async fn delete_seat(&self, seat_id: Uuid, actor: &AuthUser) -> Result<(), AppError> {
        let seat = self
            .state
            .seats
            .find_by_id(seat_id)
            .await?
            .ok_or_else(|| AppError::not_found("Seat not found"))?;
        self.owned_event(seat.event_id, actor, "delete").await?;

        if matches!(
            seat.effective_status(self.state.now()),
            SeatStatus::Paid | SeatStatus::Reserved
        ) {
            return Err(AppError::state("Cannot delete seat that is paid or reserved"));
        }

        self.state.seats.delete(seat_id).await?;
        self.state.cache.invalidate(seat.event_id).await;
        Ok(())
    }

    /// Active seats grouped by row, with elapsed holds shown as available.
    pub async fn seat_map(&self, event_id: Uuid) -> Result<SeatMap, AppError> {
        let event = self.load_event(event_id).await?;
        let seats = self.state.seats.list_active_by_event(event_id).await?;
        let now = self.state.now();

        let mut statistics = SeatStatistics {
            total: seats.len(),
            ..Default::default()
        };
        let mut rows: BTreeMap<i32, Vec<SeatView>> = BTreeMap::new();
        for seat in seats {
            let seat = seat.presented(now);
            match seat.status {
                SeatStatus::Available => statistics.available += 1,
                SeatStatus::Reserved => statistics.reserved += 1,
                SeatStatus::Paid => statistics.paid += 1,
                SeatStatus::Blocked => {}
            }
            rows.entry(seat.row_number).or_default().push(SeatView {
                seat_identifier: seat.identifier(),
                status_color: seat.status.color(),
                seat,
            });
        }

        Ok(SeatMap {
            event: SeatMapEvent {
                id: event.id,
                title: event.title,
                seating_layout: event.seating_layout,
            },
            seats: rows,
            statistics,
        })
    }

    /// Seat map as JSON, served from the cache when possible.
    pub async fn seat_map_json(&self, event_id: Uuid) -> Result<String, AppError> {
        if let Some(hit) = self.state.cache.get(event_id).await {
            return Ok(hit);
        }
        let map = self.seat_map(event_id).await?;
        let json = serde_json::to_string(&map)
            .map_err(|e| AppError::Internal(format!("seat map serialization failed: {}", e)))?;
        self.state.cache.put(event_id, &json).await;
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fixtures::Fixture;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn request(rows: i32, seats_per_row: i32, mode: PricingMode) -> GenerateSeats {
        GenerateSeats {
            rows,
            seats_per_row,
            base_price: None,
            final_price: None,
            category: None,
            mode,
        }
    }

    #[test]
    fn tiers_follow_row_bands() {
        // 10 rows: 2 premium, 2 vip, 6 standard
        assert_eq!(tier_for_row(1, 10), (SeatCategory::Premium, 1.5));
        assert_eq!(tier_for_row(2, 10), (SeatCategory::Premium, 1.5));
        assert_eq!(tier_for_row(3, 10), (SeatCategory::Vip, 1.2));
        assert_eq!(tier_for_row(4, 10), (SeatCategory::Vip, 1.2));
        assert_eq!(tier_for_row(5, 10), (SeatCategory::Standard, 1.0));
        // A single row is entirely premium
        assert_eq!(tier_for_row(1, 1).0, SeatCategory::Premium);
    }

    #[test]
    fn tiered_prices_are_rounded() {
        let mut s = request(5, 1, PricingMode::Tiered);
        s.base_price = Some(10.01);
        let seats = plan_seats(Uuid::new_v4(), &s, 99.0);
        // 5 rows: 1 premium, 1 vip, 3 standard
        assert_eq!(seats[0].category, SeatCategory::Premium);
        assert_eq!(seats[1].category, SeatCategory::Vip);
        assert_eq!(seats[1].final_price, 12.01);
        assert_eq!(seats[4].final_price, 10.01);
    }

    #[test]
    fn explicit_category_overrides_only_the_label() {
        let mut s = request(5, 2, PricingMode::Tiered);
        s.category = Some(SeatCategory::Accessible);
        let seats = plan_seats(Uuid::new_v4(), &s, 10.0);
        assert!(seats.iter().all(|seat| seat.category == SeatCategory::Accessible));
        assert_eq!(seats[0].price_multiplier, 1.5);
    }

    proptest! {
        #[test]
        fn grid_is_complete_and_unique(rows in 1i32..40, per_row in 1i32..40, tiered in any::<bool>()) {
            let mode = if tiered { PricingMode::Tiered } else { PricingMode::Flat };
            let seats = plan_seats(Uuid::new_v4(), &request(rows, per_row, mode), 25.0);
            prop_assert_eq!(seats.len(), (rows * per_row) as usize);

            let positions: HashSet<(i32, i32)> =
                seats.iter().map(|s| (s.row_number, s.seat_number)).collect();
            prop_assert_eq!(positions.len(), seats.len());
            prop_assert!(seats.iter().all(|s| s.row_number >= 1 && s.seat_number >= 1));
        }

        #[test]
        fn tier_bands_are_monotonic(rows in 1i32..200) {
            let mut last = 2.0;
            for row in 1..=rows {
                let (_, multiplier) = tier_for_row(row, rows);
                prop_assert!(multiplier <= last);
                last = multiplier;
            }
            let premium = (1..=rows).filter(|r| tier_for_row(*r, rows).0 == SeatCategory::Premium).count() as f64;
            prop_assert!(premium >= 0.2 * rows as f64);
        }
    }

    #[tokio::test]
    async fn generates_full_grid_of_available_seats() {
        let fx = Fixture::new().await;
        let event = fx.event(3, 4, 20.0).await;
        let service = InventoryService::new(fx.state.clone());

        let summary = service.generate(event.id, request(3, 4, PricingMode::Flat)).await.unwrap();
        assert_eq!(summary.seats_generated, 12);

        let seats = fx.state.seats.list_active_by_event(event.id).await.unwrap();
        assert_eq!(seats.len(), 12);
        assert!(seats.iter().all(|s| s.status == SeatStatus::Available && s.is_active));
        assert!(seats.iter().all(|s| s.final_price == 20.0));
    }

    #[tokio::test]
    async fn second_generation_conflicts() {
        let fx = Fixture::new().await;
        let (event, _) = fx.event_with_seats(2, 2, 10.0).await;
        let err = InventoryService::new(fx.state.clone())
            .generate(event.id, request(2, 2, PricingMode::Tiered))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn flat_generation_updates_layout() {
        let fx = Fixture::new().await;
        let event = fx.event(1, 6, 10.0).await;
        InventoryService::new(fx.state.clone())
            .generate(event.id, request(2, 3, PricingMode::Flat))
            .await
            .unwrap();
        let event = fx.reload_event(event.id).await;
        assert_eq!(event.seating_layout.rows, 2);
        assert_eq!(event.seating_layout.seats_per_row, 3);
    }

    #[tokio::test]
    async fn duplicate_single_seat_conflicts() {
        let fx = Fixture::new().await;
        let (event, _) = fx.event_with_seats(1, 2, 10.0).await;
        let service = InventoryService::new(fx.state.clone());

        let err = service
            .create_seat(
                event.id,
                NewSeatRequest {
                    row_number: 1,
                    seat_number: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let vip = service
            .create_seat(
                event.id,
                NewSeatRequest {
                    row_number: 2,
                    seat_number: 1,
                    category: Some(SeatCategory::Vip),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(vip.final_price, 20.0);
    }

    #[tokio::test]
    async fn seat_map_groups_rows_and_counts_statuses() {
        let fx = Fixture::new().await;
        let (event, seats) = fx.event_with_seats(2, 3, 10.0).await;
        let now = fx.state.now();
        fx.state
            .seats
            .try_reserve(seats[0].id, fx.user.id, now, now + chrono::Duration::minutes(15))
            .await
            .unwrap()
            .unwrap();

        let map = InventoryService::new(fx.state.clone()).seat_map(event.id).await.unwrap();
        assert_eq!(map.seats.len(), 2);
        assert_eq!(map.seats[&1][0].seat_identifier, "A1");
        assert_eq!(map.seats[&2][2].seat_identifier, "B3");
        assert_eq!(
            map.statistics,
            SeatStatistics { total: 6, available: 5, reserved: 1, paid: 0 }
        );

        // An elapsed hold is shown as available
        fx.clock.advance(chrono::Duration::minutes(16));
        let map = InventoryService::new(fx.state.clone()).seat_map(event.id).await.unwrap();
        assert_eq!(map.statistics.available, 6);
        assert_eq!(map.seats[&1][0].status_color, "#D3D3D3");
    }

    #[tokio::test]
    async fn held_seat_cannot_be_deleted_but_free_one_can() {
        let fx = Fixture::new().await;
        let (_, seats) = fx.event_with_seats(1, 2, 10.0).await;
        let now = fx.state.now();
        fx.state
            .seats
            .try_reserve(seats[0].id, fx.user.id, now, now + chrono::Duration::minutes(15))
            .await
            .unwrap();
        let service = InventoryService::new(fx.state.clone());
        let admin = Fixture::auth(&fx.admin);

        let err = service.delete_seat(seats[0].id, &admin).await.unwrap_err();
        assert!(matches!(err, AppError::State(_)));

        let err = service
            .delete_seat(seats[1].id, &Fixture::auth(&fx.other))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        service.delete_seat(seats[1].id, &admin).await.unwrap();
        assert!(fx.state.seats.find_by_id(seats[1].id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn blocking_a_lapsed_hold_clears_hold_fields() {
        let fx = Fixture::new().await;
        let (_, seats) = fx.event_with_seats(1, 2, 10.0).await;
        let now = fx.state.now();
        fx.state
            .seats
            .try_reserve(seats[0].id, fx.user.id, now, now + chrono::Duration::minutes(15))
            .await
            .unwrap()
            .unwrap();
        fx.clock.advance(chrono::Duration::minutes(20));

        InventoryService::new(fx.state.clone())
            .update_seat(
                seats[0].id,
                &Fixture::auth(&fx.admin),
                SeatChanges {
                    status: Some(SeatStatus::Blocked),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let stored = fx.reload_seat(seats[0].id).await;
        assert_eq!(stored.status, SeatStatus::Blocked);
        assert!(stored.reserved_by.is_none());
        assert!(stored.reserved_at.is_none());
        assert!(stored.reservation_expiry.is_none());
    }

    #[tokio::test]
    async fn category_update_reprices_seat() {
        let fx = Fixture::new().await;
        let (_, seats) = fx.event_with_seats(1, 1, 10.0).await;
        let updated = InventoryService::new(fx.state.clone())
            .update_seat(
                seats[0].id,
                &Fixture::auth(&fx.admin),
                SeatChanges {
                    category: Some(SeatCategory::Premium),
                    features: Some(vec!["aisle".to_string()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.price_multiplier, 1.5);
        assert_eq!(updated.final_price, 15.0);
        assert_eq!(updated.features, vec!["aisle".to_string()]);
    }
}
