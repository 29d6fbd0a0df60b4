use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    booking::BookingStatus,
    round_cents,
    ticket::{Payment, TicketStatus},
    EventBooking, Ticket,
};
use crate::AppState;

/// Common reporting view over the two ways a purchase is recorded.
pub trait PurchaseRecord {
    fn event_id(&self) -> Uuid;
    fn user_id(&self) -> Uuid;
    fn tickets(&self) -> i64;
    fn amount(&self) -> f64;
    fn purchased_at(&self) -> DateTime<Utc>;
    /// Cancelled or refunded records count toward totals but not revenue.
    fn is_void(&self) -> bool;
    /// Unsettled records are counted but contribute no sales or revenue.
    fn is_settled(&self) -> bool {
        true
    }
}

impl PurchaseRecord for EventBooking {
    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn tickets(&self) -> i64 {
        self.number_of_tickets as i64
    }

    fn amount(&self) -> f64 {
        self.total_amount
    }

    fn purchased_at(&self) -> DateTime<Utc> {
        self.booking_date
    }

    fn is_void(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// A ticket together with the amount its completed payment settled, if any.
#[derive(Debug, Clone)]
pub struct TicketSale {
    pub ticket: Ticket,
    pub paid: Option<f64>,
}

impl TicketSale {
    /// Pairs every ticket with its completed payment.
    pub fn join(tickets: Vec<Ticket>, payments: &[Payment]) -> Vec<TicketSale> {
        let paid: HashMap<Uuid, f64> = payments.iter().map(|p| (p.ticket_id, p.amount)).collect();
        tickets
            .into_iter()
            .map(|ticket| TicketSale {
                paid: paid.get(&ticket.id).copied(),
                ticket,
            })
            .collect()
    }
}

impl PurchaseRecord for TicketSale {
    fn event_id(&self) -> Uuid {
        self.ticket.event_id
    }

    fn user_id(&self) -> Uuid {
        self.ticket.user_id
    }

    fn tickets(&self) -> i64 {
        1
    }

    fn amount(&self) -> f64 {
        self.paid.unwrap_or(0.0)
    }

    fn purchased_at(&self) -> DateTime<Utc> {
        self.ticket.issued_at
    }

    fn is_void(&self) -> bool {
        matches!(self.ticket.status, TicketStatus::Cancelled | TicketStatus::Refunded)
    }

    fn is_settled(&self) -> bool {
        self.paid.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub records: usize,
    pub voided: usize,
    pub tickets_sold: i64,
    pub revenue: f64,
    pub buyers: usize,
    pub events: usize,
    pub last_purchase_at: Option<DateTime<Utc>>,
}

impl RecordSummary {
    pub fn from_records<R: PurchaseRecord>(records: &[R]) -> Self {
        let mut summary = RecordSummary {
            records: records.len(),
            ..Default::default()
        };
        let mut buyers = Vec::new();
        let mut events = Vec::new();
        for record in records {
            buyers.push(record.user_id());
            events.push(record.event_id());
            summary.last_purchase_at = summary.last_purchase_at.max(Some(record.purchased_at()));
            if record.is_void() {
                summary.voided += 1;
                continue;
            }
            if !record.is_settled() {
                continue;
            }
            summary.tickets_sold += record.tickets();
            summary.revenue += record.amount();
        }
        buyers.sort();
        buyers.dedup();
        events.sort();
        events.dedup();
        summary.buyers = buyers.len();
        summary.events = events.len();
        summary.revenue = round_cents(summary.revenue);
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub bookings: RecordSummary,
    pub tickets: RecordSummary,
    pub total_tickets_sold: i64,
    pub total_revenue: f64,
}

pub async fn summary(state: &Arc<AppState>) -> Result<AnalyticsSummary, AppError> {
    let bookings = RecordSummary::from_records(&state.bookings.list_all().await?);
    let payments = state.tickets.list_completed_payments().await?;
    let sales = TicketSale::join(state.tickets.list_all().await?, &payments);
    let tickets = RecordSummary::from_records(&sales);
    Ok(AnalyticsSummary {
        total_tickets_sold: bookings.tickets_sold + tickets.tickets_sold,
        total_revenue: round_cents(bookings.revenue + tickets.revenue),
        bookings,
        tickets,
    })
}

/// Lowercase wire name of an enum value, as used for grouping keys.
fn wire_name<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountBreakdown {
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_status: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_category: Option<BTreeMap<String, usize>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    pub revenue: f64,
    pub tickets: CountBreakdown,
    pub events: CountBreakdown,
}

/// Settled ticket revenue with ticket and event counts.
pub async fn dashboard(state: &Arc<AppState>) -> Result<Dashboard, AppError> {
    let revenue = state
        .tickets
        .list_completed_payments()
        .await?
        .iter()
        .map(|p| p.amount)
        .sum::<f64>();

    let tickets = state.tickets.list_all().await?;
    let mut by_status = BTreeMap::new();
    for ticket in &tickets {
        *by_status.entry(wire_name(&ticket.status)).or_insert(0) += 1;
    }

    let events = state.events.list_all().await?;
    let mut by_category = BTreeMap::new();
    for event in &events {
        *by_category.entry(wire_name(&event.category)).or_insert(0) += 1;
    }

    Ok(Dashboard {
        revenue: round_cents(revenue),
        tickets: CountBreakdown {
            total: tickets.len(),
            by_status: Some(by_status),
            by_category: None,
        },
        events: CountBreakdown {
            total: events.len(),
            by_status: None,
            by_category: Some(by_category),
        },
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgeGroup {
    pub group: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Demographics {
    pub age_groups: Vec<AgeGroup>,
    pub gender_stats: BTreeMap<String, usize>,
}

const AGE_GROUPS: [&str; 5] = ["< 18", "18-25", "26-35", "36-50", "50+"];

fn age_group(age: i32) -> &'static str {
    match age {
        a if a < 18 => AGE_GROUPS[0],
        a if a <= 25 => AGE_GROUPS[1],
        a if a <= 35 => AGE_GROUPS[2],
        a if a <= 50 => AGE_GROUPS[3],
        _ => AGE_GROUPS[4],
    }
}

/// User counts by age bracket and gender. Empty brackets are omitted.
pub async fn demographics(state: &Arc<AppState>) -> Result<Demographics, AppError> {
    let users = state.users.list_all().await?;
    let mut ages: HashMap<&'static str, usize> = HashMap::new();
    let mut gender_stats = BTreeMap::new();
    for user in &users {
        *ages.entry(age_group(user.age)).or_insert(0) += 1;
        *gender_stats.entry(wire_name(&user.gender)).or_insert(0) += 1;
    }
    let age_groups = AGE_GROUPS
        .iter()
        .filter_map(|&group| ages.get(group).map(|&count| AgeGroup { group, count }))
        .collect();
    Ok(Demographics {
        age_groups,
        gender_stats,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    #[serde(rename = "type")]
    pub report_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

const EXPORT_COLUMNS: [&str; 6] = ["id", "eventTitle", "userName", "userEmail", "status", "purchasePrice"];

/// Renders tickets created within the query's date range as CSV.
pub async fn export_tickets_csv(state: &Arc<AppState>, query: &ExportQuery) -> Result<String, AppError> {
    if query.report_type.as_deref() != Some("tickets") {
        return Err(AppError::validation("type", "Invalid report type"));
    }
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(AppError::validation("startDate", "startDate must be before endDate"));
        }
    }

    let tickets = state
        .tickets
        .list_created_between(query.start_date, query.end_date)
        .await?;
    let mut titles: HashMap<Uuid, String> = HashMap::new();
    let mut owners: HashMap<Uuid, (String, String)> = HashMap::new();

    let csv_error = |e: csv::Error| AppError::Internal(format!("CSV export failed: {}", e));
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(EXPORT_COLUMNS).map_err(csv_error)?;
    for ticket in &tickets {
        if !titles.contains_key(&ticket.event_id) {
            let title = state
                .events
                .find_by_id(ticket.event_id)
                .await?
                .map(|e| e.title)
                .unwrap_or_default();
            titles.insert(ticket.event_id, title);
        }
        if !owners.contains_key(&ticket.user_id) {
            let owner = state
                .users
                .find_by_id(ticket.user_id)
                .await?
                .map(|u| (u.full_name(), u.email))
                .unwrap_or_default();
            owners.insert(ticket.user_id, owner);
        }
        let (name, email) = &owners[&ticket.user_id];
        writer
            .write_record([
                ticket.id.to_string().as_str(),
                titles[&ticket.event_id].as_str(),
                name.as_str(),
                email.as_str(),
                wire_name(&ticket.status).as_str(),
                format!("{:.2}", ticket.purchase_price).as_str(),
            ])
            .map_err(csv_error)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("CSV export failed: {}", e)))
}
