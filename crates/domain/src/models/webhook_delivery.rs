//! Webhook delivery domain model.
//!
//! A delivery is one logical attempt to deliver an event to an endpoint,
//! spanning up to `max_attempts` HTTP tries. State machine:
//!
//! ```text
//! pending ──► retrying ──► ... ──► success | failed
//!    ▲                                        │
//!    └──────────── manual retry ──────────────┘ (only while attempts < max)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::{PageRequest, Pagination};
use std::str::FromStr;
use uuid::Uuid;

use super::webhook_attempt::WebhookAttempt;
use super::webhook_event::EventPriority;

/// Maximum number of characters of a response body that is stored.
pub const MAX_RESPONSE_BODY_CHARS: usize = 1000;

/// Default page size for delivery listings.
pub const DEFAULT_DELIVERY_PAGE_SIZE: i64 = 20;

/// Caps a response body at [`MAX_RESPONSE_BODY_CHARS`] characters.
pub fn truncate_response_body(body: &str) -> String {
    match body.char_indices().nth(MAX_RESPONSE_BODY_CHARS) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body.to_string(),
    }
}

/// Delivery status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Retrying,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Retrying => "retrying",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }

    /// Terminal deliveries receive no further attempts.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryStatus::Success | DeliveryStatus::Failed)
    }
}

impl FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(DeliveryStatus::Pending),
            "retrying" => Ok(DeliveryStatus::Retrying),
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(format!("Unknown delivery status: {}", s)),
        }
    }
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a webhook delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDelivery {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type_id: Uuid,
    pub payload: serde_json::Value,
    /// `sha256=<hex>` computed once at dispatch; reused on every retry.
    pub signature: Option<String>,
    pub attempts: i32,
    /// Snapshot of the endpoint policy at creation.
    pub max_attempts: i32,
    pub status: DeliveryStatus,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    /// Optimistic concurrency token; bumped on every state write.
    #[serde(skip)]
    pub version: i64,
    /// Set while a worker owns the current attempt; cleared when its outcome is recorded.
    #[serde(skip)]
    pub claimed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookDelivery {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_attempts_remaining(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// An attempt is running and its claim has not expired.
    pub fn is_in_flight(&self, now: DateTime<Utc>) -> bool {
        self.claimed_until.is_some_and(|until| until > now)
    }
}

/// Data for inserting a new delivery.
#[derive(Debug, Clone)]
pub struct NewDelivery {
    pub endpoint_id: Uuid,
    pub event_type_id: Uuid,
    pub payload: serde_json::Value,
    pub signature: Option<String>,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// State written to a delivery after an attempt completes.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryAttemptUpdate {
    pub attempts: i32,
    pub status: DeliveryStatus,
    pub last_attempt_at: DateTime<Utc>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub response_code: i32,
    pub response_body: Option<String>,
    pub response_time_ms: i64,
    pub error_message: Option<String>,
}

/// Typed filter for delivery listings and statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryFilter {
    pub endpoint_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub event_type: Option<String>,
    /// Inclusive lower bound on `first_attempt_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `first_attempt_at`.
    pub to: Option<DateTime<Utc>>,
}

impl DeliveryFilter {
    /// Whether a delivery (with its resolved event type key) passes the filter.
    pub fn matches(&self, delivery: &WebhookDelivery, event_type: &str) -> bool {
        self.endpoint_id.map_or(true, |id| delivery.endpoint_id == id)
            && self.status.map_or(true, |s| delivery.status == s)
            && self.event_type.as_deref().map_or(true, |e| e == event_type)
            && self.from.map_or(true, |from| delivery.first_attempt_at >= from)
            && self.to.map_or(true, |to| delivery.first_attempt_at <= to)
    }
}

/// Query parameters for listing deliveries.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesQuery {
    pub endpoint_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub event_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListDeliveriesQuery {
    pub fn filter(&self) -> DeliveryFilter {
        DeliveryFilter {
            endpoint_id: self.endpoint_id,
            status: self.status,
            event_type: self.event_type.clone().filter(|e| !e.is_empty()),
            from: self.start_date,
            to: self.end_date,
        }
    }

    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_DELIVERY_PAGE_SIZE)
    }
}

/// Delivery counts grouped by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryStats {
    pub total: i64,
    pub pending: i64,
    pub retrying: i64,
    pub success: i64,
    pub failed: i64,
}

impl DeliveryStats {
    pub fn record(&mut self, status: DeliveryStatus) {
        self.total += 1;
        match status {
            DeliveryStatus::Pending => self.pending += 1,
            DeliveryStatus::Retrying => self.retrying += 1,
            DeliveryStatus::Success => self.success += 1,
            DeliveryStatus::Failed => self.failed += 1,
        }
    }
}

/// A delivery enriched with its endpoint and event type for listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliverySummary {
    #[serde(flatten)]
    pub delivery: WebhookDelivery,
    pub endpoint_name: String,
    pub endpoint_url: String,
    pub event_type: String,
    pub event_category: String,
    pub event_priority: EventPriority,
}

/// Response for listing deliveries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDeliveriesResponse {
    pub deliveries: Vec<DeliverySummary>,
    pub stats: DeliveryStats,
    pub pagination: Pagination,
}

/// A delivery with its full attempt history (newest first).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryDetail {
    #[serde(flatten)]
    pub delivery: WebhookDelivery,
    pub attempts_log: Vec<WebhookAttempt>,
}

/// Request payload for dispatching a delivery to one endpoint.
///
/// Fields are optional so that missing values surface as a validation error
/// rather than a deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    pub endpoint_id: Option<Uuid>,
    pub event_type: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub priority: Option<EventPriority>,
}

/// Request payload for publishing an event to all subscribed endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventRequest {
    pub tenant_id: Option<String>,
    pub event_type: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub priority: Option<EventPriority>,
}

/// Response for a publish request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishEventResponse {
    pub deliveries: Vec<WebhookDelivery>,
}
