//! Webhook event type catalog model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::pagination::{PageRequest, Pagination};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

/// Category assigned to event types created lazily by a dispatch.
pub const MANUAL_CATEGORY: &str = "manual";

/// Description assigned to event types created lazily by a dispatch.
pub const MANUAL_DESCRIPTION: &str = "Manually triggered event";

/// Page size for the event type catalog when none is given.
pub const DEFAULT_EVENT_TYPE_PAGE_SIZE: i64 = 50;

/// Event priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventPriority {
    Low,
    #[default]
    Normal,
    High,
    Critical,
}

impl EventPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventPriority::Low => "low",
            EventPriority::Normal => "normal",
            EventPriority::High => "high",
            EventPriority::Critical => "critical",
        }
    }

    /// Sort rank; higher is more urgent.
    pub fn rank(&self) -> u8 {
        match self {
            EventPriority::Low => 0,
            EventPriority::Normal => 1,
            EventPriority::High => 2,
            EventPriority::Critical => 3,
        }
    }
}

impl FromStr for EventPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(EventPriority::Low),
            "normal" => Ok(EventPriority::Normal),
            "high" => Ok(EventPriority::High),
            "critical" => Ok(EventPriority::Critical),
            _ => Err(format!("Unknown event priority: {}", s)),
        }
    }
}

impl std::fmt::Display for EventPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An entry in the event type catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEventType {
    pub id: Uuid,
    pub event_type: String,
    pub category: String,
    pub description: String,
    pub payload_schema: serde_json::Value,
    pub priority: EventPriority,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data for inserting an event type.
#[derive(Debug, Clone)]
pub struct NewEventType {
    pub event_type: String,
    pub category: String,
    pub description: String,
    pub payload_schema: serde_json::Value,
    pub priority: EventPriority,
}

impl NewEventType {
    /// Event type created on first use by a dispatch.
    pub fn manual(event_type: &str, priority: Option<EventPriority>) -> Self {
        Self {
            event_type: event_type.to_string(),
            category: MANUAL_CATEGORY.to_string(),
            description: MANUAL_DESCRIPTION.to_string(),
            payload_schema: serde_json::json!({}),
            priority: priority.unwrap_or_default(),
        }
    }
}

/// Request payload for registering an event type.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventTypeRequest {
    #[validate(length(min = 1, max = 100, message = "eventType must be 1-100 characters"))]
    pub event_type: String,

    #[validate(length(min = 1, max = 50, message = "category must be 1-50 characters"))]
    pub category: String,

    #[validate(length(min = 1, max = 500, message = "description must be 1-500 characters"))]
    pub description: String,

    pub payload_schema: Option<serde_json::Value>,

    pub priority: Option<EventPriority>,
}

impl From<CreateEventTypeRequest> for NewEventType {
    fn from(r: CreateEventTypeRequest) -> Self {
        Self {
            event_type: r.event_type,
            category: r.category,
            description: r.description,
            payload_schema: r.payload_schema.unwrap_or_else(|| serde_json::json!({})),
            priority: r.priority.unwrap_or_default(),
        }
    }
}

/// Request payload for updating an event type (partial update).
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventTypeRequest {
    #[validate(length(min = 1, max = 500, message = "description must be 1-500 characters"))]
    pub description: Option<String>,

    pub payload_schema: Option<serde_json::Value>,

    pub is_active: Option<bool>,

    pub priority: Option<EventPriority>,
}

/// Query parameters for the event type catalog.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventTypesQuery {
    /// Filter by category. Without it only active types are listed.
    pub category: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl ListEventTypesQuery {
    pub fn page_request(&self) -> PageRequest {
        PageRequest::new(self.page, self.limit, DEFAULT_EVENT_TYPE_PAGE_SIZE)
    }
}

/// Response for the event type catalog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListEventTypesResponse {
    pub events: Vec<WebhookEventType>,
    pub events_by_category: BTreeMap<String, Vec<WebhookEventType>>,
    pub pagination: Pagination,
}

impl ListEventTypesResponse {
    pub fn new(events: Vec<WebhookEventType>, pagination: Pagination) -> Self {
        let mut events_by_category: BTreeMap<String, Vec<WebhookEventType>> = BTreeMap::new();
        for event in &events {
            events_by_category
                .entry(event.category.clone())
                .or_default()
                .push(event.clone());
        }
        Self {
            events,
            events_by_category,
            pagination,
        }
    }
}
