//! Webhook delivery entity definitions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::{DeliverySummary, WebhookDelivery};
use domain::services::StoreError;

/// Database entity for the webhook_deliveries table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDeliveryEntity {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub event_type_id: Uuid,
    pub payload: serde_json::Value,
    pub signature: Option<String>,
    pub attempts: i32,
    pub max_attempts: i32,
    pub status: String,
    pub first_attempt_at: DateTime<Utc>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub version: i64,
    pub claimed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookDeliveryEntity> for WebhookDelivery {
    type Error = StoreError;

    fn try_from(entity: WebhookDeliveryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            endpoint_id: entity.endpoint_id,
            event_type_id: entity.event_type_id,
            payload: entity.payload,
            signature: entity.signature,
            attempts: entity.attempts,
            max_attempts: entity.max_attempts,
            status: entity.status.parse().map_err(StoreError::InvalidData)?,
            first_attempt_at: entity.first_attempt_at,
            last_attempt_at: entity.last_attempt_at,
            next_attempt_at: entity.next_attempt_at,
            response_code: entity.response_code,
            response_body: entity.response_body,
            response_time_ms: entity.response_time_ms,
            error_message: entity.error_message,
            version: entity.version,
            claimed_until: entity.claimed_until,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}

/// Delivery row joined with its endpoint and event type.
#[derive(Debug, Clone, FromRow)]
pub struct DeliverySummaryEntity {
    #[sqlx(flatten)]
    pub delivery: WebhookDeliveryEntity,
    pub endpoint_name: String,
    pub endpoint_url: String,
    pub event_type: String,
    pub event_category: String,
    pub event_priority: String,
}

impl TryFrom<DeliverySummaryEntity> for DeliverySummary {
    type Error = StoreError;

    fn try_from(entity: DeliverySummaryEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            delivery: entity.delivery.try_into()?,
            endpoint_name: entity.endpoint_name,
            endpoint_url: entity.endpoint_url,
            event_type: entity.event_type,
            event_category: entity.event_category,
            event_priority: entity
                .event_priority
                .parse()
                .map_err(StoreError::InvalidData)?,
        })
    }
}

/// Status counts row.
#[derive(Debug, Clone, FromRow)]
pub struct DeliveryStatsEntity {
    pub total: i64,
    pub pending: i64,
    pub retrying: i64,
    pub success: i64,
    pub failed: i64,
}
