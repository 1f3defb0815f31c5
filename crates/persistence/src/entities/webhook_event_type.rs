//! Webhook event type entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use domain::models::WebhookEventType;
use domain::services::StoreError;

/// Database row mapping for the webhook_event_types table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookEventTypeEntity {
    pub id: Uuid,
    pub event_type: String,
    pub category: String,
    pub description: String,
    pub payload_schema: serde_json::Value,
    pub priority: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventTypeEntity> for WebhookEventType {
    type Error = StoreError;

    fn try_from(entity: WebhookEventTypeEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            event_type: entity.event_type,
            category: entity.category,
            description: entity.description,
            payload_schema: entity.payload_schema,
            priority: entity.priority.parse().map_err(StoreError::InvalidData)?,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
