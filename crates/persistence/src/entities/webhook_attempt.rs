//! Webhook attempt entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use domain::models::WebhookAttempt;
use domain::services::StoreError;

/// Database row mapping for the webhook_attempts table.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookAttemptEntity {
    pub id: Uuid,
    pub delivery_id: Uuid,
    pub endpoint_id: Uuid,
    pub attempt_number: i32,
    pub status: String,
    pub request_headers: Json<BTreeMap<String, String>>,
    pub request_body: String,
    pub response_code: Option<i32>,
    pub response_body: Option<String>,
    pub response_time_ms: Option<i64>,
    pub error_message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TryFrom<WebhookAttemptEntity> for WebhookAttempt {
    type Error = StoreError;

    fn try_from(entity: WebhookAttemptEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            delivery_id: entity.delivery_id,
            endpoint_id: entity.endpoint_id,
            attempt_number: entity.attempt_number,
            status: entity.status.parse().map_err(StoreError::InvalidData)?,
            request_headers: entity.request_headers.0,
            request_body: entity.request_body,
            response_code: entity.response_code,
            response_body: entity.response_body,
            response_time_ms: entity.response_time_ms,
            error_message: entity.error_message,
            timestamp: entity.timestamp,
        })
    }
}
