//! Webhook endpoint entity (database row mapping).

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use uuid::Uuid;

use domain::models::{RetryPolicy, WebhookEndpoint};

/// Database row mapping for the webhook_endpoints table.
///
/// No `Debug` derive: the row carries the signing secret.
#[derive(Clone, FromRow)]
pub struct WebhookEndpointEntity {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub http_method: String,
    pub events: Vec<String>,
    pub headers: Json<BTreeMap<String, String>>,
    pub secret: Option<String>,
    pub timeout_seconds: i32,
    pub retry_policy: Json<RetryPolicy>,
    pub success_count: i64,
    pub failure_count: i64,
    pub avg_response_time_ms: Option<f64>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WebhookEndpointEntity> for WebhookEndpoint {
    fn from(entity: WebhookEndpointEntity) -> Self {
        Self {
            id: entity.id,
            tenant_id: entity.tenant_id,
            name: entity.name,
            description: entity.description,
            url: entity.url,
            http_method: entity.http_method,
            events: entity.events,
            headers: entity.headers.0,
            secret: entity.secret,
            timeout_seconds: entity.timeout_seconds,
            retry_policy: entity.retry_policy.0,
            success_count: entity.success_count,
            failure_count: entity.failure_count,
            avg_response_time_ms: entity.avg_response_time_ms,
            last_triggered_at: entity.last_triggered_at,
            is_active: entity.is_active,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
