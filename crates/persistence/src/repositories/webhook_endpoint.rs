//! Webhook endpoint repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{EndpointChanges, NewEndpoint};

use crate::entities::WebhookEndpointEntity;
use crate::metrics::QueryTimer;

/// Builds an `ILIKE` pattern matching `search` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Repository for webhook endpoint database operations.
#[derive(Clone)]
pub struct WebhookEndpointRepository {
    pool: PgPool,
}

impl WebhookEndpointRepository {
    /// Creates a new WebhookEndpointRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new endpoint.
    pub async fn create(&self, new: &NewEndpoint) -> Result<WebhookEndpointEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_webhook_endpoint");
        let result = sqlx::query_as::<_, WebhookEndpointEntity>(
            r#"
            INSERT INTO webhook_endpoints (
                tenant_id, name, description, url, http_method, events,
                headers, secret, timeout_seconds, retry_policy
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(&new.tenant_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.url)
        .bind(&new.http_method)
        .bind(&new.events)
        .bind(Json(&new.headers))
        .bind(&new.secret)
        .bind(new.timeout_seconds)
        .bind(Json(&new.retry_policy))
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find endpoint by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookEndpointEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_endpoint_by_id");
        let result = sqlx::query_as::<_, WebhookEndpointEntity>(
            r#"
            SELECT * FROM webhook_endpoints WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List a tenant's endpoints, newest first. `search` matches name, URL or
    /// description case-insensitively.
    pub async fn list_by_tenant(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookEndpointEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_webhook_endpoints");
        let pattern = search.map(contains_pattern);
        let result = sqlx::query_as::<_, WebhookEndpointEntity>(
            r#"
            SELECT * FROM webhook_endpoints
            WHERE tenant_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2
                   OR url ILIKE $2
                   OR description ILIKE $2)
            ORDER BY created_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(tenant_id)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Count a tenant's endpoints matching `search`.
    pub async fn count_by_tenant(
        &self,
        tenant_id: &str,
        search: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_webhook_endpoints");
        let pattern = search.map(contains_pattern);
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM webhook_endpoints
            WHERE tenant_id = $1
              AND ($2::text IS NULL
                   OR name ILIKE $2
                   OR url ILIKE $2
                   OR description ILIKE $2)
            "#,
        )
        .bind(tenant_id)
        .bind(pattern)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count.0)
    }

    /// Update an endpoint (partial update).
    /// Only provided fields are updated; None values are preserved.
    pub async fn update(
        &self,
        id: Uuid,
        changes: &EndpointChanges,
    ) -> Result<Option<WebhookEndpointEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_webhook_endpoint");
        let result = sqlx::query_as::<_, WebhookEndpointEntity>(
            r#"
            UPDATE webhook_endpoints SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                url = COALESCE($4, url),
                http_method = COALESCE($5, http_method),
                events = COALESCE($6, events),
                headers = COALESCE($7, headers),
                secret = CASE WHEN $8 THEN $9 ELSE secret END,
                timeout_seconds = COALESCE($10, timeout_seconds),
                retry_policy = COALESCE($11, retry_policy),
                is_active = COALESCE($12, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(&changes.url)
        .bind(&changes.http_method)
        .bind(&changes.events)
        .bind(changes.headers.as_ref().map(Json))
        .bind(changes.secret.is_some())
        .bind(changes.secret.clone().flatten())
        .bind(changes.timeout_seconds)
        .bind(changes.retry_policy.as_ref().map(Json))
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Delete an endpoint. Deliveries and attempts cascade.
    pub async fn delete(&self, id: Uuid) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_webhook_endpoint");
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_endpoints WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Find active endpoints of a tenant subscribed to an event type or to `*`.
    pub async fn find_subscribed(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpointEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_subscribed_webhook_endpoints");
        let result = sqlx::query_as::<_, WebhookEndpointEntity>(
            r#"
            SELECT * FROM webhook_endpoints
            WHERE tenant_id = $1
              AND is_active = TRUE
              AND ($2 = ANY(events) OR '*' = ANY(events))
            ORDER BY created_at ASC
            "#,
        )
        .bind(tenant_id)
        .bind(event_type)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Bump the success or failure counter and blend the latency sample into
    /// the stored average in a single statement.
    pub async fn record_outcome(
        &self,
        id: Uuid,
        success: bool,
        response_time_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_webhook_endpoint_outcome");
        sqlx::query(
            r#"
            UPDATE webhook_endpoints SET
                success_count = success_count + CASE WHEN $2 THEN 1 ELSE 0 END,
                failure_count = failure_count + CASE WHEN $2 THEN 0 ELSE 1 END,
                last_triggered_at = CASE WHEN $2 THEN $4 ELSE last_triggered_at END,
                avg_response_time_ms = CASE
                    WHEN avg_response_time_ms IS NULL THEN $3::float8
                    ELSE (avg_response_time_ms + $3::float8) / 2
                END,
                updated_at = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(success)
        .bind(response_time_ms)
        .bind(at)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }
}
