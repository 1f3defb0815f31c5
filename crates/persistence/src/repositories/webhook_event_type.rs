//! Webhook event type repository.

use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{NewEventType, UpdateEventTypeRequest};

use crate::entities::WebhookEventTypeEntity;
use crate::metrics::QueryTimer;

/// Repository for the event type catalog.
#[derive(Clone)]
pub struct WebhookEventTypeRepository {
    pool: PgPool,
}

impl WebhookEventTypeRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an event type unless its key already exists.
    ///
    /// Returns `None` when another row holds the key, which makes lazy
    /// creation safe under concurrent dispatches.
    pub async fn insert_if_absent(
        &self,
        new: &NewEventType,
    ) -> Result<Option<WebhookEventTypeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_webhook_event_type");
        let result = sqlx::query_as::<_, WebhookEventTypeEntity>(
            r#"
            INSERT INTO webhook_event_types (event_type, category, description, payload_schema, priority)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_type) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&new.event_type)
        .bind(&new.category)
        .bind(&new.description)
        .bind(&new.payload_schema)
        .bind(new.priority.as_str())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find event type by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookEventTypeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_event_type_by_id");
        let result = sqlx::query_as::<_, WebhookEventTypeEntity>(
            r#"
            SELECT * FROM webhook_event_types WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find event type by its unique key.
    pub async fn find_by_event_type(
        &self,
        event_type: &str,
    ) -> Result<Option<WebhookEventTypeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_event_type_by_key");
        let result = sqlx::query_as::<_, WebhookEventTypeEntity>(
            r#"
            SELECT * FROM webhook_event_types WHERE event_type = $1
            "#,
        )
        .bind(event_type)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List event types by priority (most urgent first), then category and key.
    /// Without a category only active types are listed.
    pub async fn list(
        &self,
        category: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<WebhookEventTypeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_webhook_event_types");
        let result = sqlx::query_as::<_, WebhookEventTypeEntity>(
            r#"
            SELECT * FROM webhook_event_types
            WHERE ($1::text IS NULL AND is_active = TRUE) OR category = $1
            ORDER BY
                CASE priority
                    WHEN 'critical' THEN 3
                    WHEN 'high' THEN 2
                    WHEN 'normal' THEN 1
                    ELSE 0
                END DESC,
                category ASC,
                event_type ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(category)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Count event types matching the listing filter.
    pub async fn count(&self, category: Option<&str>) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_webhook_event_types");
        let count: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM webhook_event_types
            WHERE ($1::text IS NULL AND is_active = TRUE) OR category = $1
            "#,
        )
        .bind(category)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok(count.0)
    }

    /// Update an event type (partial update).
    pub async fn update(
        &self,
        id: Uuid,
        changes: &UpdateEventTypeRequest,
    ) -> Result<Option<WebhookEventTypeEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_webhook_event_type");
        let result = sqlx::query_as::<_, WebhookEventTypeEntity>(
            r#"
            UPDATE webhook_event_types SET
                description = COALESCE($2, description),
                payload_schema = COALESCE($3, payload_schema),
                is_active = COALESCE($4, is_active),
                priority = COALESCE($5, priority),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&changes.description)
        .bind(&changes.payload_schema)
        .bind(changes.is_active)
        .bind(changes.priority.map(|p| p.as_str()))
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
