//! Webhook delivery repository.
//!
//! Provides data access for delivery tracking and retry management. State
//! transitions are compare-and-swap writes on the `version` column.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{DeliveryAttemptUpdate, DeliveryFilter, DeliveryStats, NewDelivery};

use crate::entities::{DeliveryStatsEntity, DeliverySummaryEntity, WebhookDeliveryEntity};
use crate::metrics::QueryTimer;

/// Shared join and filter for listing and counting deliveries.
///
/// Binds: $1 endpoint_id, $2 status, $3 event_type, $4 from, $5 to.
const FILTERED_DELIVERIES: &str = r#"
    FROM webhook_deliveries d
    JOIN webhook_endpoints e ON e.id = d.endpoint_id
    JOIN webhook_event_types t ON t.id = d.event_type_id
    WHERE ($1::uuid IS NULL OR d.endpoint_id = $1)
      AND ($2::text IS NULL OR d.status = $2)
      AND ($3::text IS NULL OR t.event_type = $3)
      AND ($4::timestamptz IS NULL OR d.first_attempt_at >= $4)
      AND ($5::timestamptz IS NULL OR d.first_attempt_at <= $5)
"#;

/// Repository for webhook delivery operations.
#[derive(Clone)]
pub struct WebhookDeliveryRepository {
    pool: PgPool,
}

impl WebhookDeliveryRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create a new pending delivery, due immediately.
    pub async fn create(&self, new: &NewDelivery) -> Result<WebhookDeliveryEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_webhook_delivery");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            INSERT INTO webhook_deliveries (
                endpoint_id, event_type_id, payload, signature, attempts, max_attempts,
                status, first_attempt_at, next_attempt_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, 0, $5, 'pending', $6, $6, $6, $6)
            RETURNING *
            "#,
        )
        .bind(new.endpoint_id)
        .bind(new.event_type_id)
        .bind(&new.payload)
        .bind(&new.signature)
        .bind(new.max_attempts)
        .bind(new.created_at)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find delivery by ID.
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<WebhookDeliveryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_delivery_by_id");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT * FROM webhook_deliveries WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Claim a non-terminal delivery at `expected_version`.
    pub async fn claim(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<WebhookDeliveryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("claim_webhook_delivery");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            UPDATE webhook_deliveries
            SET version = version + 1,
                next_attempt_at = $3,
                claimed_until = $3,
                updated_at = NOW()
            WHERE id = $1
              AND version = $2
              AND status IN ('pending', 'retrying')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(lease_until)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Write the outcome of an attempt if the delivery is still at `expected_version`.
    pub async fn record_attempt(
        &self,
        id: Uuid,
        expected_version: i64,
        update: &DeliveryAttemptUpdate,
    ) -> Result<Option<WebhookDeliveryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("record_webhook_delivery_attempt");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            UPDATE webhook_deliveries
            SET attempts = $3,
                status = $4,
                last_attempt_at = $5,
                next_attempt_at = $6,
                response_code = $7,
                response_body = $8,
                response_time_ms = $9,
                error_message = $10,
                claimed_until = NULL,
                version = version + 1,
                updated_at = $5
            WHERE id = $1 AND version = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(update.attempts)
        .bind(update.status.as_str())
        .bind(update.last_attempt_at)
        .bind(update.next_attempt_at)
        .bind(update.response_code)
        .bind(&update.response_body)
        .bind(update.response_time_ms)
        .bind(&update.error_message)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Reset a non-successful delivery with attempts left to pending.
    /// Refused while another worker's claim is still live.
    pub async fn reset_for_retry(
        &self,
        id: Uuid,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDeliveryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("reset_webhook_delivery_for_retry");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            UPDATE webhook_deliveries
            SET status = 'pending',
                next_attempt_at = $3,
                version = version + 1,
                updated_at = $3
            WHERE id = $1
              AND version = $2
              AND status <> 'success'
              AND attempts < max_attempts
              AND (claimed_until IS NULL OR claimed_until <= $3)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(now)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Find deliveries that are due: retrying ones whose time has come and
    /// pending ones left behind by a dispatcher that never ran them.
    pub async fn find_due(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDeliveryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_due_webhook_deliveries");
        let result = sqlx::query_as::<_, WebhookDeliveryEntity>(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE (status = 'retrying' AND next_attempt_at <= $1)
               OR (status = 'pending' AND next_attempt_at <= $2)
            ORDER BY next_attempt_at ASC
            LIMIT $3
            "#,
        )
        .bind(now)
        .bind(stuck_before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    /// List deliveries joined with endpoint and event type, newest first.
    pub async fn list(
        &self,
        filter: &DeliveryFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<DeliverySummaryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_webhook_deliveries");
        let sql = format!(
            r#"
            SELECT d.*,
                   e.name AS endpoint_name,
                   e.url AS endpoint_url,
                   t.event_type AS event_type,
                   t.category AS event_category,
                   t.priority AS event_priority
            {}
            ORDER BY d.first_attempt_at DESC, d.id
            LIMIT $6 OFFSET $7
            "#,
            FILTERED_DELIVERIES
        );
        let result = sqlx::query_as::<_, DeliverySummaryEntity>(&sql)
            .bind(filter.endpoint_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.event_type)
            .bind(filter.from)
            .bind(filter.to)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await;
        timer.record();
        result
    }

    /// Get delivery counts by status for a filter.
    pub async fn get_stats(&self, filter: &DeliveryFilter) -> Result<DeliveryStats, sqlx::Error> {
        let timer = QueryTimer::new("get_webhook_delivery_stats");
        let sql = format!(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE d.status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE d.status = 'retrying') AS retrying,
                COUNT(*) FILTER (WHERE d.status = 'success') AS success,
                COUNT(*) FILTER (WHERE d.status = 'failed') AS failed
            {}
            "#,
            FILTERED_DELIVERIES
        );
        let stats = sqlx::query_as::<_, DeliveryStatsEntity>(&sql)
            .bind(filter.endpoint_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(&filter.event_type)
            .bind(filter.from)
            .bind(filter.to)
            .fetch_one(&self.pool)
            .await?;
        timer.record();

        Ok(DeliveryStats {
            total: stats.total,
            pending: stats.pending,
            retrying: stats.retrying,
            success: stats.success,
            failed: stats.failed,
        })
    }

    /// Delete deliveries created before `cutoff`. Attempts cascade.
    pub async fn delete_created_before(&self, cutoff: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("delete_old_webhook_deliveries");
        let result = sqlx::query(
            r#"
            DELETE FROM webhook_deliveries
            WHERE created_at < $1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }
}
