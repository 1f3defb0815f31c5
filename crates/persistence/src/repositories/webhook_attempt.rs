//! Webhook attempt repository.

use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{AttemptOutcome, NewAttempt};

use crate::entities::WebhookAttemptEntity;
use crate::metrics::QueryTimer;

/// Repository for the attempt audit log.
#[derive(Clone)]
pub struct WebhookAttemptRepository {
    pool: PgPool,
}

impl WebhookAttemptRepository {
    /// Create a new repository instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a pending attempt with its request snapshot.
    pub async fn create(&self, new: &NewAttempt) -> Result<WebhookAttemptEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_webhook_attempt");
        let result = sqlx::query_as::<_, WebhookAttemptEntity>(
            r#"
            INSERT INTO webhook_attempts (
                delivery_id, endpoint_id, attempt_number, status,
                request_headers, request_body, timestamp
            )
            VALUES ($1, $2, $3, 'pending', $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(new.delivery_id)
        .bind(new.endpoint_id)
        .bind(new.attempt_number)
        .bind(Json(&new.request_headers))
        .bind(&new.request_body)
        .bind(new.timestamp)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Write the final result of an attempt.
    pub async fn complete(&self, id: Uuid, outcome: &AttemptOutcome) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("complete_webhook_attempt");
        sqlx::query(
            r#"
            UPDATE webhook_attempts
            SET status = $2,
                response_code = $3,
                response_body = $4,
                response_time_ms = $5,
                error_message = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(outcome.status.as_str())
        .bind(outcome.response_code)
        .bind(&outcome.response_body)
        .bind(outcome.response_time_ms)
        .bind(&outcome.error_message)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(())
    }

    /// Fail attempts of a delivery that never completed.
    pub async fn fail_pending_for_delivery(
        &self,
        delivery_id: Uuid,
        error_message: &str,
    ) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("fail_interrupted_webhook_attempts");
        let result = sqlx::query(
            r#"
            UPDATE webhook_attempts
            SET status = 'failed',
                error_message = $2
            WHERE delivery_id = $1 AND status = 'pending'
            "#,
        )
        .bind(delivery_id)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        timer.record();
        Ok(result.rows_affected())
    }

    /// Attempt history of a delivery, newest first.
    pub async fn find_by_delivery_id(
        &self,
        delivery_id: Uuid,
    ) -> Result<Vec<WebhookAttemptEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_webhook_attempts_by_delivery");
        let result = sqlx::query_as::<_, WebhookAttemptEntity>(
            r#"
            SELECT * FROM webhook_attempts
            WHERE delivery_id = $1
            ORDER BY attempt_number DESC, timestamp DESC
            "#,
        )
        .bind(delivery_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
