//! Webhook retry background job.
//!
//! Picks up deliveries whose backoff has elapsed, plus pending deliveries
//! abandoned by a crashed worker, and runs their next attempt.

use chrono::Utc;
use std::sync::Arc;

use crate::config::WebhookConfig;
use crate::services::WebhookDeliveryService;

use super::scheduler::{Job, JobFrequency};

pub struct WebhookRetryJob {
    service: Arc<WebhookDeliveryService>,
    interval_secs: u64,
    batch_size: i64,
    concurrency: usize,
    stuck_pending_after: chrono::Duration,
}

impl WebhookRetryJob {
    pub fn new(service: Arc<WebhookDeliveryService>, config: &WebhookConfig) -> Self {
        Self {
            service,
            interval_secs: config.retry_poll_interval_secs,
            batch_size: config.retry_batch_size,
            concurrency: config.retry_concurrency,
            stuck_pending_after: config.stuck_pending_after(),
        }
    }
}

#[async_trait::async_trait]
impl Job for WebhookRetryJob {
    fn name(&self) -> &'static str {
        "webhook_retry"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Seconds(self.interval_secs)
    }

    /// Work left over from before a restart is picked up right away.
    fn run_on_start(&self) -> bool {
        true
    }

    async fn execute(&self) -> Result<(), String> {
        let now = Utc::now();
        self.service
            .process_due_deliveries(
                now,
                now - self.stuck_pending_after,
                self.batch_size,
                self.concurrency,
            )
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to process webhook retries: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::WebhookExecutor;
    use domain::models::{DeliveryStatus, NewDelivery, NewEndpoint, NewEventType};
    use domain::services::{InMemoryWebhookStore, WebhookStore};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(store: Arc<InMemoryWebhookStore>) -> Arc<WebhookDeliveryService> {
        let store: Arc<dyn WebhookStore> = store;
        let executor = WebhookExecutor::new(store.clone(), "WebhookEngine/1.0").unwrap();
        Arc::new(WebhookDeliveryService::new(store, executor))
    }

    #[test]
    fn test_job_settings_follow_config() {
        let config = WebhookConfig {
            retry_poll_interval_secs: 15,
            ..WebhookConfig::default()
        };
        let job = WebhookRetryJob::new(service(Arc::new(InMemoryWebhookStore::new())), &config);

        assert_eq!(job.name(), "webhook_retry");
        assert_eq!(job.frequency(), JobFrequency::Seconds(15));
        assert!(job.run_on_start());
        assert_eq!(job.stuck_pending_after, chrono::Duration::seconds(300));
    }

    #[tokio::test]
    async fn test_execute_recovers_stuck_pending_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(InMemoryWebhookStore::new());
        let endpoint = store
            .create_endpoint(NewEndpoint {
                tenant_id: "tenant_acme".into(),
                name: "Orders".into(),
                description: None,
                url: server.uri(),
                http_method: "POST".into(),
                events: vec!["order.created".into()],
                headers: Default::default(),
                secret: None,
                timeout_seconds: 5,
                retry_policy: Default::default(),
            })
            .await
            .unwrap();
        let event = store
            .get_or_create_event_type(NewEventType::manual("order.created", None))
            .await
            .unwrap();
        let delivery = store
            .insert_delivery(NewDelivery {
                endpoint_id: endpoint.id,
                event_type_id: event.id,
                payload: serde_json::json!({"orderId": "ord_1"}),
                signature: None,
                max_attempts: 3,
                created_at: Utc::now() - chrono::Duration::minutes(30),
            })
            .await
            .unwrap();

        let job = WebhookRetryJob::new(service(store.clone()), &WebhookConfig::default());
        job.execute().await.unwrap();

        let after = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.status, DeliveryStatus::Success);
        assert_eq!(after.attempts, 1);
    }
}
