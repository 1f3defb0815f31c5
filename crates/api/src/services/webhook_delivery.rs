//! Webhook delivery service.
//!
//! Creates deliveries, runs attempts through [`WebhookExecutor`], handles
//! manual retries and serves delivery history and statistics.

use chrono::{DateTime, Utc};
use domain::models::{
    CreateDeliveryRequest, DeliveryDetail, DeliveryFilter, DeliveryStats, DeliveryStatus,
    EventPriority, ListDeliveriesQuery, ListDeliveriesResponse, NewDelivery, NewEventType,
    PublishEventRequest, WebhookDelivery, WebhookEndpoint,
};
use domain::services::{StoreError, WebhookStore};
use futures::stream::{self, StreamExt};
use shared::crypto::sign_payload;
use shared::pagination::Pagination;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::webhook_executor::WebhookExecutor;

/// Errors that can occur while dispatching or retrying deliveries.
#[derive(Error, Debug)]
pub enum WebhookDeliveryError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    LimitExceeded(String),

    /// Another writer changed the delivery first.
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Service for dispatching and tracking webhook deliveries.
pub struct WebhookDeliveryService {
    store: Arc<dyn WebhookStore>,
    executor: Arc<WebhookExecutor>,
}

impl WebhookDeliveryService {
    pub fn new(store: Arc<dyn WebhookStore>, executor: WebhookExecutor) -> Self {
        Self {
            store,
            executor: Arc::new(executor),
        }
    }

    pub fn store(&self) -> &Arc<dyn WebhookStore> {
        &self.store
    }

    /// Create a delivery and start its first attempt in the background.
    ///
    /// The returned delivery is the freshly persisted `pending` record; the
    /// attempt outcome is observed by reading the delivery later.
    pub async fn create_delivery(
        &self,
        request: CreateDeliveryRequest,
    ) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let (Some(endpoint_id), Some(event_type), Some(payload)) = (
            request.endpoint_id,
            request.event_type.filter(|e| !e.trim().is_empty()),
            request.payload,
        ) else {
            return Err(WebhookDeliveryError::Validation(
                "Missing required fields: endpointId, eventType, payload".into(),
            ));
        };

        let endpoint = self
            .store
            .find_endpoint(endpoint_id)
            .await?
            .filter(|e| e.is_active)
            .ok_or_else(|| {
                WebhookDeliveryError::NotFound("Webhook endpoint not found or inactive".into())
            })?;

        let delivery = self
            .dispatch(&endpoint, &event_type, payload, request.priority)
            .await?;
        self.spawn_attempt(delivery.id);

        Ok(delivery)
    }

    /// Create a delivery for every active endpoint of the tenant subscribed
    /// to the event type, directly or through `*`.
    pub async fn publish_event(
        &self,
        request: PublishEventRequest,
    ) -> Result<Vec<WebhookDelivery>, WebhookDeliveryError> {
        let (Some(tenant_id), Some(event_type), Some(payload)) = (
            request.tenant_id.filter(|t| !t.trim().is_empty()),
            request.event_type.filter(|e| !e.trim().is_empty()),
            request.payload,
        ) else {
            return Err(WebhookDeliveryError::Validation(
                "Missing required fields: tenantId, eventType, payload".into(),
            ));
        };

        let endpoints = self
            .store
            .find_subscribed_endpoints(&tenant_id, &event_type)
            .await?;

        if endpoints.is_empty() {
            debug!(
                tenant_id = %tenant_id,
                event_type = %event_type,
                "No subscribed endpoints for event"
            );
            return Ok(Vec::new());
        }

        let mut deliveries = Vec::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            let delivery = self
                .dispatch(endpoint, &event_type, payload.clone(), request.priority)
                .await?;
            self.spawn_attempt(delivery.id);
            deliveries.push(delivery);
        }

        info!(
            tenant_id = %tenant_id,
            event_type = %event_type,
            deliveries = deliveries.len(),
            "Published event"
        );

        Ok(deliveries)
    }

    /// Persist a pending delivery for one endpoint. The signature is computed
    /// here once and reused by every attempt.
    async fn dispatch(
        &self,
        endpoint: &WebhookEndpoint,
        event_type: &str,
        payload: serde_json::Value,
        priority: Option<EventPriority>,
    ) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let event = self
            .store
            .get_or_create_event_type(NewEventType::manual(event_type, priority))
            .await?;

        let signature = match endpoint.signing_secret() {
            Some(secret) => {
                let body = serde_json::to_vec(&payload).map_err(StoreError::from)?;
                Some(
                    sign_payload(secret, &body)
                        .map_err(|e| WebhookDeliveryError::Validation(e.to_string()))?,
                )
            }
            None => None,
        };

        let delivery = self
            .store
            .insert_delivery(NewDelivery {
                endpoint_id: endpoint.id,
                event_type_id: event.id,
                payload,
                signature,
                max_attempts: endpoint.retry_policy.max_attempts(),
                created_at: Utc::now(),
            })
            .await?;

        debug!(
            delivery_id = %delivery.id,
            endpoint_id = %endpoint.id,
            event_type = %event.event_type,
            max_attempts = delivery.max_attempts,
            "Created webhook delivery"
        );

        Ok(delivery)
    }

    fn spawn_attempt(&self, delivery_id: Uuid) {
        let executor = Arc::clone(&self.executor);
        tokio::spawn(async move {
            if let Err(e) = executor.execute_attempt(delivery_id).await {
                error!(
                    delivery_id = %delivery_id,
                    error = %e,
                    "Failed to execute webhook attempt"
                );
            }
        });
    }

    /// Run one attempt now. A no-op for terminal or already claimed deliveries.
    pub async fn execute_attempt(
        &self,
        delivery_id: Uuid,
    ) -> Result<Option<WebhookDelivery>, WebhookDeliveryError> {
        self.executor.execute_attempt(delivery_id).await
    }

    /// Manually retry a delivery that has attempts left.
    ///
    /// The attempt runs before returning; the refreshed delivery is returned.
    /// A delivery whose attempt is still running is left alone (`Conflict`).
    pub async fn retry_delivery(
        &self,
        delivery_id: Uuid,
    ) -> Result<WebhookDelivery, WebhookDeliveryError> {
        let delivery = self.find_delivery(delivery_id).await?;

        if delivery.status == DeliveryStatus::Success {
            return Err(WebhookDeliveryError::InvalidState(
                "Cannot retry successful delivery".into(),
            ));
        }
        if !delivery.has_attempts_remaining() {
            return Err(WebhookDeliveryError::LimitExceeded(
                "Maximum retry attempts exceeded".into(),
            ));
        }

        let now = Utc::now();
        if delivery.is_in_flight(now) {
            return Err(WebhookDeliveryError::Conflict(
                "Delivery attempt already in progress".into(),
            ));
        }

        // The store re-checks the claim, so a worker claiming after the read still wins.
        self.store
            .reset_delivery_for_retry(delivery_id, delivery.version, now)
            .await?
            .ok_or_else(|| {
                WebhookDeliveryError::Conflict("Delivery was modified concurrently".into())
            })?;

        info!(
            delivery_id = %delivery_id,
            attempts = delivery.attempts,
            max_attempts = delivery.max_attempts,
            "Manual retry requested"
        );

        self.executor.execute_attempt(delivery_id).await?;
        self.find_delivery(delivery_id).await
    }

    /// A delivery with its attempts, newest first.
    pub async fn get_delivery(
        &self,
        delivery_id: Uuid,
    ) -> Result<DeliveryDetail, WebhookDeliveryError> {
        let delivery = self.find_delivery(delivery_id).await?;
        let attempts_log = self.store.list_attempts(delivery_id).await?;

        Ok(DeliveryDetail {
            delivery,
            attempts_log,
        })
    }

    pub async fn list_deliveries(
        &self,
        query: &ListDeliveriesQuery,
    ) -> Result<ListDeliveriesResponse, WebhookDeliveryError> {
        let filter = query.filter();
        let page = query.page_request();

        let (deliveries, total) = self.store.list_deliveries(&filter, page).await?;
        let stats = self.store.delivery_stats(&filter).await?;

        Ok(ListDeliveriesResponse {
            deliveries,
            stats,
            pagination: Pagination::new(page, total),
        })
    }

    pub async fn delivery_stats(
        &self,
        filter: &DeliveryFilter,
    ) -> Result<DeliveryStats, WebhookDeliveryError> {
        Ok(self.store.delivery_stats(filter).await?)
    }

    /// Execute due retries and stuck pending deliveries with bounded concurrency.
    ///
    /// Returns the number of deliveries that had an attempt recorded.
    pub async fn process_due_deliveries(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
        batch_size: i64,
        concurrency: usize,
    ) -> Result<u32, WebhookDeliveryError> {
        let due = self
            .store
            .find_due_deliveries(now, stuck_before, batch_size)
            .await?;

        if due.is_empty() {
            return Ok(0);
        }

        let executed: Vec<bool> = stream::iter(due)
            .map(|delivery| {
                let executor = Arc::clone(&self.executor);
                async move {
                    match executor.execute_attempt(delivery.id).await {
                        Ok(result) => result.is_some(),
                        Err(e) => {
                            error!(
                                delivery_id = %delivery.id,
                                error = %e,
                                "Failed to process retry"
                            );
                            false
                        }
                    }
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let processed = executed.into_iter().filter(|done| *done).count() as u32;
        if processed > 0 {
            info!(processed = processed, "Processed due webhook deliveries");
        }

        Ok(processed)
    }

    /// Delete deliveries, with their attempts, created more than
    /// `retention_days` ago.
    pub async fn cleanup_old_deliveries(
        &self,
        retention_days: u32,
    ) -> Result<u64, WebhookDeliveryError> {
        let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
        let deleted = self.store.delete_deliveries_created_before(cutoff).await?;

        if deleted > 0 {
            info!(
                deleted = deleted,
                retention_days = retention_days,
                "Cleaned up old webhook deliveries"
            );
        }

        Ok(deleted)
    }

    async fn find_delivery(&self, id: Uuid) -> Result<WebhookDelivery, WebhookDeliveryError> {
        self.store
            .find_delivery(id)
            .await?
            .ok_or_else(|| WebhookDeliveryError::NotFound("Delivery not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::{AttemptStatus, RetryPolicy, INTERRUPTED_ATTEMPT_MESSAGE};
    use domain::services::InMemoryWebhookStore;
    use shared::crypto::verify_signature;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const USER_AGENT: &str = "WebhookEngine/1.0";

    fn endpoint(url: &str, secret: Option<&str>) -> WebhookEndpoint {
        let now = Utc::now();
        WebhookEndpoint {
            id: Uuid::new_v4(),
            tenant_id: "tenant_acme".to_string(),
            name: "Orders".to_string(),
            description: None,
            url: url.to_string(),
            http_method: "POST".to_string(),
            events: vec!["order.created".to_string()],
            headers: BTreeMap::new(),
            secret: secret.map(str::to_string),
            timeout_seconds: 5,
            retry_policy: RetryPolicy::default(),
            success_count: 0,
            failure_count: 0,
            avg_response_time_ms: None,
            last_triggered_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup(
        endpoint: WebhookEndpoint,
    ) -> (Arc<InMemoryWebhookStore>, WebhookDeliveryService, WebhookEndpoint) {
        let store = Arc::new(InMemoryWebhookStore::new());
        store.insert_endpoint(endpoint.clone()).await;
        let dyn_store: Arc<dyn WebhookStore> = store.clone();
        let executor = WebhookExecutor::new(dyn_store.clone(), USER_AGENT).unwrap();
        (store, WebhookDeliveryService::new(dyn_store, executor), endpoint)
    }

    /// Persist a delivery without starting the background attempt.
    async fn pending_delivery(
        service: &WebhookDeliveryService,
        endpoint: &WebhookEndpoint,
    ) -> WebhookDelivery {
        service
            .dispatch(
                endpoint,
                "order.created",
                serde_json::json!({"orderId": "ord_123", "total": 4200}),
                None,
            )
            .await
            .unwrap()
    }

    /// Make a retrying delivery due now.
    async fn make_due(store: &InMemoryWebhookStore, id: Uuid) {
        let mut delivery = store.find_delivery(id).await.unwrap().unwrap();
        delivery.next_attempt_at = Some(Utc::now() - chrono::Duration::seconds(1));
        store.put_delivery(delivery).await;
    }

    #[tokio::test]
    async fn test_exhausted_retries_end_in_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(3)
            .mount(&server)
            .await;

        let (store, service, endpoint) =
            setup(endpoint(&format!("{}/hook", server.uri()), Some("whsec_test"))).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        assert_eq!(delivery.max_attempts, 3);

        let before = Utc::now();
        let first = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(first.status, DeliveryStatus::Retrying);
        assert_eq!(first.attempts, 1);
        assert_eq!(first.response_code, Some(500));
        let delay = first.next_attempt_at.unwrap() - before;
        assert!(delay >= chrono::Duration::seconds(60) && delay < chrono::Duration::seconds(62));

        make_due(&store, delivery.id).await;
        let before = Utc::now();
        let second = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(second.status, DeliveryStatus::Retrying);
        let delay = second.next_attempt_at.unwrap() - before;
        assert!(delay >= chrono::Duration::seconds(120) && delay < chrono::Duration::seconds(122));

        make_due(&store, delivery.id).await;
        let third = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(third.status, DeliveryStatus::Failed);
        assert_eq!(third.attempts, 3);
        assert!(third.next_attempt_at.is_none());
        assert!(third.error_message.is_some());

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|a| a.status == AttemptStatus::Failed));
        assert_eq!(attempts[0].attempt_number, 3);
        assert_eq!(attempts[0].response_body.as_deref(), Some("boom"));

        let stored = store.find_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(stored.failure_count, 1);
        assert_eq!(stored.success_count, 0);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), Some("whsec_test"))).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let done = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(done.status, DeliveryStatus::Success);
        assert_eq!(done.attempts, 1);
        assert_eq!(done.response_code, Some(200));
        assert!(done.next_attempt_at.is_none());
        assert!(done.error_message.is_none());

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Success);
        assert_eq!(attempts[0].attempt_number, 1);

        let stored = store.find_endpoint(endpoint.id).await.unwrap().unwrap();
        assert_eq!(stored.success_count, 1);
        assert!(stored.last_triggered_at.is_some());
        assert!(stored.avg_response_time_ms.is_some());
    }

    #[tokio::test]
    async fn test_execute_on_terminal_delivery_is_noop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        let done = service.execute_attempt(delivery.id).await.unwrap().unwrap();

        assert!(service.execute_attempt(delivery.id).await.unwrap().is_none());

        let after = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.version, done.version);
        assert_eq!(store.list_attempts(delivery.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retry_successful_delivery_is_invalid_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        let done = service.execute_attempt(delivery.id).await.unwrap().unwrap();

        let result = service.retry_delivery(delivery.id).await;
        assert!(matches!(result, Err(WebhookDeliveryError::InvalidState(_))));

        let after = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.status, DeliveryStatus::Success);
        assert_eq!(after.version, done.version);
        assert_eq!(after.attempts, 1);
    }

    #[tokio::test]
    async fn test_retry_after_max_attempts_is_limit_exceeded() {
        let (store, service, endpoint) = setup(endpoint("http://127.0.0.1:9/hook", None)).await;
        let mut delivery = pending_delivery(&service, &endpoint).await;
        delivery.status = DeliveryStatus::Failed;
        delivery.attempts = delivery.max_attempts;
        delivery.next_attempt_at = None;
        store.put_delivery(delivery.clone()).await;

        let result = service.retry_delivery(delivery.id).await;
        assert!(matches!(result, Err(WebhookDeliveryError::LimitExceeded(_))));
    }

    #[tokio::test]
    async fn test_manual_retry_runs_attempt_without_resetting_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let mut delivery = pending_delivery(&service, &endpoint).await;
        delivery.status = DeliveryStatus::Retrying;
        delivery.attempts = 1;
        delivery.next_attempt_at = Some(Utc::now() + chrono::Duration::hours(1));
        store.put_delivery(delivery.clone()).await;

        let retried = service.retry_delivery(delivery.id).await.unwrap();
        assert_eq!(retried.status, DeliveryStatus::Success);
        assert_eq!(retried.attempts, 2);

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempt_number, 2);
    }

    #[tokio::test]
    async fn test_no_secret_means_no_signature_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        assert!(delivery.signature.is_none());

        service.execute_attempt(delivery.id).await.unwrap();

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("x-signature"));
        assert_eq!(requests[0].headers["user-agent"], USER_AGENT);

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert!(!attempts[0].request_headers.contains_key("X-Signature"));
    }

    #[tokio::test]
    async fn test_signature_sent_and_reused_across_retries() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("x-signature"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), Some("whsec_test"))).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        let signature = delivery.signature.clone().unwrap();

        service.execute_attempt(delivery.id).await.unwrap();
        make_due(&store, delivery.id).await;
        service.execute_attempt(delivery.id).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert_eq!(request.headers["x-signature"], signature.as_str());
            assert!(verify_signature("whsec_test", &request.body, &signature));
        }
        assert_eq!(requests[0].body, requests[1].body);
    }

    #[tokio::test]
    async fn test_custom_headers_override_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(header("user-agent", "AcmeBot/2"))
            .and(header("x-tenant", "acme"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = endpoint(&server.uri(), None);
        config.http_method = "PUT".to_string();
        config
            .headers
            .insert("user-agent".to_string(), "AcmeBot/2".to_string());
        config
            .headers
            .insert("X-Tenant".to_string(), "acme".to_string());

        let (_store, service, endpoint) = setup(config).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        let done = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(done.status, DeliveryStatus::Success);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_as_failed_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let mut config = endpoint(&server.uri(), None);
        config.timeout_seconds = 1;
        let (store, service, endpoint) = setup(config).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let after = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.status, DeliveryStatus::Retrying);
        assert_eq!(after.response_code, Some(0));
        assert!(after.response_time_ms.unwrap() >= 1000);
        assert!(after.next_attempt_at.is_some());

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert_eq!(attempts[0].response_code, Some(0));
        assert!(attempts[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn test_connection_failure_is_soft() {
        let (_store, service, endpoint) = setup(endpoint("http://127.0.0.1:9/hook", None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let after = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.status, DeliveryStatus::Retrying);
        assert_eq!(after.response_code, Some(0));
        assert!(after.error_message.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_executions_send_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let (a, b) = tokio::join!(
            service.execute_attempt(delivery.id),
            service.execute_attempt(delivery.id)
        );
        let applied = [a.unwrap(), b.unwrap()]
            .into_iter()
            .filter(Option::is_some)
            .count();
        assert_eq!(applied, 1);

        let after = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.attempts, 1);
        assert_eq!(store.list_attempts(delivery.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_manual_retry_during_running_attempt_is_refused() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(800)))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let (worker, retry) = tokio::join!(service.execute_attempt(delivery.id), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            service.retry_delivery(delivery.id).await
        });

        assert!(matches!(retry, Err(WebhookDeliveryError::Conflict(_))));
        let worker = worker.unwrap().expect("worker outcome is recorded");
        assert_eq!(worker.status, DeliveryStatus::Success);

        let after = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(after.status, DeliveryStatus::Success);
        assert_eq!(after.attempts, 1);
        assert_eq!(after.claimed_until, None);

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].attempt_number, 1);
        assert_eq!(attempts[0].status, AttemptStatus::Success);
    }

    #[tokio::test]
    async fn test_manual_retry_skips_backoff_wait() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (_store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;

        let first = service.execute_attempt(delivery.id).await.unwrap().unwrap();
        assert_eq!(first.status, DeliveryStatus::Retrying);
        assert!(first.next_attempt_at.unwrap() > Utc::now());

        let retried = service.retry_delivery(delivery.id).await.unwrap();
        assert_eq!(retried.status, DeliveryStatus::Success);
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn test_not_due_delivery_is_skipped() {
        let (store, service, endpoint) = setup(endpoint("http://127.0.0.1:9/hook", None)).await;
        let mut delivery = pending_delivery(&service, &endpoint).await;
        delivery.status = DeliveryStatus::Retrying;
        delivery.attempts = 1;
        delivery.next_attempt_at = Some(Utc::now() + chrono::Duration::minutes(10));
        store.put_delivery(delivery.clone()).await;

        assert!(service.execute_attempt(delivery.id).await.unwrap().is_none());
        assert!(store.list_attempts(delivery.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_interrupted_attempt_is_failed_before_next() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let delivery = pending_delivery(&service, &endpoint).await;
        store
            .insert_attempt(domain::models::NewAttempt {
                delivery_id: delivery.id,
                endpoint_id: endpoint.id,
                attempt_number: 1,
                request_headers: BTreeMap::new(),
                request_body: "{}".to_string(),
                timestamp: Utc::now(),
            })
            .await
            .unwrap();

        service.execute_attempt(delivery.id).await.unwrap();

        let attempts = store.list_attempts(delivery.id).await.unwrap();
        assert_eq!(attempts.len(), 2);
        let orphan = attempts.iter().find(|a| a.status == AttemptStatus::Failed).unwrap();
        assert_eq!(orphan.error_message.as_deref(), Some(INTERRUPTED_ATTEMPT_MESSAGE));
        assert_eq!(
            attempts.iter().filter(|a| a.status == AttemptStatus::Success).count(),
            1
        );
    }

    #[tokio::test]
    async fn test_create_delivery_validates_and_snapshots_policy() {
        let mut config = endpoint("http://127.0.0.1:9/hook", Some("whsec_test"));
        config.retry_policy.max_retries = 5;
        let (store, service, endpoint) = setup(config).await;

        let missing = service
            .create_delivery(CreateDeliveryRequest {
                endpoint_id: Some(endpoint.id),
                event_type: None,
                payload: Some(serde_json::json!({})),
                priority: None,
            })
            .await;
        assert!(matches!(missing, Err(WebhookDeliveryError::Validation(_))));

        let unknown = service
            .create_delivery(CreateDeliveryRequest {
                endpoint_id: Some(Uuid::new_v4()),
                event_type: Some("order.created".into()),
                payload: Some(serde_json::json!({})),
                priority: None,
            })
            .await;
        assert!(matches!(unknown, Err(WebhookDeliveryError::NotFound(_))));

        let payload = serde_json::json!({"orderId": "ord_9"});
        let delivery = service
            .create_delivery(CreateDeliveryRequest {
                endpoint_id: Some(endpoint.id),
                event_type: Some("invoice.paid".into()),
                payload: Some(payload.clone()),
                priority: Some(EventPriority::High),
            })
            .await
            .unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        assert_eq!(delivery.attempts, 0);
        assert_eq!(delivery.max_attempts, 5);
        let signature = delivery.signature.clone().unwrap();
        let body = serde_json::to_vec(&payload).unwrap();
        assert!(verify_signature("whsec_test", &body, &signature));

        let event = store.find_event_type(delivery.event_type_id).await.unwrap().unwrap();
        assert_eq!(event.event_type, "invoice.paid");
        assert_eq!(event.category, "manual");
        assert_eq!(event.priority, EventPriority::High);

        // Later policy edits do not touch existing deliveries.
        let mut edited = endpoint.clone();
        edited.retry_policy.max_retries = 1;
        store.insert_endpoint(edited).await;
        let stored = store.find_delivery(delivery.id).await.unwrap().unwrap();
        assert_eq!(stored.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_create_delivery_rejects_inactive_endpoint() {
        let mut config = endpoint("http://127.0.0.1:9/hook", None);
        config.is_active = false;
        let (_store, service, endpoint) = setup(config).await;

        let result = service
            .create_delivery(CreateDeliveryRequest {
                endpoint_id: Some(endpoint.id),
                event_type: Some("order.created".into()),
                payload: Some(serde_json::json!({})),
                priority: None,
            })
            .await;
        assert!(matches!(result, Err(WebhookDeliveryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_publish_fans_out_to_subscribers() {
        let (store, service, order_hook) =
            setup(endpoint("http://127.0.0.1:9/orders", None)).await;

        let mut catch_all = endpoint("http://127.0.0.1:9/all", None);
        catch_all.events = vec!["*".to_string()];
        store.insert_endpoint(catch_all.clone()).await;

        let mut other = endpoint("http://127.0.0.1:9/users", None);
        other.events = vec!["user.signup".to_string()];
        store.insert_endpoint(other).await;

        let mut other_tenant = endpoint("http://127.0.0.1:9/else", None);
        other_tenant.tenant_id = "tenant_other".to_string();
        store.insert_endpoint(other_tenant).await;

        let deliveries = service
            .publish_event(PublishEventRequest {
                tenant_id: Some("tenant_acme".into()),
                event_type: Some("order.created".into()),
                payload: Some(serde_json::json!({"orderId": "ord_1"})),
                priority: None,
            })
            .await
            .unwrap();

        let mut targets: Vec<Uuid> = deliveries.iter().map(|d| d.endpoint_id).collect();
        targets.sort();
        let mut expected = vec![order_hook.id, catch_all.id];
        expected.sort();
        assert_eq!(targets, expected);

        let none = service
            .publish_event(PublishEventRequest {
                tenant_id: Some("tenant_acme".into()),
                event_type: Some("refund.issued".into()),
                payload: Some(serde_json::json!({})),
                priority: None,
            })
            .await
            .unwrap();
        assert_eq!(none.len(), 1);
        assert_eq!(none[0].endpoint_id, catch_all.id);
    }

    #[tokio::test]
    async fn test_process_due_deliveries_executes_due_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let (store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let now = Utc::now();

        let mut due = pending_delivery(&service, &endpoint).await;
        due.status = DeliveryStatus::Retrying;
        due.attempts = 1;
        due.next_attempt_at = Some(now - chrono::Duration::seconds(5));
        store.put_delivery(due.clone()).await;

        let mut later = pending_delivery(&service, &endpoint).await;
        later.status = DeliveryStatus::Retrying;
        later.attempts = 1;
        later.next_attempt_at = Some(now + chrono::Duration::minutes(5));
        store.put_delivery(later.clone()).await;

        let processed = service
            .process_due_deliveries(now, now - chrono::Duration::minutes(5), 10, 4)
            .await
            .unwrap();
        assert_eq!(processed, 1);

        let due = store.find_delivery(due.id).await.unwrap().unwrap();
        assert_eq!(due.status, DeliveryStatus::Success);
        assert_eq!(due.attempts, 2);
        let later = store.find_delivery(later.id).await.unwrap().unwrap();
        assert_eq!(later.status, DeliveryStatus::Retrying);
    }

    #[tokio::test]
    async fn test_list_and_get_delivery() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (_store, service, endpoint) = setup(endpoint(&server.uri(), None)).await;
        let first = pending_delivery(&service, &endpoint).await;
        pending_delivery(&service, &endpoint).await;
        service.execute_attempt(first.id).await.unwrap();

        let list = service
            .list_deliveries(&ListDeliveriesQuery::default())
            .await
            .unwrap();
        assert_eq!(list.deliveries.len(), 2);
        assert_eq!(list.stats.total, 2);
        assert_eq!(list.stats.pending, 1);
        assert_eq!(list.stats.retrying, 1);
        assert_eq!(list.pagination.total, 2);
        assert_eq!(list.deliveries[0].endpoint_name, "Orders");

        let detail = service.get_delivery(first.id).await.unwrap();
        assert_eq!(detail.attempts_log.len(), 1);
        assert_eq!(detail.attempts_log[0].response_code, Some(500));

        assert!(matches!(
            service.get_delivery(Uuid::new_v4()).await,
            Err(WebhookDeliveryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_old_deliveries() {
        let (store, service, endpoint) = setup(endpoint("http://127.0.0.1:9/hook", None)).await;
        let mut old = pending_delivery(&service, &endpoint).await;
        old.created_at = Utc::now() - chrono::Duration::days(45);
        store.put_delivery(old.clone()).await;
        let fresh = pending_delivery(&service, &endpoint).await;

        let deleted = service.cleanup_old_deliveries(30).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(store.find_delivery(old.id).await.unwrap().is_none());
        assert!(store.find_delivery(fresh.id).await.unwrap().is_some());
    }
}
