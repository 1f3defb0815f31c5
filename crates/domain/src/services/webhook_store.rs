//! Storage abstraction for the webhook delivery engine.
//!
//! The engine depends only on [`WebhookStore`]. The PostgreSQL implementation
//! lives in the persistence crate; [`InMemoryWebhookStore`] backs development
//! and tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::pagination::PageRequest;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::{
    blend_response_time, AttemptOutcome, AttemptStatus, DeliveryAttemptUpdate, DeliveryFilter,
    DeliveryStats, DeliveryStatus, DeliverySummary, EndpointChanges, NewAttempt, NewDelivery,
    NewEndpoint, NewEventType, UpdateEventTypeRequest, WebhookAttempt, WebhookDelivery,
    WebhookEndpoint, WebhookEventType,
};

/// Errors raised by a [`WebhookStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid stored value: {0}")]
    InvalidData(String),
}

/// Persistence operations used by the delivery engine and its API.
///
/// Delivery writes that advance state are conditional on the `version` the
/// caller last read; they return `None` when another writer got there first.
#[async_trait]
pub trait WebhookStore: Send + Sync {
    // Endpoints

    async fn create_endpoint(&self, new: NewEndpoint) -> Result<WebhookEndpoint, StoreError>;

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError>;

    /// Endpoints of a tenant, newest first, with the total match count.
    async fn list_endpoints(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEndpoint>, i64), StoreError>;

    async fn update_endpoint(
        &self,
        id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Option<WebhookEndpoint>, StoreError>;

    /// Deletes an endpoint together with its deliveries and attempts.
    async fn delete_endpoint(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Active endpoints of a tenant subscribed to `event_type` or to `*`.
    async fn find_subscribed_endpoints(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError>;

    /// Bumps the outcome counter and blends the latency sample into the average.
    async fn record_endpoint_outcome(
        &self,
        id: Uuid,
        success: bool,
        response_time_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    // Event types

    /// Inserts an event type; `None` if the key is already registered.
    async fn create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<Option<WebhookEventType>, StoreError>;

    /// Returns the event type for `new.event_type`, inserting it if absent.
    async fn get_or_create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<WebhookEventType, StoreError>;

    async fn find_event_type(&self, id: Uuid) -> Result<Option<WebhookEventType>, StoreError>;

    /// Without a category only active types are listed.
    async fn list_event_types(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEventType>, i64), StoreError>;

    async fn update_event_type(
        &self,
        id: Uuid,
        changes: UpdateEventTypeRequest,
    ) -> Result<Option<WebhookEventType>, StoreError>;

    // Deliveries

    async fn insert_delivery(&self, new: NewDelivery) -> Result<WebhookDelivery, StoreError>;

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Takes ownership of the next attempt. Succeeds only while the delivery
    /// is pending or retrying and still at `expected_version`. `next_attempt_at`
    /// and `claimed_until` move to `lease_until` so pollers and manual resets
    /// skip the delivery while it is in flight. Recording the attempt releases
    /// the claim.
    async fn claim_delivery(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError>;

    async fn record_delivery_attempt(
        &self,
        id: Uuid,
        expected_version: i64,
        update: DeliveryAttemptUpdate,
    ) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Moves a non-successful delivery with attempts left back to pending.
    /// Refused while a live claim is held by another worker.
    async fn reset_delivery_for_retry(
        &self,
        id: Uuid,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError>;

    /// Retrying deliveries due at `now` and pending ones scheduled before
    /// `stuck_before`, oldest due first.
    async fn find_due_deliveries(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError>;

    /// Matching deliveries, newest first, with the total match count.
    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
        page: PageRequest,
    ) -> Result<(Vec<DeliverySummary>, i64), StoreError>;

    async fn delivery_stats(&self, filter: &DeliveryFilter) -> Result<DeliveryStats, StoreError>;

    /// Deletes deliveries (and their attempts) created before `cutoff`.
    async fn delete_deliveries_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError>;

    // Attempts

    /// Records a pending attempt with its request snapshot.
    async fn insert_attempt(&self, new: NewAttempt) -> Result<WebhookAttempt, StoreError>;

    async fn complete_attempt(&self, id: Uuid, outcome: AttemptOutcome) -> Result<(), StoreError>;

    /// Marks attempts of a delivery still pending as failed.
    async fn fail_interrupted_attempts(
        &self,
        delivery_id: Uuid,
        error_message: &str,
    ) -> Result<u64, StoreError>;

    /// Attempts of a delivery, newest first.
    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<WebhookAttempt>, StoreError>;
}

#[derive(Default)]
struct State {
    endpoints: HashMap<Uuid, WebhookEndpoint>,
    event_types: HashMap<Uuid, WebhookEventType>,
    deliveries: HashMap<Uuid, WebhookDelivery>,
    attempts: Vec<WebhookAttempt>,
}

impl State {
    fn event_type_key(&self, event_type_id: Uuid) -> &str {
        self.event_types
            .get(&event_type_id)
            .map(|e| e.event_type.as_str())
            .unwrap_or_default()
    }

    fn matching(&self, filter: &DeliveryFilter) -> Vec<&WebhookDelivery> {
        self.deliveries
            .values()
            .filter(|d| filter.matches(d, self.event_type_key(d.event_type_id)))
            .collect()
    }
}

/// In-memory [`WebhookStore`] for development and testing.
#[derive(Default)]
pub struct InMemoryWebhookStore {
    state: Mutex<State>,
}

impl InMemoryWebhookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fully built endpoint as-is.
    pub async fn insert_endpoint(&self, endpoint: WebhookEndpoint) {
        self.state
            .lock()
            .await
            .endpoints
            .insert(endpoint.id, endpoint);
    }

    /// Overwrites a stored delivery.
    pub async fn put_delivery(&self, delivery: WebhookDelivery) {
        self.state
            .lock()
            .await
            .deliveries
            .insert(delivery.id, delivery);
    }
}

fn paginate<T>(items: Vec<T>, page: PageRequest) -> (Vec<T>, i64) {
    let total = items.len() as i64;
    let items = items
        .into_iter()
        .skip(page.offset() as usize)
        .take(page.limit() as usize)
        .collect();
    (items, total)
}

#[async_trait]
impl WebhookStore for InMemoryWebhookStore {
    async fn create_endpoint(&self, new: NewEndpoint) -> Result<WebhookEndpoint, StoreError> {
        let now = Utc::now();
        let endpoint = WebhookEndpoint {
            id: Uuid::new_v4(),
            tenant_id: new.tenant_id,
            name: new.name,
            description: new.description,
            url: new.url,
            http_method: new.http_method,
            events: new.events,
            headers: new.headers,
            secret: new.secret,
            timeout_seconds: new.timeout_seconds,
            retry_policy: new.retry_policy,
            success_count: 0,
            failure_count: 0,
            avg_response_time_ms: None,
            last_triggered_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert_endpoint(endpoint.clone()).await;
        Ok(endpoint)
    }

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.state.lock().await.endpoints.get(&id).cloned())
    }

    async fn list_endpoints(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEndpoint>, i64), StoreError> {
        let state = self.state.lock().await;
        let needle = search.map(str::to_lowercase);
        let mut endpoints: Vec<WebhookEndpoint> = state
            .endpoints
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| match &needle {
                Some(n) => {
                    e.name.to_lowercase().contains(n)
                        || e.url.to_lowercase().contains(n)
                        || e.description
                            .as_deref()
                            .is_some_and(|d| d.to_lowercase().contains(n))
                }
                None => true,
            })
            .cloned()
            .collect();
        endpoints.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(paginate(endpoints, page))
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(endpoint) = state.endpoints.get_mut(&id) else {
            return Ok(None);
        };
        changes.apply(endpoint, Utc::now());
        Ok(Some(endpoint.clone()))
    }

    async fn delete_endpoint(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if state.endpoints.remove(&id).is_none() {
            return Ok(false);
        }
        state.deliveries.retain(|_, d| d.endpoint_id != id);
        state.attempts.retain(|a| a.endpoint_id != id);
        Ok(true)
    }

    async fn find_subscribed_endpoints(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let state = self.state.lock().await;
        let mut endpoints: Vec<WebhookEndpoint> = state
            .endpoints
            .values()
            .filter(|e| e.tenant_id == tenant_id && e.is_active && e.is_subscribed_to(event_type))
            .cloned()
            .collect();
        endpoints.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(endpoints)
    }

    async fn record_endpoint_outcome(
        &self,
        id: Uuid,
        success: bool,
        response_time_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(endpoint) = state.endpoints.get_mut(&id) {
            if success {
                endpoint.success_count += 1;
                endpoint.last_triggered_at = Some(at);
            } else {
                endpoint.failure_count += 1;
            }
            endpoint.avg_response_time_ms = Some(blend_response_time(
                endpoint.avg_response_time_ms,
                response_time_ms,
            ));
            endpoint.updated_at = at;
        }
        Ok(())
    }

    async fn create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<Option<WebhookEventType>, StoreError> {
        let mut state = self.state.lock().await;
        if state
            .event_types
            .values()
            .any(|e| e.event_type == new.event_type)
        {
            return Ok(None);
        }
        let now = Utc::now();
        let event_type = WebhookEventType {
            id: Uuid::new_v4(),
            event_type: new.event_type,
            category: new.category,
            description: new.description,
            payload_schema: new.payload_schema,
            priority: new.priority,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.event_types.insert(event_type.id, event_type.clone());
        Ok(Some(event_type))
    }

    async fn get_or_create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<WebhookEventType, StoreError> {
        {
            let state = self.state.lock().await;
            if let Some(existing) = state
                .event_types
                .values()
                .find(|e| e.event_type == new.event_type)
            {
                return Ok(existing.clone());
            }
        }
        let key = new.event_type.clone();
        match self.create_event_type(new).await? {
            Some(created) => Ok(created),
            None => self
                .state
                .lock()
                .await
                .event_types
                .values()
                .find(|e| e.event_type == key)
                .cloned()
                .ok_or_else(|| StoreError::InvalidData(format!("event type {} vanished", key))),
        }
    }

    async fn find_event_type(&self, id: Uuid) -> Result<Option<WebhookEventType>, StoreError> {
        Ok(self.state.lock().await.event_types.get(&id).cloned())
    }

    async fn list_event_types(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEventType>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut event_types: Vec<WebhookEventType> = state
            .event_types
            .values()
            .filter(|e| match category {
                Some(c) => e.category == c,
                None => e.is_active,
            })
            .cloned()
            .collect();
        event_types.sort_by(|a, b| {
            b.priority
                .rank()
                .cmp(&a.priority.rank())
                .then_with(|| a.category.cmp(&b.category))
                .then_with(|| a.event_type.cmp(&b.event_type))
        });
        Ok(paginate(event_types, page))
    }

    async fn update_event_type(
        &self,
        id: Uuid,
        changes: UpdateEventTypeRequest,
    ) -> Result<Option<WebhookEventType>, StoreError> {
        let mut state = self.state.lock().await;
        let Some(event_type) = state.event_types.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(description) = changes.description {
            event_type.description = description;
        }
        if let Some(schema) = changes.payload_schema {
            event_type.payload_schema = schema;
        }
        if let Some(active) = changes.is_active {
            event_type.is_active = active;
        }
        if let Some(priority) = changes.priority {
            event_type.priority = priority;
        }
        event_type.updated_at = Utc::now();
        Ok(Some(event_type.clone()))
    }

    async fn insert_delivery(&self, new: NewDelivery) -> Result<WebhookDelivery, StoreError> {
        let delivery = WebhookDelivery {
            id: Uuid::new_v4(),
            endpoint_id: new.endpoint_id,
            event_type_id: new.event_type_id,
            payload: new.payload,
            signature: new.signature,
            attempts: 0,
            max_attempts: new.max_attempts,
            status: DeliveryStatus::Pending,
            first_attempt_at: new.created_at,
            last_attempt_at: None,
            next_attempt_at: Some(new.created_at),
            response_code: None,
            response_body: None,
            response_time_ms: None,
            error_message: None,
            version: 0,
            claimed_until: None,
            created_at: new.created_at,
            updated_at: new.created_at,
        };
        self.put_delivery(delivery.clone()).await;
        Ok(delivery)
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError> {
        Ok(self.state.lock().await.deliveries.get(&id).cloned())
    }

    async fn claim_delivery(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let mut state = self.state.lock().await;
        match state.deliveries.get_mut(&id) {
            Some(d) if d.version == expected_version && !d.status.is_terminal() => {
                d.next_attempt_at = Some(lease_until);
                d.claimed_until = Some(lease_until);
                d.version += 1;
                d.updated_at = Utc::now();
                Ok(Some(d.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn record_delivery_attempt(
        &self,
        id: Uuid,
        expected_version: i64,
        update: DeliveryAttemptUpdate,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let mut state = self.state.lock().await;
        match state.deliveries.get_mut(&id) {
            Some(d) if d.version == expected_version => {
                d.attempts = update.attempts;
                d.status = update.status;
                d.last_attempt_at = Some(update.last_attempt_at);
                d.next_attempt_at = update.next_attempt_at;
                d.response_code = Some(update.response_code);
                d.response_body = update.response_body;
                d.response_time_ms = Some(update.response_time_ms);
                d.error_message = update.error_message;
                d.claimed_until = None;
                d.version += 1;
                d.updated_at = update.last_attempt_at;
                Ok(Some(d.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reset_delivery_for_retry(
        &self,
        id: Uuid,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        let mut state = self.state.lock().await;
        match state.deliveries.get_mut(&id) {
            Some(d)
                if d.version == expected_version
                    && d.status != DeliveryStatus::Success
                    && d.attempts < d.max_attempts
                    && !d.is_in_flight(now) =>
            {
                d.status = DeliveryStatus::Pending;
                d.next_attempt_at = Some(now);
                d.version += 1;
                d.updated_at = now;
                Ok(Some(d.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn find_due_deliveries(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        let state = self.state.lock().await;
        let mut due: Vec<WebhookDelivery> = state
            .deliveries
            .values()
            .filter(|d| match (d.status, d.next_attempt_at) {
                (DeliveryStatus::Retrying, Some(at)) => at <= now,
                (DeliveryStatus::Pending, Some(at)) => at <= stuck_before,
                _ => false,
            })
            .cloned()
            .collect();
        due.sort_by_key(|d| d.next_attempt_at);
        due.truncate(limit.max(0) as usize);
        Ok(due)
    }

    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
        page: PageRequest,
    ) -> Result<(Vec<DeliverySummary>, i64), StoreError> {
        let state = self.state.lock().await;
        let mut deliveries = state.matching(filter);
        deliveries.sort_by(|a, b| {
            b.first_attempt_at
                .cmp(&a.first_attempt_at)
                .then_with(|| a.id.cmp(&b.id))
        });

        let summaries = deliveries
            .into_iter()
            .filter_map(|d| {
                let endpoint = state.endpoints.get(&d.endpoint_id)?;
                let event_type = state.event_types.get(&d.event_type_id)?;
                Some(DeliverySummary {
                    delivery: d.clone(),
                    endpoint_name: endpoint.name.clone(),
                    endpoint_url: endpoint.url.clone(),
                    event_type: event_type.event_type.clone(),
                    event_category: event_type.category.clone(),
                    event_priority: event_type.priority,
                })
            })
            .collect();
        Ok(paginate(summaries, page))
    }

    async fn delivery_stats(&self, filter: &DeliveryFilter) -> Result<DeliveryStats, StoreError> {
        let state = self.state.lock().await;
        let mut stats = DeliveryStats::default();
        for delivery in state.matching(filter) {
            stats.record(delivery.status);
        }
        Ok(stats)
    }

    async fn delete_deliveries_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let before = state.deliveries.len();
        state.deliveries.retain(|_, d| d.created_at >= cutoff);
        let deleted = (before - state.deliveries.len()) as u64;

        let State {
            deliveries,
            attempts,
            ..
        } = &mut *state;
        attempts.retain(|a| deliveries.contains_key(&a.delivery_id));
        Ok(deleted)
    }

    async fn insert_attempt(&self, new: NewAttempt) -> Result<WebhookAttempt, StoreError> {
        let attempt = WebhookAttempt {
            id: Uuid::new_v4(),
            delivery_id: new.delivery_id,
            endpoint_id: new.endpoint_id,
            attempt_number: new.attempt_number,
            status: AttemptStatus::Pending,
            request_headers: new.request_headers,
            request_body: new.request_body,
            response_code: None,
            response_body: None,
            response_time_ms: None,
            error_message: None,
            timestamp: new.timestamp,
        };
        self.state.lock().await.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn complete_attempt(&self, id: Uuid, outcome: AttemptOutcome) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if let Some(attempt) = state.attempts.iter_mut().find(|a| a.id == id) {
            attempt.status = outcome.status;
            attempt.response_code = Some(outcome.response_code);
            attempt.response_body = outcome.response_body;
            attempt.response_time_ms = Some(outcome.response_time_ms);
            attempt.error_message = outcome.error_message;
        }
        Ok(())
    }

    async fn fail_interrupted_attempts(
        &self,
        delivery_id: Uuid,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        let mut state = self.state.lock().await;
        let mut updated = 0;
        for attempt in state
            .attempts
            .iter_mut()
            .filter(|a| a.delivery_id == delivery_id && a.status == AttemptStatus::Pending)
        {
            attempt.status = AttemptStatus::Failed;
            attempt.error_message = Some(error_message.to_string());
            updated += 1;
        }
        Ok(updated)
    }

    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<WebhookAttempt>, StoreError> {
        let state = self.state.lock().await;
        let mut attempts: Vec<WebhookAttempt> = state
            .attempts
            .iter()
            .filter(|a| a.delivery_id == delivery_id)
            .cloned()
            .collect();
        attempts.sort_by(|a, b| {
            b.attempt_number
                .cmp(&a.attempt_number)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
        });
        Ok(attempts)
    }
}
