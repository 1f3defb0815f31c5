//! PostgreSQL implementation of the webhook store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared::pagination::PageRequest;
use sqlx::PgPool;
use uuid::Uuid;

use domain::models::{
    AttemptOutcome, DeliveryAttemptUpdate, DeliveryFilter, DeliveryStats, DeliverySummary,
    EndpointChanges, NewAttempt, NewDelivery, NewEndpoint, NewEventType, UpdateEventTypeRequest,
    WebhookAttempt, WebhookDelivery, WebhookEndpoint, WebhookEventType,
};
use domain::services::{StoreError, WebhookStore};

use crate::entities::WebhookDeliveryEntity;
use crate::repositories::{
    WebhookAttemptRepository, WebhookDeliveryRepository, WebhookEndpointRepository,
    WebhookEventTypeRepository,
};

/// [`WebhookStore`] backed by the webhook tables.
#[derive(Clone)]
pub struct PgWebhookStore {
    endpoints: WebhookEndpointRepository,
    event_types: WebhookEventTypeRepository,
    deliveries: WebhookDeliveryRepository,
    attempts: WebhookAttemptRepository,
}

impl PgWebhookStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            endpoints: WebhookEndpointRepository::new(pool.clone()),
            event_types: WebhookEventTypeRepository::new(pool.clone()),
            deliveries: WebhookDeliveryRepository::new(pool.clone()),
            attempts: WebhookAttemptRepository::new(pool),
        }
    }
}

fn delivery(entity: Option<WebhookDeliveryEntity>) -> Result<Option<WebhookDelivery>, StoreError> {
    entity.map(WebhookDelivery::try_from).transpose()
}

#[async_trait]
impl WebhookStore for PgWebhookStore {
    async fn create_endpoint(&self, new: NewEndpoint) -> Result<WebhookEndpoint, StoreError> {
        Ok(self.endpoints.create(&new).await?.into())
    }

    async fn find_endpoint(&self, id: Uuid) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.endpoints.find_by_id(id).await?.map(Into::into))
    }

    async fn list_endpoints(
        &self,
        tenant_id: &str,
        search: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEndpoint>, i64), StoreError> {
        let entities = self
            .endpoints
            .list_by_tenant(tenant_id, search, page.limit(), page.offset())
            .await?;
        let total = self.endpoints.count_by_tenant(tenant_id, search).await?;
        Ok((entities.into_iter().map(Into::into).collect(), total))
    }

    async fn update_endpoint(
        &self,
        id: Uuid,
        changes: EndpointChanges,
    ) -> Result<Option<WebhookEndpoint>, StoreError> {
        Ok(self.endpoints.update(id, &changes).await?.map(Into::into))
    }

    async fn delete_endpoint(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.endpoints.delete(id).await? > 0)
    }

    async fn find_subscribed_endpoints(
        &self,
        tenant_id: &str,
        event_type: &str,
    ) -> Result<Vec<WebhookEndpoint>, StoreError> {
        let entities = self.endpoints.find_subscribed(tenant_id, event_type).await?;
        Ok(entities.into_iter().map(Into::into).collect())
    }

    async fn record_endpoint_outcome(
        &self,
        id: Uuid,
        success: bool,
        response_time_ms: i64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.endpoints
            .record_outcome(id, success, response_time_ms, at)
            .await?;
        Ok(())
    }

    async fn create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<Option<WebhookEventType>, StoreError> {
        self.event_types
            .insert_if_absent(&new)
            .await?
            .map(WebhookEventType::try_from)
            .transpose()
    }

    async fn get_or_create_event_type(
        &self,
        new: NewEventType,
    ) -> Result<WebhookEventType, StoreError> {
        if let Some(existing) = self.event_types.find_by_event_type(&new.event_type).await? {
            return existing.try_into();
        }
        if let Some(created) = self.event_types.insert_if_absent(&new).await? {
            return created.try_into();
        }
        // Lost the insert race; the winner's row is visible now.
        tracing::debug!(event_type = %new.event_type, "Event type created concurrently");
        self.event_types
            .find_by_event_type(&new.event_type)
            .await?
            .ok_or_else(|| {
                StoreError::InvalidData(format!("event type {} not found after insert", new.event_type))
            })?
            .try_into()
    }

    async fn find_event_type(&self, id: Uuid) -> Result<Option<WebhookEventType>, StoreError> {
        self.event_types
            .find_by_id(id)
            .await?
            .map(WebhookEventType::try_from)
            .transpose()
    }

    async fn list_event_types(
        &self,
        category: Option<&str>,
        page: PageRequest,
    ) -> Result<(Vec<WebhookEventType>, i64), StoreError> {
        let entities = self
            .event_types
            .list(category, page.limit(), page.offset())
            .await?;
        let total = self.event_types.count(category).await?;
        let event_types = entities
            .into_iter()
            .map(WebhookEventType::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((event_types, total))
    }

    async fn update_event_type(
        &self,
        id: Uuid,
        changes: UpdateEventTypeRequest,
    ) -> Result<Option<WebhookEventType>, StoreError> {
        self.event_types
            .update(id, &changes)
            .await?
            .map(WebhookEventType::try_from)
            .transpose()
    }

    async fn insert_delivery(&self, new: NewDelivery) -> Result<WebhookDelivery, StoreError> {
        self.deliveries.create(&new).await?.try_into()
    }

    async fn find_delivery(&self, id: Uuid) -> Result<Option<WebhookDelivery>, StoreError> {
        delivery(self.deliveries.find_by_id(id).await?)
    }

    async fn claim_delivery(
        &self,
        id: Uuid,
        expected_version: i64,
        lease_until: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        delivery(
            self.deliveries
                .claim(id, expected_version, lease_until)
                .await?,
        )
    }

    async fn record_delivery_attempt(
        &self,
        id: Uuid,
        expected_version: i64,
        update: DeliveryAttemptUpdate,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        delivery(
            self.deliveries
                .record_attempt(id, expected_version, &update)
                .await?,
        )
    }

    async fn reset_delivery_for_retry(
        &self,
        id: Uuid,
        expected_version: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<WebhookDelivery>, StoreError> {
        delivery(
            self.deliveries
                .reset_for_retry(id, expected_version, now)
                .await?,
        )
    }

    async fn find_due_deliveries(
        &self,
        now: DateTime<Utc>,
        stuck_before: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<WebhookDelivery>, StoreError> {
        self.deliveries
            .find_due(now, stuck_before, limit)
            .await?
            .into_iter()
            .map(WebhookDelivery::try_from)
            .collect()
    }

    async fn list_deliveries(
        &self,
        filter: &DeliveryFilter,
        page: PageRequest,
    ) -> Result<(Vec<DeliverySummary>, i64), StoreError> {
        let entities = self
            .deliveries
            .list(filter, page.limit(), page.offset())
            .await?;
        let total = self.deliveries.get_stats(filter).await?.total;
        let summaries = entities
            .into_iter()
            .map(DeliverySummary::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((summaries, total))
    }

    async fn delivery_stats(&self, filter: &DeliveryFilter) -> Result<DeliveryStats, StoreError> {
        Ok(self.deliveries.get_stats(filter).await?)
    }

    async fn delete_deliveries_created_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<u64, StoreError> {
        Ok(self.deliveries.delete_created_before(cutoff).await?)
    }

    async fn insert_attempt(&self, new: NewAttempt) -> Result<WebhookAttempt, StoreError> {
        self.attempts.create(&new).await?.try_into()
    }

    async fn complete_attempt(&self, id: Uuid, outcome: AttemptOutcome) -> Result<(), StoreError> {
        Ok(self.attempts.complete(id, &outcome).await?)
    }

    async fn fail_interrupted_attempts(
        &self,
        delivery_id: Uuid,
        error_message: &str,
    ) -> Result<u64, StoreError> {
        Ok(self
            .attempts
            .fail_pending_for_delivery(delivery_id, error_message)
            .await?)
    }

    async fn list_attempts(&self, delivery_id: Uuid) -> Result<Vec<WebhookAttempt>, StoreError> {
        self.attempts
            .find_by_delivery_id(delivery_id)
            .await?
            .into_iter()
            .map(WebhookAttempt::try_from)
            .collect()
    }
}
