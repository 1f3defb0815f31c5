//! Deletes delivery history past the retention window.

use std::sync::Arc;

use crate::services::WebhookDeliveryService;

use super::scheduler::{Job, JobFrequency};

pub struct WebhookCleanupJob {
    service: Arc<WebhookDeliveryService>,
    retention_days: u32,
}

impl WebhookCleanupJob {
    pub fn new(service: Arc<WebhookDeliveryService>, retention_days: u32) -> Self {
        Self {
            service,
            retention_days,
        }
    }
}

#[async_trait::async_trait]
impl Job for WebhookCleanupJob {
    fn name(&self) -> &'static str {
        "webhook_cleanup"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<(), String> {
        self.service
            .cleanup_old_deliveries(self.retention_days)
            .await
            .map(|_| ())
            .map_err(|e| format!("Failed to clean up webhook deliveries: {}", e))
    }
}
