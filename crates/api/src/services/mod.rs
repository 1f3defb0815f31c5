//! Webhook delivery engine services.

pub mod webhook_delivery;
pub mod webhook_executor;

pub use webhook_delivery::{WebhookDeliveryError, WebhookDeliveryService};
pub use webhook_executor::WebhookExecutor;
