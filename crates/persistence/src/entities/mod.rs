//! Database entity definitions (row mappings).

pub mod webhook_attempt;
pub mod webhook_delivery;
pub mod webhook_endpoint;
pub mod webhook_event_type;

pub use webhook_attempt::WebhookAttemptEntity;
pub use webhook_delivery::{DeliveryStatsEntity, DeliverySummaryEntity, WebhookDeliveryEntity};
pub use webhook_endpoint::WebhookEndpointEntity;
pub use webhook_event_type::WebhookEventTypeEntity;
