//! Repository implementations for database operations.

pub mod webhook_attempt;
pub mod webhook_delivery;
pub mod webhook_endpoint;
pub mod webhook_event_type;

pub use webhook_attempt::WebhookAttemptRepository;
pub use webhook_delivery::WebhookDeliveryRepository;
pub use webhook_endpoint::WebhookEndpointRepository;
pub use webhook_event_type::WebhookEventTypeRepository;
